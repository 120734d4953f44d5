//! Conversion safety verdicts.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{base_type, category_of, TypeCategory};

/// Safety of converting a column from one type to another.
///
/// Ordered from best to worst so the worst verdict of a set is its `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionVerdict {
    /// Every source value is representable in the destination.
    Safe,
    /// Values may be truncated, rounded or re-encoded; needs operator confirmation.
    Lossy,
    /// No automatic conversion; blocks the target.
    Unsafe,
}

impl fmt::Display for ConversionVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionVerdict::Safe => write!(f, "safe"),
            ConversionVerdict::Lossy => write!(f, "lossy"),
            ConversionVerdict::Unsafe => write!(f, "unsafe"),
        }
    }
}

/// Grade the conversion of a `source` type string into a `dest` type string.
///
/// Only the base types matter; length, precision and trailing constraint
/// tokens are ignored.
pub fn classify(source: &str, dest: &str) -> ConversionVerdict {
    let src_base = base_type(source);
    let dst_base = base_type(dest);
    classify_base(&src_base, &dst_base)
}

fn classify_base(src_base: &str, dst_base: &str) -> ConversionVerdict {
    use ConversionVerdict::*;
    use TypeCategory as C;

    if src_base == dst_base {
        return Safe;
    }

    let src = category_of(src_base);
    let dst = category_of(dst_base);

    match (src, dst) {
        // Bytes reinterpreted as text may not be valid in the target charset.
        (C::Binary, C::String) => Lossy,
        (_, C::String) => Safe,

        (C::Int, C::Int) => Safe,
        (s, C::ApproxNumeric) if s.is_numeric() => Lossy,
        (C::ApproxNumeric, C::ExactNumeric | C::Int) => Lossy,
        (C::ExactNumeric | C::Int, C::ExactNumeric) => Safe,
        // Fractional digits are truncated.
        (C::ExactNumeric, C::Int) => Lossy,

        (C::DateTime, C::DateTime) => {
            if src_base == "date" && matches!(dst_base, "datetime" | "timestamp") {
                Safe
            } else {
                Lossy
            }
        }

        (C::Binary, C::Binary) => Safe,
        (C::String, C::Binary) => Lossy,

        (_, C::Json) => Safe,

        _ => Unsafe,
    }
}
