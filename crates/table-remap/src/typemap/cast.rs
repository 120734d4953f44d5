//! CAST targets for explicit conversions in `INSERT ... SELECT`.

use tracing::warn;

use super::{base_type, category_of, TypeCategory};

const CHAR_UTF8: &str = "CHAR CHARACTER SET utf8mb4";
const DEFAULT_DECIMAL: (u32, u32) = (65, 30);

/// The type written inside `CAST(expr AS <type>)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastTarget {
    pub sql_type: String,
    /// True when the destination type was not recognized and the CHAR
    /// fallback was used.
    pub fallback: bool,
}

impl CastTarget {
    fn of(sql_type: impl Into<String>) -> Self {
        Self {
            sql_type: sql_type.into(),
            fallback: false,
        }
    }
}

/// Pick the CAST type for a destination type string.
pub fn cast_target(dest: &str) -> CastTarget {
    let base = base_type(dest);
    match category_of(&base) {
        TypeCategory::Int => {
            if dest.to_lowercase().split_whitespace().any(|t| t == "unsigned") {
                CastTarget::of("UNSIGNED")
            } else {
                CastTarget::of("SIGNED")
            }
        }
        TypeCategory::ApproxNumeric => CastTarget::of("DOUBLE"),
        TypeCategory::ExactNumeric => {
            let (precision, scale) = decimal_args(dest).unwrap_or(DEFAULT_DECIMAL);
            CastTarget::of(format!("DECIMAL({},{})", precision, scale))
        }
        TypeCategory::String => CastTarget::of(CHAR_UTF8),
        TypeCategory::DateTime => match base.as_str() {
            "date" => CastTarget::of("DATE"),
            "time" => CastTarget::of("TIME"),
            "year" => CastTarget::of("SIGNED"),
            // datetime, and timestamp which CAST does not accept
            _ => CastTarget::of("DATETIME"),
        },
        TypeCategory::Binary => CastTarget::of("BINARY"),
        TypeCategory::Json => CastTarget::of("JSON"),
        TypeCategory::Other => {
            warn!(
                "No CAST mapping for destination type '{}', falling back to {}",
                dest, CHAR_UTF8
            );
            CastTarget {
                sql_type: CHAR_UTF8.to_string(),
                fallback: true,
            }
        }
    }
}

/// Parse `(precision[,scale])` directly following the base type token.
fn decimal_args(dest: &str) -> Option<(u32, u32)> {
    let (head, rest) = dest.split_once('(')?;
    if head.split_whitespace().count() != 1 {
        return None;
    }
    let (args, _) = rest.split_once(')')?;
    let mut parts = args.split(',').map(str::trim);
    let precision = parts.next()?.parse().ok()?;
    let scale = match parts.next() {
        Some(s) => s.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((precision, scale))
}
