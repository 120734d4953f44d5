//! Copy plans: which source expression feeds which target column.

mod resolver;

use std::fmt;

use serde::Serialize;

use crate::error::Result;
use crate::identifier::{qualify, quote};
use crate::typemap::ConversionVerdict;

pub use resolver::{resolve_merge, resolve_single};

/// What a plan reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum PlanSource {
    Table(String),
    Merge(String),
}

impl fmt::Display for PlanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanSource::Table(name) | PlanSource::Merge(name) => write!(f, "{}", name),
        }
    }
}

/// One column of the `INSERT ... SELECT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanRow {
    /// Quoted (and possibly cast) source expression.
    pub select_expression: String,
    pub target_column: String,
    pub cast_required: bool,
    pub cast_type: Option<String>,
    pub source_type: String,
    pub dest_type: String,
    pub verdict: ConversionVerdict,
}

/// Ordered plan for one (source, target schema) pairing.
///
/// Built fresh before every execution and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyPlan {
    pub source: PlanSource,
    pub target_schema: String,
    pub rows: Vec<PlanRow>,
    /// Driving table, followed by the join clause for merges.
    pub from_clause: String,
    /// Table used for the row estimate and ordering.
    pub representative_table: String,
    /// Primary-key columns of the representative table, in key order.
    pub order_key: Vec<String>,
    /// Target columns with no source column; filled by database defaults.
    pub added_columns: Vec<String>,
    /// Merge target columns with no column-map entry.
    pub skipped_columns: Vec<String>,
}

impl CopyPlan {
    pub fn select_clause(&self) -> String {
        self.rows
            .iter()
            .map(|r| r.select_expression.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn insert_columns(&self) -> Result<String> {
        let quoted = self
            .rows
            .iter()
            .map(|r| quote(&r.target_column))
            .collect::<Result<Vec<_>>>()?;
        Ok(quoted.join(", "))
    }

    /// `ORDER BY` expression: every column of the representative key, or
    /// `NULL` for a keyless table.
    pub fn order_by(&self) -> Result<String> {
        if self.order_key.is_empty() {
            return Ok("NULL".to_string());
        }
        let qualified = self
            .order_key
            .iter()
            .map(|column| qualify(&self.representative_table, column))
            .collect::<Result<Vec<_>>>()?;
        Ok(qualified.join(", "))
    }

    pub fn lossy_conversions(&self) -> Vec<&PlanRow> {
        self.rows
            .iter()
            .filter(|r| r.verdict == ConversionVerdict::Lossy)
            .collect()
    }

    pub fn has_lossy(&self) -> bool {
        self.rows.iter().any(|r| r.verdict == ConversionVerdict::Lossy)
    }
}
