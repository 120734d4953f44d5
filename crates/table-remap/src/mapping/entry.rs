//! Mapping entry variants.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{RemapError, Result};

/// Column correspondences. For single/split entries the key is the source
/// column; for merges it is `table.column`. The value is the target column.
pub type ColumnMap = IndexMap<String, String>;

/// One stored mapping, keyed in the store by [`MappingEntry::key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MappingEntry {
    Single(SingleMapping),
    Split(SplitMapping),
    Merge(MergeMapping),
}

/// One source table copied into one target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleMapping {
    pub source_table: String,
    pub target_schema: String,
    #[serde(default)]
    pub column_map: ColumnMap,
}

/// One source table copied into several target tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitMapping {
    pub source_table: String,
    pub targets: Vec<SplitTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitTarget {
    pub target_schema: String,
    #[serde(default)]
    pub column_map: ColumnMap,
}

/// Several source tables joined into one target table.
///
/// `source_tables` keeps operator order; the first one drives the FROM clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeMapping {
    pub source_tables: Vec<String>,
    pub target_schema: String,
    /// Operator-authored SQL appended after the driving table.
    #[serde(default)]
    pub join_clause: String,
    #[serde(default)]
    pub column_map: ColumnMap,
}

impl SingleMapping {
    pub fn new(source_table: impl Into<String>, target_schema: impl Into<String>) -> Self {
        Self {
            source_table: source_table.into(),
            target_schema: target_schema.into(),
            column_map: ColumnMap::new(),
        }
    }

    pub fn with_column(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.column_map.insert(source.into(), target.into());
        self
    }
}

impl SplitTarget {
    pub fn new(target_schema: impl Into<String>) -> Self {
        Self {
            target_schema: target_schema.into(),
            column_map: ColumnMap::new(),
        }
    }

    pub fn with_column(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.column_map.insert(source.into(), target.into());
        self
    }
}

impl MergeMapping {
    /// The table the FROM clause starts with.
    pub fn driving_table(&self) -> Option<&str> {
        self.source_tables.first().map(String::as_str)
    }

    pub fn key(&self) -> String {
        merge_key(&self.source_tables, &self.target_schema)
    }

    pub fn contains_source(&self, table: &str) -> bool {
        self.source_tables.iter().any(|t| t == table)
    }
}

/// Store key for a merge: `MERGE: a,b -> target` with sources sorted.
pub fn merge_key<S: AsRef<str>>(source_tables: &[S], target_schema: &str) -> String {
    let mut sources: Vec<&str> = source_tables.iter().map(AsRef::as_ref).collect();
    sources.sort_unstable();
    format!("MERGE: {} -> {}", sources.join(","), target_schema)
}

impl MappingEntry {
    /// Store key: the source table, or the merge key.
    pub fn key(&self) -> String {
        match self {
            MappingEntry::Single(m) => m.source_table.clone(),
            MappingEntry::Split(m) => m.source_table.clone(),
            MappingEntry::Merge(m) => m.key(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            MappingEntry::Single(_) => "single",
            MappingEntry::Split(_) => "split",
            MappingEntry::Merge(_) => "merge",
        }
    }

    /// Source tables read by this entry.
    pub fn source_tables(&self) -> Vec<&str> {
        match self {
            MappingEntry::Single(m) => vec![m.source_table.as_str()],
            MappingEntry::Split(m) => vec![m.source_table.as_str()],
            MappingEntry::Merge(m) => m.source_tables.iter().map(String::as_str).collect(),
        }
    }

    /// Target schema tables written by this entry, in order.
    pub fn target_schemas(&self) -> Vec<&str> {
        match self {
            MappingEntry::Single(m) => vec![m.target_schema.as_str()],
            MappingEntry::Split(m) => m.targets.iter().map(|t| t.target_schema.as_str()).collect(),
            MappingEntry::Merge(m) => vec![m.target_schema.as_str()],
        }
    }

    /// Check the invariants that hold for an entry on its own.
    pub fn validate(&self) -> Result<()> {
        let key = self.key();
        match self {
            MappingEntry::Single(m) => {
                require_name(&key, "source table", &m.source_table)?;
                require_name(&key, "target schema", &m.target_schema)?;
                unique_targets(&key, &m.column_map)
            }
            MappingEntry::Split(m) => {
                require_name(&key, "source table", &m.source_table)?;
                if m.targets.is_empty() {
                    return Err(RemapError::configuration(key, "split mapping has no targets"));
                }
                let mut seen = HashSet::new();
                for target in &m.targets {
                    require_name(&key, "target schema", &target.target_schema)?;
                    if !seen.insert(target.target_schema.as_str()) {
                        return Err(RemapError::configuration(
                            key,
                            format!("target schema '{}' listed twice", target.target_schema),
                        ));
                    }
                    unique_targets(&key, &target.column_map)?;
                }
                Ok(())
            }
            MappingEntry::Merge(m) => {
                require_name(&key, "target schema", &m.target_schema)?;
                let mut seen = HashSet::new();
                for table in &m.source_tables {
                    require_name(&key, "source table", table)?;
                    if !seen.insert(table.as_str()) {
                        return Err(RemapError::configuration(
                            key,
                            format!("source table '{}' listed twice", table),
                        ));
                    }
                }
                if seen.len() < 2 {
                    return Err(RemapError::configuration(
                        key,
                        "a merge needs at least two source tables",
                    ));
                }
                unique_targets(&key, &m.column_map)
            }
        }
    }
}

fn require_name(key: &str, what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RemapError::configuration(key, format!("{} is empty", what)));
    }
    Ok(())
}

fn unique_targets(key: &str, map: &ColumnMap) -> Result<()> {
    let mut seen = HashSet::new();
    for target in map.values() {
        if !seen.insert(target.as_str()) {
            return Err(RemapError::configuration(
                key,
                format!("column '{}' is mapped from more than one source column", target),
            ));
        }
    }
    Ok(())
}
