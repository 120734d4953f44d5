//! Best-effort merge drafts: join chain and column correspondences guessed
//! from column names.
//!
//! The draft is advisory. Nothing here writes the mapping store; the operator
//! reviews the draft and decides whether to save it.

use serde::Serialize;
use tracing::debug;

use super::entry::{ColumnMap, MergeMapping};
use crate::error::{RemapError, Result};
use crate::identifier::{qualify, quote};
use crate::schema::{find_column, primary_key, LiveColumn, TableDefinition};

/// A suggested merge mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeDraft {
    pub source_tables: Vec<String>,
    pub target_schema: String,
    /// One line per joined table; unresolved joins are block comments.
    pub join_clause: String,
    pub column_map: ColumnMap,
    /// Target columns no source table provides by name.
    pub unmapped: Vec<String>,
    /// Tables whose join condition could not be guessed.
    pub unresolved_joins: Vec<String>,
}

impl MergeDraft {
    /// True when every join was guessed and every target column found a source.
    pub fn is_complete(&self) -> bool {
        self.unmapped.is_empty() && self.unresolved_joins.is_empty()
    }

    pub fn into_mapping(self) -> MergeMapping {
        MergeMapping {
            source_tables: self.source_tables,
            target_schema: self.target_schema,
            join_clause: self.join_clause,
            column_map: self.column_map,
        }
    }
}

/// Guess the join key of a table: a column named `id`, else the first
/// primary-key column.
fn guess_key(columns: &[LiveColumn]) -> Option<&str> {
    find_column(columns, "id")
        .or_else(|| primary_key(columns))
        .map(|c| c.name.as_str())
}

/// Draft a merge of `sources` (in operator order, with their live columns)
/// into `target_schema`.
pub fn suggest_merge(
    sources: &[(String, Vec<LiveColumn>)],
    target_schema: &str,
    target: &TableDefinition,
) -> Result<MergeDraft> {
    if sources.len() < 2 {
        return Err(RemapError::configuration(
            target_schema,
            "a merge needs at least two source tables",
        ));
    }

    let mut join_lines = Vec::with_capacity(sources.len() - 1);
    let mut unresolved_joins = Vec::new();
    for pair in sources.windows(2) {
        let (prev_table, prev_columns) = &pair[0];
        let (table, columns) = &pair[1];
        let link = format!("{}_id", prev_table);

        match guess_key(prev_columns) {
            Some(key) if find_column(columns, &link).is_some() => {
                join_lines.push(format!(
                    "INNER JOIN {} ON {} = {}",
                    quote(table)?,
                    qualify(prev_table, key)?,
                    qualify(table, &link)?
                ));
            }
            _ => {
                debug!("No join key found between '{}' and '{}'", prev_table, table);
                join_lines.push(format!(
                    "/* no join condition found for {}: expected {} */",
                    quote(table)?,
                    qualify(table, &link)?
                ));
                unresolved_joins.push(table.clone());
            }
        }
    }

    let mut column_map = ColumnMap::new();
    let mut unmapped = Vec::new();
    for target_column in target.keys() {
        let supplier = sources
            .iter()
            .find(|(_, columns)| find_column(columns, target_column).is_some());
        match supplier {
            Some((table, _)) => {
                column_map.insert(format!("{}.{}", table, target_column), target_column.clone());
            }
            None => unmapped.push(target_column.clone()),
        }
    }

    Ok(MergeDraft {
        source_tables: sources.iter().map(|(t, _)| t.clone()).collect(),
        target_schema: target_schema.to_string(),
        join_clause: join_lines.join("\n"),
        column_map,
        unmapped,
        unresolved_joins,
    })
}
