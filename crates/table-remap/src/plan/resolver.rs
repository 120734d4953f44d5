//! Column pairing. Pure: works on a parsed target schema and columns that
//! were already introspected.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::{CopyPlan, PlanRow, PlanSource};
use crate::error::{RemapError, Result};
use crate::identifier::{qualify, quote};
use crate::mapping::{ColumnMap, MergeMapping};
use crate::schema::{find_column, primary_key_columns, LiveColumn, TableDefinition, TargetSchema};
use crate::typemap::{base_type, cast_target, classify, ConversionVerdict};

fn target_definition<'a>(
    subject: &str,
    schema: &'a TargetSchema,
    target_schema: &str,
) -> Result<&'a TableDefinition> {
    let definition = schema.table(target_schema).ok_or_else(|| {
        RemapError::configuration(
            subject,
            format!("target schema '{}' is not in the definition file", target_schema),
        )
    })?;
    if definition.is_empty() {
        return Err(RemapError::configuration(
            subject,
            format!("target schema '{}' declares no columns", target_schema),
        ));
    }
    Ok(definition)
}

/// Classify one pairing and build its row; `unsafe` blocks the whole target.
fn plan_row(
    target_schema: &str,
    source_label: String,
    source_expression: String,
    source: &LiveColumn,
    target_column: &str,
    dest_type: &str,
) -> Result<PlanRow> {
    let verdict = classify(&source.data_type, dest_type);
    if verdict == ConversionVerdict::Unsafe {
        return Err(RemapError::UnsafeConversion {
            target: target_schema.to_string(),
            source_column: source_label,
            source_type: source.data_type.clone(),
            target_column: target_column.to_string(),
            target_type: dest_type.to_string(),
        });
    }
    if verdict == ConversionVerdict::Lossy {
        warn!(
            "Lossy conversion for {}: {} ({}) -> {} ({})",
            target_schema, source_label, source.data_type, target_column, dest_type
        );
    }

    let cast_required = base_type(&source.data_type) != base_type(dest_type);
    let (select_expression, cast_type) = if cast_required {
        let cast = cast_target(dest_type).sql_type;
        (format!("CAST({} AS {})", source_expression, cast), Some(cast))
    } else {
        (source_expression, None)
    };

    Ok(PlanRow {
        select_expression,
        target_column: target_column.to_string(),
        cast_required,
        cast_type,
        source_type: source.data_type.clone(),
        dest_type: dest_type.to_string(),
        verdict,
    })
}

/// Plan a copy from one source table into one target schema table.
///
/// Used for single mappings and for each target of a split. `column_map`
/// maps source columns to target columns; unmapped target columns match a
/// source column of the same name.
pub fn resolve_single(
    source_table: &str,
    source_columns: &[LiveColumn],
    target_schema: &str,
    column_map: &ColumnMap,
    schema: &TargetSchema,
) -> Result<CopyPlan> {
    let definition = target_definition(source_table, schema, target_schema)?;

    let reverse: HashMap<&str, &str> = column_map
        .iter()
        .map(|(source, target)| (target.as_str(), source.as_str()))
        .collect();
    for target in reverse.keys() {
        if !definition.contains_key(*target) {
            warn!(
                "Column map of '{}' targets '{}', which {} does not declare",
                source_table, target, target_schema
            );
        }
    }

    let mut rows = Vec::with_capacity(definition.len());
    let mut added_columns = Vec::new();
    for (target_column, dest_type) in definition {
        let explicit = reverse.get(target_column.as_str()).copied();
        let source_name = explicit.unwrap_or(target_column);

        let Some(source) = find_column(source_columns, source_name) else {
            if explicit.is_some() {
                warn!(
                    "Column map of '{}' names missing source column '{}'; {} will use its default",
                    source_table, source_name, target_column
                );
            } else {
                debug!("{}.{} has no source column, using default", target_schema, target_column);
            }
            added_columns.push(target_column.clone());
            continue;
        };

        rows.push(plan_row(
            target_schema,
            format!("{}.{}", source_table, source.name),
            quote(&source.name)?,
            source,
            target_column,
            dest_type,
        )?);
    }

    if rows.is_empty() {
        return Err(RemapError::configuration(
            source_table,
            format!("no column of '{}' could be paired with a source column", target_schema),
        ));
    }

    Ok(CopyPlan {
        source: PlanSource::Table(source_table.to_string()),
        target_schema: target_schema.to_string(),
        rows,
        from_clause: quote(source_table)?,
        representative_table: source_table.to_string(),
        order_key: key_names(source_columns),
        added_columns,
        skipped_columns: Vec::new(),
    })
}

fn key_names(columns: &[LiveColumn]) -> Vec<String> {
    primary_key_columns(columns)
        .into_iter()
        .map(|c| c.name.clone())
        .collect()
}

/// Plan a merge. `sources` holds the introspected columns of every source
/// table named by the merge.
pub fn resolve_merge(
    key: &str,
    merge: &MergeMapping,
    sources: &[(String, Vec<LiveColumn>)],
    schema: &TargetSchema,
) -> Result<CopyPlan> {
    let definition = target_definition(key, schema, &merge.target_schema)?;
    let driving = merge
        .driving_table()
        .ok_or_else(|| RemapError::configuration(key, "merge has no source tables"))?;
    if merge.join_clause.trim().is_empty() {
        return Err(RemapError::configuration(key, "join clause is empty"));
    }

    let columns_of = |table: &str| {
        sources
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, columns)| columns.as_slice())
    };

    // Every column-map key must name an existing column of a merge source.
    let mut by_target: HashMap<&str, Vec<(&str, &LiveColumn)>> = HashMap::new();
    for (qualified, target_column) in &merge.column_map {
        let (table, column) = qualified.split_once('.').ok_or_else(|| {
            RemapError::configuration(key, format!("column map key '{}' is not table.column", qualified))
        })?;
        if !merge.contains_source(table) {
            return Err(RemapError::configuration(
                key,
                format!("'{}' names table '{}', which is not a merge source", qualified, table),
            ));
        }
        let source = columns_of(table)
            .and_then(|columns| find_column(columns, column))
            .ok_or_else(|| {
                RemapError::configuration(
                    key,
                    format!("source column '{}' does not exist", qualified),
                )
            })?;
        by_target
            .entry(target_column.as_str())
            .or_default()
            .push((table, source));
    }

    let mut rows = Vec::with_capacity(definition.len());
    let mut skipped_columns = Vec::new();
    for (target_column, dest_type) in definition {
        match by_target.get(target_column.as_str()).map(Vec::as_slice) {
            None | Some([]) => {
                warn!("{}: no source column mapped to '{}', skipping", key, target_column);
                skipped_columns.push(target_column.clone());
            }
            Some([(table, source)]) => {
                rows.push(plan_row(
                    &merge.target_schema,
                    format!("{}.{}", table, source.name),
                    qualify(table, &source.name)?,
                    source,
                    target_column,
                    dest_type,
                )?);
            }
            Some(many) => {
                let names: Vec<String> = many
                    .iter()
                    .map(|(table, source)| format!("{}.{}", table, source.name))
                    .collect();
                return Err(RemapError::configuration(
                    key,
                    format!("'{}' is mapped from {}", target_column, names.join(" and ")),
                ));
            }
        }
    }

    if rows.is_empty() {
        return Err(RemapError::configuration(
            key,
            format!("no column of '{}' is mapped", merge.target_schema),
        ));
    }

    let order_key = columns_of(driving).map(key_names).unwrap_or_default();

    Ok(CopyPlan {
        source: PlanSource::Merge(key.to_string()),
        target_schema: merge.target_schema.clone(),
        rows,
        from_clause: format!("{} {}", quote(driving)?, merge.join_clause.trim()),
        representative_table: driving.to_string(),
        order_key,
        added_columns: Vec::new(),
        skipped_columns,
    })
}
