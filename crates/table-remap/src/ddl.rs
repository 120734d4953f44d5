//! CREATE/DROP statements for destination tables.

use crate::error::Result;
use crate::identifier::quote;
use crate::schema::TableDefinition;

/// True when a raw column definition declares `PRIMARY KEY` inline.
fn declares_primary_key(definition: &str) -> bool {
    definition
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .contains("primary key")
}

/// Build `CREATE TABLE` for a destination table.
///
/// Column definitions are emitted verbatim. When no definition declares a
/// primary key inline, a separate `PRIMARY KEY` on a column named `id` is
/// added if there is one. Never both.
pub fn create_table_sql(destination: &str, definition: &TableDefinition, engine: &str) -> Result<String> {
    let mut clauses = Vec::with_capacity(definition.len() + 1);
    for (column, column_definition) in definition {
        clauses.push(format!("{} {}", quote(column)?, column_definition.trim()));
    }

    let inline_key = definition.values().any(|d| declares_primary_key(d));
    if !inline_key && definition.contains_key("id") {
        clauses.push(format!("PRIMARY KEY ({})", quote("id")?));
    }

    Ok(format!(
        "CREATE TABLE {} (\n    {}\n) ENGINE={} DEFAULT CHARSET=utf8mb4",
        quote(destination)?,
        clauses.join(",\n    "),
        engine
    ))
}

pub fn drop_table_sql(destination: &str) -> Result<String> {
    Ok(format!("DROP TABLE IF EXISTS {}", quote(destination)?))
}
