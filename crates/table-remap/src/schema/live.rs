//! Live table metadata as returned by introspection.

use serde::{Deserialize, Serialize};

/// Key role of a live column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRole {
    Primary,
    Unique,
    #[default]
    None,
}

impl KeyRole {
    /// Parse the `Key` column of `SHOW COLUMNS` (`PRI`, `UNI`, `MUL`, empty).
    pub fn from_mysql(key: &str) -> Self {
        match key.trim().to_uppercase().as_str() {
            "PRI" => KeyRole::Primary,
            "UNI" => KeyRole::Unique,
            _ => KeyRole::None,
        }
    }
}

/// One column of a live table.
///
/// A read-only snapshot; callers re-introspect instead of caching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveColumn {
    pub name: String,
    /// Full type string, e.g. `varchar(50)` or `int unsigned`.
    pub data_type: String,
    pub nullable: bool,
    pub key: KeyRole,
    /// Default value; `None` when the column has no default (or defaults to NULL).
    pub default: Option<String>,
    /// Extra attribute such as `auto_increment`.
    pub extra: String,
}

impl LiveColumn {
    /// Convenience constructor for a nullable, unkeyed column.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            key: KeyRole::None,
            default: None,
            extra: String::new(),
        }
    }

    /// Mark the column as the primary key (and NOT NULL).
    pub fn primary(mut self) -> Self {
        self.key = KeyRole::Primary;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn is_primary(&self) -> bool {
        self.key == KeyRole::Primary
    }
}

/// Find a column by exact name.
pub fn find_column<'a>(columns: &'a [LiveColumn], name: &str) -> Option<&'a LiveColumn> {
    columns.iter().find(|c| c.name == name)
}

/// First primary-key column of a table, if any.
pub fn primary_key(columns: &[LiveColumn]) -> Option<&LiveColumn> {
    columns.iter().find(|c| c.is_primary())
}

/// Every primary-key column, in declaration order.
pub fn primary_key_columns(columns: &[LiveColumn]) -> Vec<&LiveColumn> {
    columns.iter().filter(|c| c.is_primary()).collect()
}
