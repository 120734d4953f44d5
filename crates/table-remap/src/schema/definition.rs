//! Target schema definition files.
//!
//! The format is line oriented:
//!
//! ```text
//! # comment
//! Table: Users
//! id INT AUTO_INCREMENT PRIMARY KEY
//! `name` VARCHAR(50) NOT NULL
//! ```
//!
//! Blank lines and lines starting with `#` or `--` are ignored. A `Table:` line
//! opens a table (replacing an earlier table of the same name); every other line
//! is a column name followed by its raw definition. Malformed lines are skipped
//! so hand-edited files stay usable.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::live::LiveColumn;
use crate::error::RemapError;

/// Ordered column name → raw definition for one target table.
pub type TableDefinition = IndexMap<String, String>;

const TABLE_PREFIX: &str = "Table:";

/// Parsed target schema: ordered table name → table definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSchema {
    tables: IndexMap<String, TableDefinition>,
}

/// Result of loading a definition file.
///
/// A read failure part-way through keeps the tables parsed so far; the error
/// is reported alongside them rather than discarding the partial schema.
#[derive(Debug)]
pub struct LoadedDefinition {
    pub schema: TargetSchema,
    pub error: Option<RemapError>,
}

impl TargetSchema {
    /// Load and parse a definition file.
    pub fn load<P: AsRef<Path>>(path: P) -> LoadedDefinition {
        let path = path.as_ref();
        let mut parser = Parser::default();

        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                warn!("Cannot open schema definition {:?}: {}", path, e);
                return LoadedDefinition {
                    schema: TargetSchema::default(),
                    error: Some(RemapError::Parse {
                        path: path.to_path_buf(),
                        line: 0,
                        message: e.to_string(),
                    }),
                };
            }
        };

        for (idx, line) in BufReader::new(file).lines().enumerate() {
            match line {
                Ok(line) => parser.feed(&line),
                Err(e) => {
                    warn!(
                        "Stopped reading schema definition {:?} at line {}: {}",
                        path,
                        idx + 1,
                        e
                    );
                    return LoadedDefinition {
                        schema: parser.finish(),
                        error: Some(RemapError::Parse {
                            path: path.to_path_buf(),
                            line: idx + 1,
                            message: e.to_string(),
                        }),
                    };
                }
            }
        }

        let schema = parser.finish();
        debug!("Parsed {} tables from {:?}", schema.len(), path);
        LoadedDefinition {
            schema,
            error: None,
        }
    }

    /// Parse definition text held in memory.
    pub fn parse_str(text: &str) -> Self {
        let mut parser = Parser::default();
        for line in text.lines() {
            parser.feed(line);
        }
        parser.finish()
    }

    /// Render the schema back into the definition file format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, (table, columns)) in self.tables.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!("{} {}\n", TABLE_PREFIX, table));
            for (column, definition) in columns {
                out.push_str(&format!("{} {}\n", column, definition));
            }
        }
        out
    }

    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables.get(name)
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &TableDefinition)> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Add or replace a table definition. Used when building a schema to render.
    pub fn with_table(mut self, name: impl Into<String>, columns: TableDefinition) -> Self {
        self.tables.insert(name.into(), columns);
        self
    }
}

/// Line-at-a-time parser state.
#[derive(Default)]
struct Parser {
    tables: IndexMap<String, TableDefinition>,
    current: Option<String>,
}

impl Parser {
    fn feed(&mut self, raw: &str) {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("--") {
            return;
        }

        if let Some(rest) = line.strip_prefix(TABLE_PREFIX) {
            let mut tokens = rest.split_whitespace();
            match (tokens.next(), tokens.next()) {
                (Some(name), None) if rest.starts_with(char::is_whitespace) => {
                    let name = strip_quotes(name).to_string();
                    if name.is_empty() {
                        return;
                    }
                    // A repeated table header replaces the earlier table.
                    self.tables.insert(name.clone(), TableDefinition::new());
                    self.current = Some(name);
                }
                _ => {
                    debug!("Skipping malformed table header: {:?}", line);
                    self.current = None;
                }
            }
            return;
        }

        let Some(table) = self.current.as_ref() else {
            return;
        };

        let Some((name, definition)) = line.split_once(char::is_whitespace) else {
            debug!("Skipping column line without definition: {:?}", line);
            return;
        };
        let name = strip_quotes(name);
        let definition = definition.trim();
        if name.is_empty() || definition.is_empty() {
            return;
        }

        if let Some(columns) = self.tables.get_mut(table) {
            columns.insert(name.to_string(), definition.to_string());
        }
    }

    fn finish(self) -> TargetSchema {
        TargetSchema {
            tables: self.tables,
        }
    }
}

fn strip_quotes(name: &str) -> &str {
    name.trim_matches(|c| c == '`' || c == '"' || c == '\'')
}

/// Build a draft table definition from live columns.
///
/// Produces definitions an operator can edit into the target layout:
/// type, nullability, default, extra attribute and an inline primary key for
/// single-column keys.
pub fn definition_from_live(columns: &[LiveColumn]) -> TableDefinition {
    let pk_count = columns.iter().filter(|c| c.is_primary()).count();
    if pk_count > 1 {
        warn!("Composite primary key is not expressed inline; add it to the definition by hand");
    }

    columns
        .iter()
        .map(|col| {
            let mut parts = vec![uppercase_unquoted(&col.data_type)];
            if !col.nullable {
                parts.push("NOT NULL".to_string());
            }
            if let Some(default) = &col.default {
                parts.push(format!("DEFAULT {}", default_literal(default)));
            }
            let extra = col
                .extra
                .split_whitespace()
                .filter(|t| !t.eq_ignore_ascii_case("DEFAULT_GENERATED"))
                .collect::<Vec<_>>()
                .join(" ");
            if !extra.is_empty() {
                parts.push(extra.to_uppercase());
            }
            if col.is_primary() && pk_count == 1 {
                parts.push("PRIMARY KEY".to_string());
            }
            (col.name.clone(), parts.join(" "))
        })
        .collect()
}

/// Uppercase a type string, leaving quoted enum/set members untouched.
fn uppercase_unquoted(data_type: &str) -> String {
    let mut in_quote = false;
    data_type
        .chars()
        .map(|c| {
            if c == '\'' {
                in_quote = !in_quote;
            }
            if in_quote {
                c
            } else {
                c.to_ascii_uppercase()
            }
        })
        .collect()
}

fn default_literal(value: &str) -> String {
    let upper = value.to_uppercase();
    let is_keyword = upper == "NULL" || upper.starts_with("CURRENT_TIMESTAMP");
    let is_number = !value.is_empty() && value.parse::<f64>().is_ok();
    if is_keyword || is_number {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
# Target layout
-- generated by hand
id INT
Table: Users
id INT AUTO_INCREMENT PRIMARY KEY
`name` VARCHAR(50) NOT NULL
"email"   VARCHAR(255)

Table: Orders
id BIGINT
lonely
total DECIMAL(10,2) DEFAULT 0
"#;

    #[test]
    fn test_parse_tables_and_columns() {
        let schema = TargetSchema::parse_str(SAMPLE);
        assert_eq!(schema.table_names().collect::<Vec<_>>(), vec!["Users", "Orders"]);

        let users = schema.table("Users").unwrap();
        assert_eq!(
            users.keys().collect::<Vec<_>>(),
            vec!["id", "name", "email"]
        );
        assert_eq!(users["id"], "INT AUTO_INCREMENT PRIMARY KEY");
        assert_eq!(users["name"], "VARCHAR(50) NOT NULL");
        assert_eq!(users["email"], "VARCHAR(255)");
    }

    #[test]
    fn test_lines_before_first_table_are_ignored() {
        let schema = TargetSchema::parse_str("id INT\nname TEXT\n");
        assert!(schema.is_empty());
    }

    #[test]
    fn test_malformed_column_line_skipped() {
        let schema = TargetSchema::parse_str(SAMPLE);
        let orders = schema.table("Orders").unwrap();
        assert_eq!(orders.len(), 2);
        assert!(!orders.contains_key("lonely"));
    }

    #[test]
    fn test_duplicate_column_last_wins() {
        let schema = TargetSchema::parse_str("Table: t\na INT\nb TEXT\na BIGINT\n");
        let t = schema.table("t").unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t["a"], "BIGINT");
    }

    #[test]
    fn test_repeated_table_header_replaces_table() {
        let schema = TargetSchema::parse_str("Table: t\na INT\nTable: u\nx INT\nTable: t\nb TEXT\n");
        let t = schema.table("t").unwrap();
        assert_eq!(t.keys().collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(schema.len(), 2);
    }

    #[test]
    fn test_table_header_requires_whitespace_and_single_name() {
        let schema = TargetSchema::parse_str("Table:Users\na INT\nTable: two words\nb INT\n");
        assert!(schema.is_empty());
    }

    #[test]
    fn test_render_round_trip() {
        let schema = TargetSchema::parse_str(SAMPLE);
        let rendered = schema.render();
        assert_eq!(TargetSchema::parse_str(&rendered), schema);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let loaded = TargetSchema::load(file.path());
        assert!(loaded.error.is_none());
        assert_eq!(loaded.schema.len(), 2);
    }

    #[test]
    fn test_load_missing_file_reports_parse_error() {
        let loaded = TargetSchema::load("/nonexistent/schema.txt");
        assert!(loaded.schema.is_empty());
        assert!(matches!(loaded.error, Some(RemapError::Parse { .. })));
    }

    #[test]
    fn test_load_keeps_tables_before_invalid_utf8() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"Table: a\nx INT\n").unwrap();
        file.write_all(&[0xff, 0xfe, b'\n']).unwrap();
        file.write_all(b"Table: b\ny INT\n").unwrap();

        let loaded = TargetSchema::load(file.path());
        assert!(matches!(loaded.error, Some(RemapError::Parse { line: 3, .. })));
        assert!(loaded.schema.contains_table("a"));
        assert!(!loaded.schema.contains_table("b"));
    }

    #[test]
    fn test_definition_from_live() {
        let mut created = LiveColumn::new("created_at", "timestamp").not_null();
        created.default = Some("CURRENT_TIMESTAMP".to_string());
        created.extra = "DEFAULT_GENERATED".to_string();
        let mut status = LiveColumn::new("status", "varchar(10)");
        status.default = Some("new".to_string());
        let mut id = LiveColumn::new("id", "int").primary();
        id.extra = "auto_increment".to_string();

        let def = definition_from_live(&[id, status, created]);
        assert_eq!(def["id"], "INT NOT NULL AUTO_INCREMENT PRIMARY KEY");
        assert_eq!(def["status"], "VARCHAR(10) DEFAULT 'new'");
        assert_eq!(def["created_at"], "TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP");
    }

    #[test]
    fn test_definition_from_live_keeps_enum_members() {
        let col = LiveColumn::new("state", "enum('open','Closed')");
        let def = definition_from_live(&[col]);
        assert_eq!(def["state"], "ENUM('open','Closed')");
    }
}
