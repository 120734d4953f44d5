//! In-memory [`LiveDatabase`] for tests.
//!
//! Understands just enough of the generated SQL to behave like a server:
//! `CREATE TABLE`, `DROP TABLE IF EXISTS`, `SELECT COUNT(*) FROM` and the
//! batched `INSERT ... SELECT ... LIMIT n OFFSET m`, whose affected rows are
//! derived from the row count of the table after `FROM`. Inserted rows only
//! become visible on commit. Every statement, including transaction control,
//! is recorded in order.

use std::collections::HashMap;

use async_trait::async_trait;
use indexmap::IndexMap;

use super::{DbWarning, LiveDatabase};
use crate::error::{RemapError, Result};
use crate::schema::LiveColumn;

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<LiveColumn>,
    rows: u64,
}

#[derive(Debug, Default)]
pub struct MemoryDatabase {
    tables: IndexMap<String, MemoryTable>,
    statements: Vec<String>,
    pending: HashMap<String, u64>,
    in_transaction: bool,
    inserts: usize,
    commits: usize,
    last_warnings: Vec<DbWarning>,
    insert_warnings: Vec<DbWarning>,
    fail_insert_at: Option<usize>,
    fail_commit_at: Option<usize>,
    fail_pattern: Option<String>,
    fail_count: bool,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, name: impl Into<String>, columns: Vec<LiveColumn>, rows: u64) -> Self {
        self.tables.insert(name.into(), MemoryTable { columns, rows });
        self
    }

    /// Fail the `n`th INSERT statement (1-based).
    pub fn fail_insert_at(mut self, n: usize) -> Self {
        self.fail_insert_at = Some(n);
        self
    }

    /// Fail the `n`th COMMIT (1-based).
    pub fn fail_commit_at(mut self, n: usize) -> Self {
        self.fail_commit_at = Some(n);
        self
    }

    /// Fail any statement containing `pattern`.
    pub fn fail_on(mut self, pattern: impl Into<String>) -> Self {
        self.fail_pattern = Some(pattern.into());
        self
    }

    pub fn fail_count(mut self) -> Self {
        self.fail_count = true;
        self
    }

    /// Warnings reported after every INSERT.
    pub fn with_insert_warnings(mut self, warnings: Vec<DbWarning>) -> Self {
        self.insert_warnings = warnings;
        self
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Statements starting with `prefix`.
    pub fn statements_starting_with(&self, prefix: &str) -> Vec<&str> {
        self.statements
            .iter()
            .filter(|s| s.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    /// Committed rows in `table`.
    pub fn row_count(&self, table: &str) -> Option<u64> {
        self.tables.get(table).map(|t| t.rows)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    fn fail(&self, sql: &str, message: &str) -> RemapError {
        RemapError::database(format!("executing {}", first_words(sql)), message)
    }

    fn insert(&mut self, sql: &str) -> Result<u64> {
        self.inserts += 1;
        if self.fail_insert_at == Some(self.inserts) {
            return Err(self.fail(sql, "simulated insert failure"));
        }
        let parsed = parse_insert(sql).ok_or_else(|| self.fail(sql, "unparseable INSERT"))?;
        let Some(source) = self.tables.get(&parsed.source) else {
            return Err(self.fail(sql, &format!("Table '{}' doesn't exist", parsed.source)));
        };
        if !self.tables.contains_key(&parsed.destination) {
            return Err(self.fail(sql, &format!("Table '{}' doesn't exist", parsed.destination)));
        }

        let affected = source.rows.saturating_sub(parsed.offset).min(parsed.limit);
        *self.pending.entry(parsed.destination).or_insert(0) += affected;
        if !self.in_transaction {
            self.apply_pending();
        }
        self.last_warnings = self.insert_warnings.clone();
        Ok(affected)
    }

    fn apply_pending(&mut self) {
        for (table, rows) in self.pending.drain() {
            if let Some(t) = self.tables.get_mut(&table) {
                t.rows += rows;
            }
        }
    }
}

struct ParsedInsert {
    destination: String,
    source: String,
    limit: u64,
    offset: u64,
}

fn first_words(sql: &str) -> String {
    sql.split_whitespace().take(2).collect::<Vec<_>>().join(" ")
}

/// Leading identifier, backquoted or bare.
fn leading_identifier(text: &str) -> Option<String> {
    let text = text.trim_start();
    if let Some(rest) = text.strip_prefix('`') {
        let end = rest.find('`')?;
        Some(rest[..end].to_string())
    } else {
        text.split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}

fn parse_insert(sql: &str) -> Option<ParsedInsert> {
    let destination = leading_identifier(sql.strip_prefix("INSERT INTO ")?)?;
    let from = sql.find(" FROM ")?;
    let source = leading_identifier(&sql[from + " FROM ".len()..])?;

    let limit_at = sql.rfind(" LIMIT ")?;
    let mut tail = sql[limit_at + " LIMIT ".len()..].split_whitespace();
    let limit = tail.next()?.parse().ok()?;
    let offset = match tail.next() {
        Some("OFFSET") => tail.next()?.parse().ok()?,
        _ => 0,
    };
    Some(ParsedInsert {
        destination,
        source,
        limit,
        offset,
    })
}

#[async_trait]
impl LiveDatabase for MemoryDatabase {
    async fn list_tables(&mut self) -> Result<Vec<String>> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn describe_columns(&mut self, table: &str) -> Result<Vec<LiveColumn>> {
        self.tables
            .get(table)
            .map(|t| t.columns.clone())
            .ok_or_else(|| {
                RemapError::database(
                    format!("describing table {}", table),
                    format!("Table '{}' doesn't exist", table),
                )
            })
    }

    async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.statements.push(sql.to_string());
        self.last_warnings.clear();
        if let Some(pattern) = &self.fail_pattern {
            if sql.contains(pattern.as_str()) {
                return Err(self.fail(sql, "simulated failure"));
            }
        }

        if sql.starts_with("INSERT INTO ") {
            return self.insert(sql);
        }
        if let Some(rest) = sql.strip_prefix("DROP TABLE IF EXISTS ") {
            if let Some(name) = leading_identifier(rest) {
                self.tables.shift_remove(&name);
            }
            return Ok(0);
        }
        if let Some(rest) = sql.strip_prefix("CREATE TABLE ") {
            let name = leading_identifier(rest).ok_or_else(|| self.fail(sql, "missing table name"))?;
            if self.tables.contains_key(&name) {
                return Err(self.fail(sql, &format!("Table '{}' already exists", name)));
            }
            self.tables.insert(name, MemoryTable::default());
            return Ok(0);
        }
        Ok(0)
    }

    async fn count(&mut self, sql: &str) -> Result<i64> {
        self.statements.push(sql.to_string());
        if self.fail_count {
            return Err(self.fail(sql, "simulated count failure"));
        }
        let table = sql
            .find(" FROM ")
            .and_then(|at| leading_identifier(&sql[at + " FROM ".len()..]))
            .ok_or_else(|| self.fail(sql, "unparseable count"))?;
        self.tables
            .get(&table)
            .map(|t| t.rows as i64)
            .ok_or_else(|| self.fail(sql, &format!("Table '{}' doesn't exist", table)))
    }

    async fn begin(&mut self) -> Result<()> {
        self.statements.push("START TRANSACTION".to_string());
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.statements.push("COMMIT".to_string());
        self.commits += 1;
        if self.fail_commit_at == Some(self.commits) {
            return Err(self.fail("COMMIT", "simulated commit failure"));
        }
        self.apply_pending();
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.statements.push("ROLLBACK".to_string());
        self.pending.clear();
        self.in_transaction = false;
        Ok(())
    }

    async fn warnings(&mut self) -> Result<Vec<DbWarning>> {
        Ok(self.last_warnings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_select_rows_follow_limit_and_offset() {
        let mut db = MemoryDatabase::new()
            .with_table("src", vec![LiveColumn::new("id", "int").primary()], 12)
            .with_table("dst", vec![], 0);

        let sql = |offset| format!("INSERT INTO `dst` (`id`) SELECT `id` FROM `src` ORDER BY `src`.`id` LIMIT 5 OFFSET {}", offset);
        assert_eq!(db.execute(&sql(0)).await.unwrap(), 5);
        assert_eq!(db.execute(&sql(10)).await.unwrap(), 2);
        assert_eq!(db.execute(&sql(15)).await.unwrap(), 0);
        assert_eq!(db.row_count("dst"), Some(7));
    }

    #[tokio::test]
    async fn test_rollback_discards_pending_rows() {
        let mut db = MemoryDatabase::new()
            .with_table("src", vec![], 3)
            .with_table("dst", vec![], 0);

        db.begin().await.unwrap();
        db.execute("INSERT INTO `dst` (`a`) SELECT `a` FROM `src` LIMIT 10 OFFSET 0")
            .await
            .unwrap();
        assert_eq!(db.row_count("dst"), Some(0));
        db.rollback().await.unwrap();
        assert_eq!(db.row_count("dst"), Some(0));

        db.begin().await.unwrap();
        db.execute("INSERT INTO `dst` (`a`) SELECT `a` FROM `src` LIMIT 10 OFFSET 0")
            .await
            .unwrap();
        db.commit().await.unwrap();
        assert_eq!(db.row_count("dst"), Some(3));
    }

    #[tokio::test]
    async fn test_create_drop_and_count() {
        let mut db = MemoryDatabase::new().with_table("src", vec![], 42);
        db.execute("CREATE TABLE `t_new` (\n    `id` INT\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4")
            .await
            .unwrap();
        assert!(db.has_table("t_new"));
        assert!(db.execute("CREATE TABLE `t_new` (`id` INT)").await.is_err());
        db.execute("DROP TABLE IF EXISTS `t_new`").await.unwrap();
        assert!(!db.has_table("t_new"));

        assert_eq!(db.count("SELECT COUNT(*) FROM `src`").await.unwrap(), 42);
        assert!(db.describe_columns("missing").await.is_err());
    }
}
