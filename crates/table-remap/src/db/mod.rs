//! Live database access.
//!
//! The engine never talks to a driver directly; it goes through the
//! [`LiveDatabase`] capability:
//!
//! - [`MysqlDatabase`]: MySQL/MariaDB over `mysql_async`
//! - `MemoryDatabase`: in-memory stand-in, compiled for unit tests only
//!
//! Methods take `&mut self`: one logical operation at a time per handle.

#[cfg(test)]
mod memory;
mod mysql;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::schema::LiveColumn;

#[cfg(test)]
pub use memory::MemoryDatabase;
pub use mysql::MysqlDatabase;

/// A server-side warning raised by the last statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbWarning {
    pub level: String,
    pub code: u32,
    pub message: String,
}

impl std::fmt::Display for DbWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.level, self.code, self.message)
    }
}

/// Operations the engine needs from the live database.
#[async_trait]
pub trait LiveDatabase: Send {
    /// Tables in the active database.
    async fn list_tables(&mut self) -> Result<Vec<String>>;

    /// Columns of `table` with key role, default and extra metadata.
    async fn describe_columns(&mut self, table: &str) -> Result<Vec<LiveColumn>>;

    /// Execute a DDL/DML statement, returning affected rows.
    async fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Run a scalar count query.
    async fn count(&mut self, sql: &str) -> Result<i64>;

    async fn begin(&mut self) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;

    /// Warnings raised by the most recent statement.
    async fn warnings(&mut self) -> Result<Vec<DbWarning>>;
}
