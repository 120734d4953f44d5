//! # table-remap
//!
//! Schema remapping and data migration engine for MySQL/MariaDB.
//!
//! Moves data from a live schema into a target layout described by a
//! definition file:
//!
//! - **Mappings**: one-to-one, split (one source, many targets) and merge
//!   (many sources joined into one target), kept in a JSON mapping store
//! - **Type safety**: every column conversion is graded safe, lossy or unsafe
//!   before any DDL runs
//! - **DDL**: `CREATE TABLE` statements synthesized from the definition file
//! - **Batched copy**: `INSERT ... SELECT` in individually committed batches
//!
//! ## Example
//!
//! ```rust,no_run
//! use table_remap::{Config, MysqlDatabase, Orchestrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> table_remap::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let db = MysqlDatabase::connect(&config.database).await?;
//!     let (mut session, _report) = Orchestrator::new(config, db);
//!     let prepared = session.prepare_table("users").await?;
//!     let result = session.execute(&prepared).await?;
//!     println!("Copied {} rows", result.rows_copied);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod db;
pub mod ddl;
pub mod error;
pub mod identifier;
pub mod mapping;
pub mod orchestrator;
pub mod plan;
pub mod schema;
pub mod transfer;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, FilesConfig, MigrationConfig};
pub use db::{DbWarning, LiveDatabase, MysqlDatabase};
pub use error::{RemapError, Result};
pub use mapping::{
    MappingEntry, MappingStore, MergeDraft, MergeMapping, SingleMapping, SplitMapping, SplitTarget,
};
pub use orchestrator::{MappingStatus, MigrationResult, Orchestrator, PreparedMigration, Workspace};
pub use plan::{CopyPlan, PlanRow};
pub use schema::{LiveColumn, TargetSchema};
pub use transfer::{BatchCopyExecutor, CopyReport};
pub use typemap::{classify, ConversionVerdict};
