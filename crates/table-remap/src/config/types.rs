//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Live database connection (source and destination share one database).
    pub database: DatabaseConfig,

    /// Schema definition and mapping store locations.
    pub files: FilesConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// MySQL/MariaDB connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 3306).
    #[serde(default = "default_mysql_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// TLS mode: disable, prefer, require, verify_ca, verify_identity (default: disable).
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesConfig {
    /// Target schema definition file.
    pub schema_file: PathBuf,

    /// Mapping store (JSON).
    #[serde(default = "default_mapping_file")]
    pub mapping_file: PathBuf,
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per INSERT ... SELECT batch (default: 5000).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Suffix appended to the target schema name to form the destination table.
    #[serde(default = "default_table_suffix")]
    pub table_suffix: String,

    /// Storage engine for created tables.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Drop an existing destination table before CREATE (default: true).
    #[serde(default = "default_true")]
    pub drop_existing: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            table_suffix: default_table_suffix(),
            engine: default_engine(),
            drop_existing: true,
        }
    }
}

impl MigrationConfig {
    /// Destination table name for a target schema table.
    pub fn destination_table(&self, target_schema: &str) -> String {
        format!("{}{}", target_schema, self.table_suffix)
    }
}

// Default value functions for serde
fn default_mysql_port() -> u16 {
    3306
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_mapping_file() -> PathBuf {
    PathBuf::from("mappings.json")
}

fn default_batch_size() -> usize {
    5000
}

fn default_table_suffix() -> String {
    "_new".to_string()
}

fn default_engine() -> String {
    "InnoDB".to_string()
}

fn default_true() -> bool {
    true
}
