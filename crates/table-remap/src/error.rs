//! Error types for the remapping engine.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for remapping and migration operations.
#[derive(Error, Debug)]
pub enum RemapError {
    /// Invalid configuration file (missing fields, bad values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schema definition file could not be read or decoded.
    #[error("Failed to parse schema definition {path:?} at line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// A mapping references something that does not exist, or violates a
    /// mapping store invariant.
    #[error("Invalid mapping for {subject}: {message}")]
    Configuration { subject: String, message: String },

    /// A required column conversion was classified as unsafe.
    #[error(
        "Unsafe conversion for {target}: {source_column} ({source_type}) -> \
         {target_column} ({target_type})"
    )]
    UnsafeConversion {
        target: String,
        source_column: String,
        source_type: String,
        target_column: String,
        target_type: String,
    },

    /// A DDL or DML statement failed at the driver level.
    #[error("Database error while {context}: {message}")]
    Database { context: String, message: String },

    /// A copy batch failed; earlier batches stay committed.
    #[error(
        "Copy into {table} failed at batch {batch} ({committed_rows} rows already committed): {message}"
    )]
    BatchFailed {
        table: String,
        batch: usize,
        committed_rows: u64,
        message: String,
    },

    /// Mapping store file unreadable or undecodable.
    #[error("Mapping store {path:?} is corrupt: {message}")]
    StoreCorruption { path: PathBuf, message: String },

    /// MySQL driver error
    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql_async::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RemapError {
    /// Create a Configuration error for a mapping subject (table, merge key, column).
    pub fn configuration(subject: impl Into<String>, message: impl Into<String>) -> Self {
        RemapError::Configuration {
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Create a Database error with context about where it occurred.
    pub fn database(context: impl Into<String>, message: impl ToString) -> Self {
        RemapError::Database {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// True for errors raised during planning, before any DDL was issued.
    pub fn is_planning_error(&self) -> bool {
        matches!(
            self,
            RemapError::Configuration { .. } | RemapError::UnsafeConversion { .. }
        )
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            RemapError::Config(_) | RemapError::Yaml(_) => 2,
            RemapError::Configuration { .. } => 3,
            RemapError::UnsafeConversion { .. } => 4,
            RemapError::Database { .. } | RemapError::BatchFailed { .. } | RemapError::Mysql(_) => 5,
            RemapError::Parse { .. } | RemapError::StoreCorruption { .. } => 6,
            RemapError::Io(_) | RemapError::Json(_) => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for remapping operations.
pub type Result<T> = std::result::Result<T, RemapError>;
