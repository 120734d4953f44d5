//! Configuration validation.

use super::Config;
use crate::error::{RemapError, Result};

const SSL_MODES: &[&str] = &[
    "disable",
    "prefer",
    "require",
    "verify_ca",
    "verify-ca",
    "verify_identity",
    "verify-full",
];

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    if config.database.host.is_empty() {
        return Err(RemapError::Config("database.host is required".into()));
    }
    if config.database.database.is_empty() {
        return Err(RemapError::Config("database.database is required".into()));
    }
    if config.database.user.is_empty() {
        return Err(RemapError::Config("database.user is required".into()));
    }
    let ssl_mode = config.database.ssl_mode.to_lowercase();
    if !SSL_MODES.contains(&ssl_mode.as_str()) {
        return Err(RemapError::Config(format!(
            "database.ssl_mode must be one of {}, got '{}'",
            SSL_MODES.join(", "),
            config.database.ssl_mode
        )));
    }

    if config.files.schema_file.as_os_str().is_empty() {
        return Err(RemapError::Config("files.schema_file is required".into()));
    }
    if config.files.mapping_file.as_os_str().is_empty() {
        return Err(RemapError::Config("files.mapping_file is required".into()));
    }

    if config.migration.batch_size == 0 {
        return Err(RemapError::Config(
            "migration.batch_size must be at least 1".into(),
        ));
    }
    // An empty suffix would make the destination collide with the source table.
    if config.migration.table_suffix.is_empty() {
        return Err(RemapError::Config(
            "migration.table_suffix must not be empty".into(),
        ));
    }
    if config.migration.engine.is_empty()
        || !config
            .migration
            .engine
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(RemapError::Config(format!(
            "migration.engine '{}' is not a valid storage engine name",
            config.migration.engine
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, FilesConfig, MigrationConfig};
    use std::path::PathBuf;

    fn valid_config() -> Config {
        Config {
            database: DatabaseConfig {
                host: "localhost".to_string(),
                port: 3306,
                database: "shop".to_string(),
                user: "root".to_string(),
                password: "password".to_string(),
                ssl_mode: "disable".to_string(),
            },
            files: FilesConfig {
                schema_file: PathBuf::from("schema.txt"),
                mapping_file: PathBuf::from("mappings.json"),
            },
            migration: MigrationConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = valid_config();
        config.database.host = "".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_ssl_mode() {
        let mut config = valid_config();
        config.database.ssl_mode = "sometimes".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = valid_config();
        config.migration.batch_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_suffix_rejected() {
        let mut config = valid_config();
        config.migration.table_suffix = String::new();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_engine_name_with_sql_rejected() {
        let mut config = valid_config();
        config.migration.engine = "InnoDB; DROP TABLE x".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_database_config_debug_redacts_password() {
        let mut config = valid_config();
        config.database.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.database);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }
}
