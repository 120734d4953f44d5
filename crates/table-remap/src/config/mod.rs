//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let yaml = r#"
database:
  host: db.internal
  database: shop
  user: migrator
  password: hunter2
files:
  schema_file: target_schema.txt
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.ssl_mode, "disable");
        assert_eq!(config.files.mapping_file, Path::new("mappings.json"));
        assert_eq!(config.migration.batch_size, 5000);
        assert_eq!(config.migration.table_suffix, "_new");
        assert_eq!(config.migration.engine, "InnoDB");
        assert!(config.migration.drop_existing);
        assert_eq!(config.migration.destination_table("orders"), "orders_new");
    }

    #[test]
    fn test_from_yaml_rejects_invalid() {
        let yaml = r#"
database:
  host: db.internal
  database: shop
  user: migrator
files:
  schema_file: target_schema.txt
migration:
  batch_size: 0
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }
}
