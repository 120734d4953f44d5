//! Identifier validation and quoting for generated MySQL statements.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! name that ends up in generated DDL/DML passes through [`quote`] or
//! [`qualify`]. Join clauses are operator-authored SQL and are not quoted.

use crate::error::{RemapError, Result};

/// MySQL identifier length limit.
const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Validate an identifier for security issues.
///
/// Rejects empty identifiers, identifiers containing null bytes and identifiers
/// longer than MySQL allows.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(RemapError::configuration("identifier", "identifier cannot be empty"));
    }

    if name.contains('\0') {
        return Err(RemapError::configuration(
            name.replace('\0', "\\0"),
            "SECURITY: identifier contains null byte (possible injection attempt)",
        ));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(RemapError::configuration(
            name,
            format!("identifier exceeds maximum length of {} characters", MAX_IDENTIFIER_LENGTH),
        ));
    }

    Ok(())
}

/// Quote a MySQL identifier using backticks.
///
/// ```ignore
/// assert_eq!(quote("users")?, "`users`");
/// assert_eq!(quote("table`name")?, "`table``name`");
/// ```
pub fn quote(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Qualify a column with its table: `` `table`.`column` ``.
pub fn qualify(table: &str, column: &str) -> Result<String> {
    Ok(format!("{}.{}", quote(table)?, quote(column)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_simple() {
        assert_eq!(quote("users").unwrap(), "`users`");
    }

    #[test]
    fn test_quote_escapes_backtick() {
        assert_eq!(quote("odd`name").unwrap(), "`odd``name`");
    }

    #[test]
    fn test_quote_rejects_empty_and_null() {
        assert!(quote("").is_err());
        assert!(quote("users\0; DROP TABLE x").is_err());
    }

    #[test]
    fn test_bad_identifier_is_a_mapping_error() {
        let long = "x".repeat(65);
        for name in ["", "a\0b", long.as_str()] {
            let err = quote(name).unwrap_err();
            assert!(matches!(err, RemapError::Configuration { .. }), "{:?}", err);
            assert_eq!(err.exit_code(), 3);
        }
    }

    #[test]
    fn test_quote_rejects_long_names() {
        let name = "x".repeat(65);
        assert!(quote(&name).is_err());
        assert!(quote(&"x".repeat(64)).is_ok());
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("a", "x").unwrap(), "`a`.`x`");
    }
}
