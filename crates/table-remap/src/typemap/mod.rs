//! Type classification for column conversions.
//!
//! Raw type strings (`VARCHAR(255)`, `INT UNSIGNED`, or a full target column
//! definition such as `INT AUTO_INCREMENT PRIMARY KEY`) are reduced to a base
//! type token and a [`TypeCategory`]. The [`classify`] function grades a
//! conversion and [`cast_target`] picks the `CAST(... AS ...)` type used when
//! the base types differ.

mod cast;
mod verdict;

pub use cast::{cast_target, CastTarget};
pub use verdict::{classify, ConversionVerdict};

/// Coarse type family used by the compatibility rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCategory {
    Int,
    ApproxNumeric,
    ExactNumeric,
    String,
    DateTime,
    Binary,
    Json,
    Other,
}

impl TypeCategory {
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            TypeCategory::Int | TypeCategory::ApproxNumeric | TypeCategory::ExactNumeric
        )
    }
}

/// Extract the lower-cased base type: the first word before any `(`.
///
/// `VARCHAR(255)` → `varchar`, `INT UNSIGNED` → `int`,
/// `DOUBLE PRECISION` → `double`.
pub fn base_type(raw: &str) -> String {
    let head = raw.split('(').next().unwrap_or("");
    head.split_whitespace()
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Category of a base type token (as returned by [`base_type`]).
pub fn category_of(base: &str) -> TypeCategory {
    match base {
        "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "bit" | "bool"
        | "boolean" | "serial" => TypeCategory::Int,

        "float" | "double" | "real" => TypeCategory::ApproxNumeric,

        "decimal" | "numeric" | "dec" | "fixed" => TypeCategory::ExactNumeric,

        "char" | "varchar" | "nchar" | "nvarchar" | "tinytext" | "text" | "mediumtext"
        | "longtext" | "enum" | "set" => TypeCategory::String,

        "date" | "datetime" | "timestamp" | "time" | "year" => TypeCategory::DateTime,

        "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
            TypeCategory::Binary
        }

        "json" => TypeCategory::Json,

        _ => TypeCategory::Other,
    }
}

/// Category of a raw type string.
pub fn category(raw: &str) -> TypeCategory {
    category_of(&base_type(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_type_extraction() {
        assert_eq!(base_type("VARCHAR(255)"), "varchar");
        assert_eq!(base_type("INT UNSIGNED"), "int");
        assert_eq!(base_type("int(11) unsigned"), "int");
        assert_eq!(base_type("INT AUTO_INCREMENT PRIMARY KEY"), "int");
        assert_eq!(base_type("  decimal(10,2) NOT NULL"), "decimal");
        assert_eq!(base_type("enum('a','b')"), "enum");
        assert_eq!(base_type(""), "");
    }

    #[test]
    fn test_categories() {
        assert_eq!(category("BIGINT"), TypeCategory::Int);
        assert_eq!(category("tinyint(1)"), TypeCategory::Int);
        assert_eq!(category("DOUBLE PRECISION"), TypeCategory::ApproxNumeric);
        assert_eq!(category("DECIMAL(10,2)"), TypeCategory::ExactNumeric);
        assert_eq!(category("set('x','y')"), TypeCategory::String);
        assert_eq!(category("YEAR"), TypeCategory::DateTime);
        assert_eq!(category("LONGBLOB"), TypeCategory::Binary);
        assert_eq!(category("JSON"), TypeCategory::Json);
        assert_eq!(category("GEOMETRY"), TypeCategory::Other);
    }
}
