//! Decoder for mapping store values, including older on-disk shapes.
//!
//! Current entries carry a `type` field. Older files used:
//!
//! - a bare string: `"Users": "users"` (single mapping by target name)
//! - an object with `target_schema` or `target` and optional `column_map` or
//!   `columns` (single)
//! - an object with `targets`, an array of names or objects (split)
//! - an object with `source_tables` or `tables` (merge)
//!
//! Each shape has its own branch; anything else is reported as unrecognized.

use serde_json::{Map, Value};

use super::entry::{
    ColumnMap, MappingEntry, MergeMapping, SingleMapping, SplitMapping, SplitTarget,
};

/// Which older shape an entry was upgraded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyShape {
    BareTarget,
    SingleObject,
    SplitObject,
    MergeObject,
}

#[derive(Debug)]
pub(crate) enum Decoded {
    Current(MappingEntry),
    Upgraded(MappingEntry, LegacyShape),
    Unrecognized(String),
}

pub(crate) fn decode_entry(key: &str, value: Value) -> Decoded {
    match value {
        Value::String(target) => {
            if target.trim().is_empty() {
                return Decoded::Unrecognized("empty target name".to_string());
            }
            Decoded::Upgraded(
                MappingEntry::Single(SingleMapping::new(key, target)),
                LegacyShape::BareTarget,
            )
        }
        Value::Object(obj) if obj.contains_key("type") => decode_current(key, obj),
        Value::Object(obj) => {
            if let Some(sources) = first_of(&obj, &["source_tables", "tables"]) {
                decode_legacy_merge(&obj, sources)
            } else if let Some(targets) = obj.get("targets") {
                decode_legacy_split(key, targets)
            } else if let Some(target) = first_of(&obj, &["target_schema", "target"]) {
                decode_legacy_single(key, &obj, target)
            } else {
                Decoded::Unrecognized("object has no type, target or source tables".to_string())
            }
        }
        other => Decoded::Unrecognized(format!("unexpected {} value", json_kind(&other))),
    }
}

fn decode_current(key: &str, mut obj: Map<String, Value>) -> Decoded {
    // Single and split entries may omit source_table; the key names it.
    let is_merge = obj.get("type").and_then(Value::as_str) == Some("merge");
    if !is_merge && !obj.contains_key("source_table") {
        obj.insert("source_table".to_string(), Value::String(key.to_string()));
    }
    match serde_json::from_value(Value::Object(obj)) {
        Ok(entry) => Decoded::Current(entry),
        Err(e) => Decoded::Unrecognized(e.to_string()),
    }
}

fn decode_legacy_single(key: &str, obj: &Map<String, Value>, target: &Value) -> Decoded {
    let Some(target) = non_empty_str(target) else {
        return Decoded::Unrecognized("target is not a table name".to_string());
    };
    let column_map = match column_map_of(obj) {
        Ok(map) => map,
        Err(reason) => return Decoded::Unrecognized(reason),
    };
    Decoded::Upgraded(
        MappingEntry::Single(SingleMapping {
            source_table: key.to_string(),
            target_schema: target.to_string(),
            column_map,
        }),
        LegacyShape::SingleObject,
    )
}

fn decode_legacy_split(key: &str, targets: &Value) -> Decoded {
    let Some(items) = targets.as_array() else {
        return Decoded::Unrecognized("targets is not an array".to_string());
    };
    let mut split_targets = Vec::with_capacity(items.len());
    for item in items {
        let target = match item {
            Value::String(name) if !name.trim().is_empty() => SplitTarget::new(name.as_str()),
            Value::Object(obj) => {
                let Some(name) = first_of(obj, &["target_schema", "target"]).and_then(non_empty_str)
                else {
                    return Decoded::Unrecognized("split target without a name".to_string());
                };
                match column_map_of(obj) {
                    Ok(column_map) => SplitTarget {
                        target_schema: name.to_string(),
                        column_map,
                    },
                    Err(reason) => return Decoded::Unrecognized(reason),
                }
            }
            _ => return Decoded::Unrecognized("unexpected split target".to_string()),
        };
        split_targets.push(target);
    }
    Decoded::Upgraded(
        MappingEntry::Split(SplitMapping {
            source_table: key.to_string(),
            targets: split_targets,
        }),
        LegacyShape::SplitObject,
    )
}

fn decode_legacy_merge(obj: &Map<String, Value>, sources: &Value) -> Decoded {
    let Some(items) = sources.as_array() else {
        return Decoded::Unrecognized("source tables is not an array".to_string());
    };
    let mut source_tables = Vec::with_capacity(items.len());
    for item in items {
        match non_empty_str(item) {
            Some(name) => source_tables.push(name.to_string()),
            None => return Decoded::Unrecognized("source table is not a name".to_string()),
        }
    }
    let Some(target) = first_of(obj, &["target_schema", "target"]).and_then(non_empty_str) else {
        return Decoded::Unrecognized("merge without a target".to_string());
    };
    let join_clause = first_of(obj, &["join_clause", "join"])
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let column_map = match column_map_of(obj) {
        Ok(map) => map,
        Err(reason) => return Decoded::Unrecognized(reason),
    };
    Decoded::Upgraded(
        MappingEntry::Merge(MergeMapping {
            source_tables,
            target_schema: target.to_string(),
            join_clause,
            column_map,
        }),
        LegacyShape::MergeObject,
    )
}

fn column_map_of(obj: &Map<String, Value>) -> Result<ColumnMap, String> {
    let Some(value) = first_of(obj, &["column_map", "columns"]) else {
        return Ok(ColumnMap::new());
    };
    let Some(map) = value.as_object() else {
        return Err("column map is not an object".to_string());
    };
    let mut columns = ColumnMap::new();
    for (from, to) in map {
        let to = to
            .as_str()
            .ok_or_else(|| format!("column '{}' maps to a non-string value", from))?;
        columns.insert(from.clone(), to.to_string());
    }
    Ok(columns)
}

fn first_of<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| obj.get(*name))
}

fn non_empty_str(value: &Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn upgraded(key: &str, value: Value) -> (MappingEntry, LegacyShape) {
        match decode_entry(key, value) {
            Decoded::Upgraded(entry, shape) => (entry, shape),
            other => panic!("expected upgrade, got {:?}", other),
        }
    }

    #[test]
    fn test_bare_string_becomes_single() {
        let (entry, shape) = upgraded("Users", json!("users"));
        assert_eq!(shape, LegacyShape::BareTarget);
        assert_eq!(entry, MappingEntry::Single(SingleMapping::new("Users", "users")));
    }

    #[test]
    fn test_untyped_single_keeps_columns() {
        let (entry, shape) = upgraded(
            "Users",
            json!({"target": "users", "columns": {"nm": "name", "mail": "email"}}),
        );
        assert_eq!(shape, LegacyShape::SingleObject);
        let MappingEntry::Single(single) = entry else {
            panic!("expected single");
        };
        assert_eq!(single.target_schema, "users");
        assert_eq!(single.column_map.get("nm").map(String::as_str), Some("name"));
        assert_eq!(single.column_map.len(), 2);
    }

    #[test]
    fn test_untyped_split_accepts_names_and_objects() {
        let (entry, shape) = upgraded(
            "orders",
            json!({"targets": [
                "order_headers",
                {"target_schema": "order_lines", "column_map": {"qty": "quantity"}}
            ]}),
        );
        assert_eq!(shape, LegacyShape::SplitObject);
        let MappingEntry::Split(split) = entry else {
            panic!("expected split");
        };
        assert_eq!(split.targets.len(), 2);
        assert_eq!(split.targets[0].target_schema, "order_headers");
        assert!(split.targets[0].column_map.is_empty());
        assert_eq!(split.targets[1].column_map["qty"], "quantity");
    }

    #[test]
    fn test_untyped_merge() {
        let (entry, shape) = upgraded(
            "MERGE: a,b -> c",
            json!({"tables": ["b", "a"], "target": "c", "join": "INNER JOIN a ON a.id = b.a_id",
                   "column_map": {"a.x": "x"}}),
        );
        assert_eq!(shape, LegacyShape::MergeObject);
        let MappingEntry::Merge(merge) = entry else {
            panic!("expected merge");
        };
        assert_eq!(merge.source_tables, vec!["b", "a"]);
        assert_eq!(merge.join_clause, "INNER JOIN a ON a.id = b.a_id");
        assert_eq!(merge.column_map["a.x"], "x");
    }

    #[test]
    fn test_typed_entry_without_source_table_uses_key() {
        match decode_entry("Users", json!({"type": "single", "target_schema": "users"})) {
            Decoded::Current(MappingEntry::Single(single)) => {
                assert_eq!(single.source_table, "Users");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_shapes() {
        for value in [
            json!(42),
            json!(null),
            json!({"comment": "nothing useful"}),
            json!({"type": "teleport"}),
            json!({"target": "users", "columns": {"a": 1}}),
            json!({"targets": "order_headers"}),
        ] {
            assert!(
                matches!(decode_entry("t", value.clone()), Decoded::Unrecognized(_)),
                "{value}"
            );
        }
    }
}
