//! The ConfigTree value model.
//!
//! A configuration tree is the JSON image of the configuration datastore:
//! table name -> entity key -> field -> value, where a value is a scalar, a
//! list of scalars, or a nested mapping. `serde_json::Map` preserves
//! insertion order, matching the ordered-mapping requirement.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::{Map, Value};

use crate::error::{CfgMgmtError, CfgMgmtResult};

/// An in-memory configuration tree (table -> entity -> field -> value).
pub type ConfigTree = Map<String, Value>;

/// Reads a JSON object from a file into a [`ConfigTree`].
///
/// Fails if the file cannot be opened, is not valid JSON, or its top level
/// is not an object.
pub fn read_json_file(path: impl AsRef<Path>) -> CfgMgmtResult<ConfigTree> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| CfgMgmtError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let reader = BufReader::new(file);
    let value: Value = serde_json::from_reader(reader).map_err(|e| CfgMgmtError::Json {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(CfgMgmtError::Json {
            path: path.display().to_string(),
            message: format!("expected a JSON object at top level, got {}", type_name(&other)),
        }),
    }
}

/// Returns the entry object for `table`/`key`, if present.
pub fn get_entry<'a>(tree: &'a ConfigTree, table: &str, key: &str) -> Option<&'a Map<String, Value>> {
    tree.get(table)?.as_object()?.get(key)?.as_object()
}

/// Returns the table object, if present.
pub fn get_table<'a>(tree: &'a ConfigTree, table: &str) -> Option<&'a Map<String, Value>> {
    tree.get(table)?.as_object()
}

/// Human-readable JSON value kind, used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
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
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"PORT": {{"Ethernet0": {{"speed": "100000"}}}}}}"#).unwrap();
        file.flush().unwrap();

        let tree = read_json_file(file.path()).unwrap();
        assert!(tree.contains_key("PORT"));
        let entry = get_entry(&tree, "PORT", "Ethernet0").unwrap();
        assert_eq!(entry.get("speed"), Some(&json!("100000")));
    }

    #[test]
    fn test_read_json_file_not_object() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[1, 2, 3]").unwrap();
        file.flush().unwrap();

        let err = read_json_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("expected a JSON object"));
    }

    #[test]
    fn test_read_json_file_missing() {
        assert!(read_json_file("/nonexistent/config_db.json").is_err());
    }

    #[test]
    fn test_get_table_missing() {
        let tree = ConfigTree::new();
        assert!(get_table(&tree, "PORT").is_none());
        assert!(get_entry(&tree, "PORT", "Ethernet0").is_none());
    }
}
