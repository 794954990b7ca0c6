//! Symmetric tree diff and diff-to-patch translation.
//!
//! [`symmetric_diff`] computes a structural difference between two config
//! snapshots: keys gone from the output land in a `$delete` bucket of the
//! surrounding container, new keys land in `$insert`, changed containers
//! recurse, and changed scalar values become an explicit `$update` marker.
//!
//! [`create_config_to_load`] turns that diff into a datastore patch: a key
//! mapped to `null` deletes the key, any other value sets it. In-place value
//! updates are not translatable — the datastore write model only knows
//! "delete key" and "set key" — so `$update` markers are rejected rather
//! than misapplied; callers model updates as delete + insert.

use serde_json::{Map, Value};
use tracing::warn;

use sonic_cfgmgmt_common::{CfgMgmtError, CfgMgmtResult, ConfigTree};

/// Bucket of keys present before but absent after.
pub const DELETE_KEY: &str = "$delete";
/// Bucket of keys absent before but present after.
pub const INSERT_KEY: &str = "$insert";
/// Marker for an in-place value change, rejected by patch translation.
pub const UPDATE_KEY: &str = "$update";

/// Computes the symmetric diff of two config trees. An empty object means
/// the trees are equal.
pub fn symmetric_diff(before: &ConfigTree, after: &ConfigTree) -> Value {
    diff_values(&Value::Object(before.clone()), &Value::Object(after.clone()))
}

fn diff_values(before: &Value, after: &Value) -> Value {
    if before == after {
        return Value::Object(Map::new());
    }

    match (before, after) {
        (Value::Object(b), Value::Object(a)) => diff_objects(b, a),
        (Value::Array(b), Value::Array(a)) => diff_arrays(b, a),
        _ => update_marker(before, after),
    }
}

fn update_marker(before: &Value, after: &Value) -> Value {
    let mut node = Map::new();
    node.insert(
        UPDATE_KEY.to_string(),
        Value::Array(vec![before.clone(), after.clone()]),
    );
    Value::Object(node)
}

fn diff_objects(before: &Map<String, Value>, after: &Map<String, Value>) -> Value {
    let mut node = Map::new();
    let mut deleted = Vec::new();
    let mut inserted = Map::new();

    for (key, b_val) in before {
        match after.get(key) {
            None => deleted.push(Value::String(key.clone())),
            Some(a_val) if a_val != b_val => {
                node.insert(key.clone(), diff_values(b_val, a_val));
            }
            Some(_) => {}
        }
    }
    for (key, a_val) in after {
        if !before.contains_key(key) {
            inserted.insert(key.clone(), a_val.clone());
        }
    }

    if !deleted.is_empty() {
        node.insert(DELETE_KEY.to_string(), Value::Array(deleted));
    }
    if !inserted.is_empty() {
        node.insert(INSERT_KEY.to_string(), Value::Object(inserted));
    }
    Value::Object(node)
}

fn diff_arrays(before: &[Value], after: &[Value]) -> Value {
    let removed: Vec<Value> = before.iter().filter(|v| !after.contains(v)).cloned().collect();
    let added: Vec<Value> = after.iter().filter(|v| !before.contains(v)).cloned().collect();

    let mut node = Map::new();
    if !removed.is_empty() {
        node.insert(DELETE_KEY.to_string(), Value::Array(removed));
    }
    if !added.is_empty() {
        node.insert(INSERT_KEY.to_string(), Value::Array(added));
    }
    if node.is_empty() {
        // Same membership, different order: represent as a wholesale
        // insertion of the after list.
        node.insert(INSERT_KEY.to_string(), Value::Array(after.to_vec()));
    }
    Value::Object(node)
}

/// Translates a symmetric diff into the patch to write to the datastore.
///
/// `before` and `after` are the snapshots the diff was computed from; every
/// `$delete`/`$insert` entry is re-checked against them, and entries the
/// snapshots do not corroborate are logged and skipped. Unchanged branches
/// are pruned so the patch contains nothing for them.
pub fn create_config_to_load(
    diff: &Value,
    before: &ConfigTree,
    after: &ConfigTree,
) -> CfgMgmtResult<ConfigTree> {
    let translated = translate(
        diff,
        &Value::Object(before.clone()),
        &Value::Object(after.clone()),
        "",
    )?;
    match translated {
        Some(Value::Object(map)) => Ok(map),
        Some(other) => Err(CfgMgmtError::internal(format!(
            "patch translation produced a non-object root: {other}"
        ))),
        None => Ok(ConfigTree::new()),
    }
}

/// Returns `Some(patch_node)` when the subtree changed, `None` to prune.
fn translate(
    diff: &Value,
    before: &Value,
    after: &Value,
    path: &str,
) -> CfgMgmtResult<Option<Value>> {
    let Some(diff_node) = diff.as_object() else {
        return Err(CfgMgmtError::internal(format!(
            "malformed diff node at '{path}': expected object"
        )));
    };

    if diff_node.contains_key(UPDATE_KEY) {
        return Err(CfgMgmtError::UnsupportedUpdate {
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
        });
    }

    // A diff over two lists translates to replacing the list wholesale with
    // the after side, if anything changed at all.
    if before.is_array() || after.is_array() {
        if diff_node.is_empty() {
            return Ok(None);
        }
        return Ok(Some(after.clone()));
    }

    let empty = Map::new();
    let before_map = before.as_object().unwrap_or(&empty);
    let after_map = after.as_object().unwrap_or(&empty);
    let mut out = Map::new();

    for (key, sub) in diff_node {
        match key.as_str() {
            DELETE_KEY => {
                let Some(keys) = sub.as_array() else {
                    return Err(CfgMgmtError::internal(format!(
                        "malformed $delete bucket at '{path}'"
                    )));
                };
                for k in keys {
                    let Some(k) = k.as_str() else {
                        warn!("Diff: non-string key in $delete at '{}'", path);
                        continue;
                    };
                    // Only delete what the snapshots corroborate: present
                    // before, absent after.
                    if before_map.contains_key(k) && !after_map.contains_key(k) {
                        out.insert(k.to_string(), Value::Null);
                    } else {
                        warn!("Diff: probably stale delete key '{}' at '{}'", k, path);
                    }
                }
            }
            INSERT_KEY => {
                let Some(entries) = sub.as_object() else {
                    return Err(CfgMgmtError::internal(format!(
                        "malformed $insert bucket at '{path}'"
                    )));
                };
                for (k, _) in entries {
                    if let (false, Some(value)) = (before_map.contains_key(k), after_map.get(k)) {
                        out.insert(k.clone(), value.clone());
                    } else {
                        warn!("Diff: probably stale insert key '{}' at '{}'", k, path);
                    }
                }
            }
            _ => {
                let child_path = format!("{path}/{key}");
                let (Some(b), Some(a)) = (before_map.get(key), after_map.get(key)) else {
                    warn!("Diff: key '{}' missing from a snapshot, skipping", child_path);
                    continue;
                };
                if let Some(child) = translate(sub, b, a, &child_path)? {
                    out.insert(key.clone(), child);
                }
            }
        }
    }

    Ok((!out.is_empty()).then(|| Value::Object(out)))
}
