//! Structural config merging.
//!
//! [`merge_configs`] deep-merges a donor tree into a base tree under a
//! priority rule: the base wins on conflicting scalars, lists concatenate,
//! dictionaries recurse. Unlike a plain deep-update it is a pure function;
//! neither operand is mutated and the donor's unmerged remainder comes back
//! alongside the merged result.

use serde_json::Value;
use tracing::{debug, warn};

use sonic_cfgmgmt_common::{types::type_name, CfgMgmtError, CfgMgmtResult, ConfigTree};

/// Merges `donor` into `base`.
///
/// Rules:
/// 1. Keys in both: dicts recurse, lists concatenate (no dedup — duplicates
///    are the caller's responsibility), scalar conflicts keep the base value
///    (logged, not fatal).
/// 2. A list on one side and a dict or scalar on the other is a
///    [`CfgMgmtError::MergeConflict`]: the inputs are schema-incompatible.
/// 3. Keys only in `donor` land in the returned `remaining` tree; they are
///    additionally absorbed into the merged tree when `absorb_unique` is
///    true.
///
/// Returns `(merged, remaining)`.
pub fn merge_configs(
    base: &ConfigTree,
    donor: &ConfigTree,
    absorb_unique: bool,
) -> CfgMgmtResult<(ConfigTree, ConfigTree)> {
    let mut merged = base.clone();
    let mut remaining = ConfigTree::new();

    for (key, donor_value) in donor {
        match merged.get_mut(key) {
            Some(base_value) => {
                let combined = merge_values(key, base_value, donor_value)?;
                *base_value = combined;
            }
            None => {
                remaining.insert(key.clone(), donor_value.clone());
            }
        }
    }

    if absorb_unique {
        for (key, value) in &remaining {
            merged.insert(key.clone(), value.clone());
        }
    }

    Ok((merged, remaining))
}

fn merge_values(key: &str, base: &Value, donor: &Value) -> CfgMgmtResult<Value> {
    match (base, donor) {
        (Value::Array(b), Value::Array(d)) => {
            let mut items = b.clone();
            items.extend(d.iter().cloned());
            Ok(Value::Array(items))
        }
        (Value::Object(b), Value::Object(d)) => {
            // Nested dicts always absorb the donor's unique keys.
            let (nested, _) = merge_configs(b, d, true)?;
            Ok(Value::Object(nested))
        }
        (Value::Array(_), other) | (other, Value::Array(_)) => Err(CfgMgmtError::merge_conflict(
            key,
            format!("list vs {} at the same key", type_name(other)),
        )),
        (Value::Object(_), other) | (other, Value::Object(_)) => Err(CfgMgmtError::merge_conflict(
            key,
            format!("dict vs {} at the same key", type_name(other)),
        )),
        (b, d) => {
            if b != d {
                warn!("Merge conflict at '{}': keeping '{}', dropping '{}'", key, b, d);
            } else {
                debug!("Merge at '{}': identical scalar", key);
            }
            Ok(b.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(v: serde_json::Value) -> ConfigTree {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn test_base_wins_on_scalar_conflict() {
        let base = tree(json!({"PORT": {"Ethernet0": {"speed": "25000"}}}));
        let donor = tree(json!({"PORT": {"Ethernet0": {"speed": "100000"}}}));

        let (merged, remaining) = merge_configs(&base, &donor, true).unwrap();
        assert_eq!(merged["PORT"]["Ethernet0"]["speed"], json!("25000"));
        assert!(remaining.is_empty());
    }

    #[test]
    fn test_lists_concatenate() {
        let base = tree(json!({"ACL_TABLE": {"DATAACL": {"ports": ["Ethernet0"]}}}));
        let donor = tree(json!({"ACL_TABLE": {"DATAACL": {"ports": ["Ethernet4"]}}}));

        let (merged, _) = merge_configs(&base, &donor, true).unwrap();
        assert_eq!(
            merged["ACL_TABLE"]["DATAACL"]["ports"],
            json!(["Ethernet0", "Ethernet4"])
        );
    }

    #[test]
    fn test_list_vs_dict_is_fatal() {
        let base = tree(json!({"X": {"a": ["one"]}}));
        let donor = tree(json!({"X": {"a": {"nested": "map"}}}));

        let err = merge_configs(&base, &donor, true).unwrap_err();
        assert!(matches!(err, CfgMgmtError::MergeConflict { .. }));
    }

    #[test]
    fn test_dict_vs_scalar_is_fatal() {
        let base = tree(json!({"X": {"a": {"nested": "map"}}}));
        let donor = tree(json!({"X": {"a": "scalar"}}));

        assert!(merge_configs(&base, &donor, true).is_err());
    }

    #[test]
    fn test_unique_keys_absorbed() {
        let base = tree(json!({"PORT": {"Ethernet0": {"speed": "100000"}}}));
        let donor = tree(json!({
            "PORT": {"Ethernet0": {"mtu": "9100"}},
            "CRM": {"Config": {"polling_interval": "300"}}
        }));

        let (merged, remaining) = merge_configs(&base, &donor, true).unwrap();
        assert_eq!(merged["PORT"]["Ethernet0"]["speed"], json!("100000"));
        assert_eq!(merged["PORT"]["Ethernet0"]["mtu"], json!("9100"));
        assert!(merged.contains_key("CRM"));
        assert_eq!(remaining.keys().collect::<Vec<_>>(), vec!["CRM"]);
    }

    #[test]
    fn test_unique_keys_left_out() {
        let base = tree(json!({"PORT": {}}));
        let donor = tree(json!({"CRM": {"Config": {}}}));

        let (merged, remaining) = merge_configs(&base, &donor, false).unwrap();
        assert!(!merged.contains_key("CRM"));
        assert!(remaining.contains_key("CRM"));
    }

    #[test]
    fn test_operands_not_mutated() {
        let base = tree(json!({"PORT": {"Ethernet0": {"speed": "25000"}}}));
        let donor = tree(json!({"PORT": {"Ethernet0": {"speed": "100000"}}, "CRM": {}}));
        let base_before = base.clone();
        let donor_before = donor.clone();

        merge_configs(&base, &donor, true).unwrap();
        assert_eq!(base, base_before);
        assert_eq!(donor, donor_before);
    }
}
