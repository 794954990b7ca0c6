//! Default-config synthesis.
//!
//! Extracts, from the master default-configuration document, only the
//! fragments relevant to a given set of entity names. Used to seed newly
//! created breakout ports with their factory configuration before the
//! caller's explicit values are merged on top.

use std::path::Path;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use sonic_cfgmgmt_common::{read_json_file, CfgMgmtError, CfgMgmtResult, ConfigTree};

/// Builds the key-match pattern for one entity name: the name as the prefix
/// of a composite key before the `|` separator, as the suffix after it, or
/// as the whole key.
fn key_pattern(name: &str) -> CfgMgmtResult<Regex> {
    let escaped = regex::escape(name);
    let pattern = format!("^{escaped}\\||{escaped}$|^{escaped}$");
    Regex::new(&pattern).map_err(|e| {
        CfgMgmtError::internal(format!("bad search pattern for '{name}': {e}"))
    })
}

/// Depth-first search for `keys` inside `input`.
///
/// A dict key matching any pattern has its subtree copied verbatim (no
/// further descent into it); unmatched keys are still descended to find
/// nested matches. In lists only the elements equal to a searched name are
/// kept. Returns `None` when nothing in the subtree matched.
fn search_keys(input: &Value, keys: &[String], patterns: &[Regex]) -> Option<Value> {
    match input {
        Value::Object(map) => {
            let mut out = ConfigTree::new();
            for (key, value) in map {
                if patterns.iter().any(|p| p.is_match(key)) {
                    // A primary key can only match once; take it whole.
                    out.insert(key.clone(), value.clone());
                } else if let Some(sub) = search_keys(value, keys, patterns) {
                    out.insert(key.clone(), sub);
                }
            }
            (!out.is_empty()).then(|| Value::Object(out))
        }
        Value::Array(items) => {
            let matched: Vec<Value> = items
                .iter()
                .filter(|item| item.as_str().is_some_and(|s| keys.iter().any(|k| k == s)))
                .cloned()
                .collect();
            (!matched.is_empty()).then(|| Value::Array(matched))
        }
        _ => None,
    }
}

/// Returns the fragments of `config` relevant to `keys`.
///
/// An empty result is a legitimate outcome: there simply is no default
/// config for the requested entities.
pub fn config_with_keys(config: &ConfigTree, keys: &[String]) -> CfgMgmtResult<ConfigTree> {
    if config.is_empty() || keys.is_empty() {
        return Ok(ConfigTree::new());
    }

    let patterns = keys
        .iter()
        .map(|k| key_pattern(k))
        .collect::<CfgMgmtResult<Vec<_>>>()?;

    let out = match search_keys(&Value::Object(config.clone()), keys, &patterns) {
        Some(Value::Object(map)) => map,
        _ => ConfigTree::new(),
    };

    debug!("Default-config search for {:?} matched {} tables", keys, out.len());
    Ok(out)
}

/// Loads the master default-configuration document and filters it down to
/// the fragments relevant to `keys`.
pub fn load_default_config(path: impl AsRef<Path>, keys: &[String]) -> CfgMgmtResult<ConfigTree> {
    let master = read_json_file(path)?;
    config_with_keys(&master, keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn master() -> ConfigTree {
        json!({
            "PORT": {
                "Ethernet0": { "speed": "100000", "mtu": "9100" },
                "Ethernet4": { "speed": "100000" }
            },
            "INTERFACE": {
                "Ethernet0|10.0.0.1/31": {},
                "Ethernet4|10.0.0.3/31": {}
            },
            "VLAN_MEMBER": {
                "Vlan100|Ethernet0": { "tagging_mode": "untagged" }
            },
            "ACL_TABLE": {
                "DATAACL": { "ports": ["Ethernet0", "Ethernet4", "Ethernet8"] }
            },
            "CRM": {
                "Config": { "polling_interval": "300" }
            }
        })
        .as_object()
        .unwrap()
        .clone()
    }

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_whole_key_match() {
        let out = config_with_keys(&master(), &keys(&["Ethernet0"])).unwrap();
        assert_eq!(out["PORT"]["Ethernet0"]["mtu"], json!("9100"));
        assert!(out["PORT"].as_object().unwrap().get("Ethernet4").is_none());
    }

    #[test]
    fn test_composite_key_prefix_match() {
        let out = config_with_keys(&master(), &keys(&["Ethernet0"])).unwrap();
        assert!(out["INTERFACE"]
            .as_object()
            .unwrap()
            .contains_key("Ethernet0|10.0.0.1/31"));
        assert!(!out["INTERFACE"]
            .as_object()
            .unwrap()
            .contains_key("Ethernet4|10.0.0.3/31"));
    }

    #[test]
    fn test_composite_key_suffix_match() {
        let out = config_with_keys(&master(), &keys(&["Ethernet0"])).unwrap();
        assert!(out["VLAN_MEMBER"]
            .as_object()
            .unwrap()
            .contains_key("Vlan100|Ethernet0"));
    }

    #[test]
    fn test_list_elements_filtered() {
        let out = config_with_keys(&master(), &keys(&["Ethernet0", "Ethernet4"])).unwrap();
        assert_eq!(
            out["ACL_TABLE"]["DATAACL"]["ports"],
            json!(["Ethernet0", "Ethernet4"])
        );
    }

    #[test]
    fn test_unrelated_tables_pruned() {
        let out = config_with_keys(&master(), &keys(&["Ethernet0"])).unwrap();
        assert!(!out.contains_key("CRM"));
    }

    #[test]
    fn test_no_match_is_empty_not_error() {
        let out = config_with_keys(&master(), &keys(&["Ethernet99"])).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_no_partial_name_match() {
        // "Ethernet0" must not drag in "Ethernet0.100"-style keys by prefix
        // alone; only whole-key or separator-delimited forms match.
        let cfg = json!({
            "PORT": { "Ethernet00": { "speed": "25000" } }
        })
        .as_object()
        .unwrap()
        .clone();
        let out = config_with_keys(&cfg, &keys(&["Ethernet0"])).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_empty_inputs() {
        assert!(config_with_keys(&ConfigTree::new(), &keys(&["Ethernet0"]))
            .unwrap()
            .is_empty());
        assert!(config_with_keys(&master(), &[]).unwrap().is_empty());
    }
}
