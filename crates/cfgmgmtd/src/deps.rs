//! Dependency resolution ahead of destructive edits.
//!
//! Before an entity can be deleted, everything the schema says refers to it
//! (ACL rules naming the port, VLAN memberships, ...) has to be found. The
//! union of dependency paths is computed fresh on every request; the working
//! tree mutates underneath, so caching would be wrong.

use tracing::{debug, info};

use sonic_cfgmgmt_common::CfgMgmtResult;

use crate::schema::SchemaEngine;

/// Outcome of a removal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// Dependents exist and `force` was false; nothing was mutated. The
    /// caller should present the list and ask for confirmation.
    Blocked(Vec<String>),
    /// Dependents (if any) and the targets themselves were deleted from the
    /// working tree.
    Removed,
}

/// Computes the union of dependency paths over all `ports`, in discovery
/// order.
pub fn resolve(engine: &dyn SchemaEngine, ports: &[String]) -> CfgMgmtResult<Vec<String>> {
    let mut deps = Vec::new();
    for port in ports {
        info!("Find dependencies for port {}", port);
        let leaf = engine.port_leaf_path(port);
        let found = engine.find_dependencies(&leaf)?;
        debug!("Port {} has {} dependent nodes", port, found.len());
        deps.extend(found);
    }
    Ok(deps)
}

/// Resolves dependencies for `ports` and deletes the ports from the working
/// tree.
///
/// Without `force`, any dependents block the removal and nothing is touched.
/// With `force`, dependents are deleted first, in discovery order. No
/// topological sort is attempted among them; in practice dependents form a
/// single-level reference, not a chain, and multi-level chains have never
/// been validated. Known limitation, not a guarantee.
pub fn remove_ports_with_dependencies(
    engine: &mut dyn SchemaEngine,
    ports: &[String],
    force: bool,
) -> CfgMgmtResult<RemovalOutcome> {
    let deps = resolve(engine, ports)?;

    if !force && !deps.is_empty() {
        info!("Removal blocked by {} dependent nodes", deps.len());
        return Ok(RemovalOutcome::Blocked(deps));
    }

    for dep in &deps {
        info!("Deleting dependent node {}", dep);
        engine.delete_node(dep)?;
    }

    for port in ports {
        info!("Deleting port {}", port);
        let path = engine.port_path(port);
        engine.delete_node(&path)?;
    }

    Ok(RemovalOutcome::Removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::tests::{sample_config, test_schema_dir};
    use crate::schema::JsonSchemaEngine;

    fn engine() -> (tempfile::TempDir, JsonSchemaEngine) {
        let dir = test_schema_dir();
        let mut engine = JsonSchemaEngine::new(dir.path());
        engine.load_schema().unwrap();
        engine.load_data(&sample_config()).unwrap();
        (dir, engine)
    }

    fn ports(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_blocked_without_force() {
        let (_dir, mut engine) = engine();
        let outcome =
            remove_ports_with_dependencies(&mut engine, &ports(&["Ethernet0"]), false).unwrap();

        match outcome {
            RemovalOutcome::Blocked(deps) => {
                assert_eq!(deps.len(), 2);
                assert!(deps.iter().any(|d| d.starts_with("/ACL_RULE/")));
                assert!(deps.iter().any(|d| d.starts_with("/VLAN_MEMBER/")));
            }
            other => panic!("expected Blocked, got {other:?}"),
        }
        // Nothing was mutated.
        let data = engine.get_data().unwrap();
        assert!(data["PORT"].as_object().unwrap().contains_key("Ethernet0"));
    }

    #[test]
    fn test_forced_removal_deletes_dependents_first() {
        let (_dir, mut engine) = engine();
        let outcome =
            remove_ports_with_dependencies(&mut engine, &ports(&["Ethernet0"]), true).unwrap();
        assert_eq!(outcome, RemovalOutcome::Removed);

        let data = engine.get_data().unwrap();
        assert!(!data["PORT"].as_object().unwrap().contains_key("Ethernet0"));
        assert!(data["VLAN_MEMBER"].as_object().unwrap().is_empty());
        let rule = data["ACL_RULE"]["DATAACL|RULE0"].as_object().unwrap();
        assert_eq!(rule["ports"], serde_json::json!(["Ethernet4"]));
        // Tree is valid again after the forced removal.
        assert!(engine.validate().unwrap());
    }

    #[test]
    fn test_no_dependents_removes_directly() {
        let (_dir, mut engine) = engine();
        // Clear Ethernet4's only reference first.
        engine
            .delete_node("/ACL_RULE/DATAACL|RULE0/ports/Ethernet4")
            .unwrap();

        let outcome =
            remove_ports_with_dependencies(&mut engine, &ports(&["Ethernet4"]), false).unwrap();
        assert_eq!(outcome, RemovalOutcome::Removed);
    }

    #[test]
    fn test_resolution_never_cached() {
        let (_dir, mut engine) = engine();
        assert_eq!(resolve(&engine, &ports(&["Ethernet0"])).unwrap().len(), 2);

        engine.delete_node("/VLAN_MEMBER/Vlan100|Ethernet0").unwrap();
        assert_eq!(resolve(&engine, &ports(&["Ethernet0"])).unwrap().len(), 1);
    }
}
