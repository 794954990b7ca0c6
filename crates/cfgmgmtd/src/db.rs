//! Configuration-datastore boundary.
//!
//! The engine only ever sees the [`ConfigDb`] trait: connect (optionally
//! waiting for the datastore's initialization marker), read the full table
//! set, and write a patch in which `null` at a key means delete-the-key and
//! any other value means set-the-key.
//!
//! [`MemoryConfigDb`] is the in-memory implementation used by the file-backed
//! CLI mode and by tests. Handles are cheap clones over shared state, so a
//! test can keep one handle while the engine owns another.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use sonic_cfgmgmt_common::{CfgMgmtError, CfgMgmtResult, ConfigTree};

/// Boundary trait for the persistent configuration datastore.
#[async_trait]
pub trait ConfigDb: Send + Sync {
    /// Connects to the datastore. With `wait_for_init`, blocks until the
    /// datastore reports its initialization marker.
    async fn connect(&self, wait_for_init: bool) -> CfgMgmtResult<()>;

    /// Reads the full table set.
    async fn read_config(&self) -> CfgMgmtResult<ConfigTree>;

    /// Writes a patch: `null` deletes a key, containers merge recursively,
    /// any other value sets the key.
    async fn write_config(&self, patch: &ConfigTree) -> CfgMgmtResult<()>;
}

/// Applies a patch to a tree with datastore semantics.
pub fn apply_patch(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match value {
            Value::Null => {
                target.remove(key);
            }
            Value::Object(sub) => match target.get_mut(key) {
                Some(Value::Object(existing)) => apply_patch(existing, sub),
                _ => {
                    target.insert(key.clone(), value.clone());
                }
            },
            other => {
                target.insert(key.clone(), other.clone());
            }
        }
    }
}

#[derive(Debug, Default)]
struct MemoryConfigDbInner {
    tables: ConfigTree,
    connected: bool,
    init_done: bool,
    writes: Vec<ConfigTree>,
}

/// In-memory configuration datastore.
#[derive(Debug, Clone)]
pub struct MemoryConfigDb {
    inner: Arc<Mutex<MemoryConfigDbInner>>,
}

impl Default for MemoryConfigDb {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryConfigDb {
    /// Creates an empty datastore with the init marker set.
    pub fn new() -> Self {
        Self::with_config(ConfigTree::new())
    }

    /// Creates a datastore seeded with `config`, init marker set.
    pub fn with_config(config: ConfigTree) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryConfigDbInner {
                tables: config,
                connected: false,
                init_done: true,
                writes: Vec::new(),
            })),
        }
    }

    /// Clears the init marker; a `connect(true)` will then fail.
    pub fn without_init_marker(self) -> Self {
        self.inner.lock().unwrap().init_done = false;
        self
    }

    /// Snapshot of the current table set.
    pub fn config(&self) -> ConfigTree {
        self.inner.lock().unwrap().tables.clone()
    }

    /// The patches written so far, in order.
    pub fn writes(&self) -> Vec<ConfigTree> {
        self.inner.lock().unwrap().writes.clone()
    }
}

#[async_trait]
impl ConfigDb for MemoryConfigDb {
    async fn connect(&self, wait_for_init: bool) -> CfgMgmtResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if wait_for_init && !inner.init_done {
            return Err(CfgMgmtError::database(
                "connect",
                "datastore initialization marker not set",
            ));
        }
        inner.connected = true;
        debug!("Connected to in-memory config datastore");
        Ok(())
    }

    async fn read_config(&self) -> CfgMgmtResult<ConfigTree> {
        let inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(CfgMgmtError::database("read_config", "not connected"));
        }
        Ok(inner.tables.clone())
    }

    async fn write_config(&self, patch: &ConfigTree) -> CfgMgmtResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(CfgMgmtError::database("write_config", "not connected"));
        }
        apply_patch(&mut inner.tables, patch);
        inner.writes.push(patch.clone());
        info!("Wrote patch with {} top-level keys", patch.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree(v: Value) -> ConfigTree {
        v.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_connect_requires_init_marker() {
        let db = MemoryConfigDb::new().without_init_marker();
        assert!(db.connect(true).await.is_err());
        assert!(db.connect(false).await.is_ok());
    }

    #[tokio::test]
    async fn test_read_requires_connect() {
        let db = MemoryConfigDb::with_config(tree(json!({"PORT": {}})));
        assert!(db.read_config().await.is_err());
        db.connect(true).await.unwrap();
        assert_eq!(db.read_config().await.unwrap(), tree(json!({"PORT": {}})));
    }

    #[tokio::test]
    async fn test_write_null_deletes_key() {
        let db = MemoryConfigDb::with_config(tree(json!({
            "PORT": {"Ethernet0": {"speed": "100000"}, "Ethernet4": {}}
        })));
        db.connect(true).await.unwrap();

        db.write_config(&tree(json!({"PORT": {"Ethernet0": null}})))
            .await
            .unwrap();

        let cfg = db.config();
        assert!(!cfg["PORT"].as_object().unwrap().contains_key("Ethernet0"));
        assert!(cfg["PORT"].as_object().unwrap().contains_key("Ethernet4"));
        assert_eq!(db.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_write_sets_keys_recursively() {
        let db = MemoryConfigDb::with_config(tree(json!({"PORT": {"Ethernet4": {}}})));
        db.connect(true).await.unwrap();

        db.write_config(&tree(json!({
            "PORT": {"Ethernet0|1": {"speed": "25000"}}
        })))
        .await
        .unwrap();

        let cfg = db.config();
        assert_eq!(cfg["PORT"]["Ethernet0|1"]["speed"], json!("25000"));
        assert!(cfg["PORT"].as_object().unwrap().contains_key("Ethernet4"));
    }

    #[tokio::test]
    async fn test_clone_shares_state() {
        let db = MemoryConfigDb::new();
        let handle = db.clone();
        db.connect(true).await.unwrap();
        db.write_config(&tree(json!({"VLAN": {"Vlan100": {}}})))
            .await
            .unwrap();

        assert!(handle.config().contains_key("VLAN"));
    }
}
