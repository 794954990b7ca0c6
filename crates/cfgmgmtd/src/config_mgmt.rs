//! Base configuration-management layer.
//!
//! [`ConfigMgmt`] owns the schema engine, the datastore handle and the
//! snapshot pair for one in-flight operation: `json_in` is the tree as it
//! existed immediately before the current logical edit, `json_out` the tree
//! after edits are applied and validated. At most one configuration-changing
//! operation may be in flight per device; callers serialize externally.

use tracing::{info, warn};

use sonic_cfgmgmt_common::{CfgMgmtError, CfgMgmtResult, ConfigTree};

use crate::db::ConfigDb;
use crate::schema::SchemaEngine;

/// Schema-validated view of the device configuration.
pub struct ConfigMgmt {
    pub(crate) engine: Box<dyn SchemaEngine>,
    config_db: Box<dyn ConfigDb>,
    pub(crate) json_in: ConfigTree,
    pub(crate) json_out: Option<ConfigTree>,
    allow_tables_without_schema: bool,
}

impl ConfigMgmt {
    /// Loads the schema, connects to the datastore, reads the running
    /// config and loads it into the engine's working tree.
    ///
    /// Fails if schema modules cannot be parsed, or if the config contains
    /// tables without a schema module and `allow_tables_without_schema` is
    /// false.
    pub async fn new(
        mut engine: Box<dyn SchemaEngine>,
        config_db: Box<dyn ConfigDb>,
        allow_tables_without_schema: bool,
    ) -> CfgMgmtResult<Self> {
        engine.load_schema()?;

        config_db.connect(true).await?;
        info!("Reading data from config datastore");
        let json_in = config_db.read_config().await?;

        let mut mgmt = Self {
            engine,
            config_db,
            json_in: ConfigTree::new(),
            json_out: None,
            allow_tables_without_schema,
        };
        mgmt.load_data(&json_in)?;
        mgmt.json_in = json_in;
        Ok(mgmt)
    }

    /// Tables in the loaded config for which no schema module exists.
    pub fn tables_without_schema(&self) -> Vec<String> {
        self.engine.tables_without_schema()
    }

    /// Loads `config` into the engine's working tree, enforcing the
    /// schema-less-table policy. Does not validate.
    pub fn load_data(&mut self, config: &ConfigTree) -> CfgMgmtResult<()> {
        self.engine.load_data(config)?;

        let orphans = self.engine.tables_without_schema();
        if !self.allow_tables_without_schema && !orphans.is_empty() {
            return Err(CfgMgmtError::schema(
                "load_data",
                format!("config has tables without schema models: {orphans:?}"),
            ));
        }
        Ok(())
    }

    /// Validates the current working tree. `Ok(false)` for an invalid tree
    /// is expected control flow, not an error.
    pub fn validate_config_data(&mut self) -> CfgMgmtResult<bool> {
        let ok = self.engine.validate()?;
        if ok {
            info!("Data validation successful");
        } else {
            warn!("Data validation failed");
        }
        Ok(ok)
    }

    /// Re-reads the running config from the datastore into `json_in`.
    pub async fn read_config_db(&mut self) -> CfgMgmtResult<()> {
        info!("Reading data from config datastore");
        self.json_in = self.config_db.read_config().await?;
        Ok(())
    }

    /// Writes a patch to the datastore. A `null` value deletes the key.
    pub async fn write_config_db(&self, patch: &ConfigTree) -> CfgMgmtResult<()> {
        info!("Writing in config datastore");
        self.config_db.write_config(patch).await
    }

    /// The snapshot taken before the current logical edit.
    pub fn json_in(&self) -> &ConfigTree {
        &self.json_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryConfigDb;
    use crate::schema::tests::{sample_config, test_schema_dir};
    use crate::schema::JsonSchemaEngine;
    use serde_json::json;

    async fn mgmt_with(
        config: ConfigTree,
        allow_tables_without_schema: bool,
    ) -> CfgMgmtResult<(ConfigMgmt, MemoryConfigDb, tempfile::TempDir)> {
        let dir = test_schema_dir();
        let engine = JsonSchemaEngine::new(dir.path());
        let db = MemoryConfigDb::with_config(config);
        let mgmt = ConfigMgmt::new(Box::new(engine), Box::new(db.clone()), allow_tables_without_schema)
            .await?;
        Ok((mgmt, db, dir))
    }

    #[tokio::test]
    async fn test_construction_loads_and_snapshots() {
        let (mgmt, _db, _dir) = mgmt_with(sample_config(), true).await.unwrap();
        assert_eq!(mgmt.json_in(), &sample_config());
        assert_eq!(mgmt.tables_without_schema(), vec!["FEATURE".to_string()]);
    }

    #[tokio::test]
    async fn test_schemaless_tables_rejected_when_not_allowed() {
        let err = mgmt_with(sample_config(), false).await.err().unwrap();
        assert!(err.to_string().contains("tables without schema"));
    }

    #[tokio::test]
    async fn test_validate_pass_and_fail() {
        let (mut mgmt, _db, _dir) = mgmt_with(sample_config(), true).await.unwrap();
        assert!(mgmt.validate_config_data().unwrap());

        mgmt.engine.delete_node("/PORT/Ethernet0").unwrap();
        assert!(!mgmt.validate_config_data().unwrap());
    }

    #[tokio::test]
    async fn test_load_export_round_trip_revalidates() {
        let (mut mgmt, _db, _dir) = mgmt_with(sample_config(), true).await.unwrap();
        assert!(mgmt.validate_config_data().unwrap());

        let exported = mgmt.engine.get_data().unwrap();
        mgmt.load_data(&exported).unwrap();
        assert!(mgmt.validate_config_data().unwrap());
        assert_eq!(mgmt.engine.get_data().unwrap(), exported);
    }

    #[tokio::test]
    async fn test_write_config_db_applies_patch() {
        let (mgmt, db, _dir) = mgmt_with(sample_config(), true).await.unwrap();

        let patch = json!({"PORT": {"Ethernet0": null}}).as_object().unwrap().clone();
        mgmt.write_config_db(&patch).await.unwrap();

        assert!(!db.config()["PORT"].as_object().unwrap().contains_key("Ethernet0"));
    }
}
