//! Dynamic Port Breakout orchestration.
//!
//! [`ConfigMgmtDpb`] sequences a breakout ("replace N physical ports with M
//! ports") as an all-or-nothing operation relative to the configuration
//! store:
//!
//! 1. Delete phase: resolve dependencies, delete dependents (if forced) and
//!    the ports, validate, diff, hold the delete patch.
//! 2. Add phase: fold the caller's port config and the synthesized default
//!    config into the tree, validate, diff, hold the add patch. Both phases
//!    are computed before anything is written, so a failure in either aborts
//!    with the datastore untouched.
//! 3. Checkpoint and writes: capture the port-to-OID map, write the delete
//!    patch, poll the ASIC state store until the deleted ports are gone,
//!    write the add patch.
//!
//! The delete patch is durably committed before polling begins; a poll
//! timeout therefore leaves the store and the hardware in disagreement, with
//! no rollback attempted. That gap is inherent to the write-then-poll
//! protocol and is surfaced as the critical `HardwareTimeout` error.

use std::path::PathBuf;

use tracing::{error, info, instrument, warn};

use sonic_cfgmgmt_common::{CfgMgmtError, CfgMgmtResult, ConfigTree};

use crate::asic_verify::{wait_until_ports_absent, AsicDb};
use crate::config_mgmt::ConfigMgmt;
use crate::db::ConfigDb;
use crate::default_config::load_default_config;
use crate::deps::{remove_ports_with_dependencies, RemovalOutcome};
use crate::diff::{create_config_to_load, symmetric_diff};
use crate::merge::merge_configs;
use crate::schema::SchemaEngine;
use crate::tables::{CFG_PORT_TABLE_NAME, DEFAULT_CONFIG_DB_JSON_FILE, MAX_WAIT_SECS};

/// Outcome of a breakout operation. Expected domain conditions are statuses,
/// not errors; `Err` is reserved for adapter and infrastructure failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DpbStatus {
    /// Both phases were written to the datastore.
    Completed,
    /// Dependents exist and `force` was false. Nothing was mutated; the
    /// paths are returned for the caller to confirm.
    Blocked(Vec<String>),
    /// A phase produced a tree that failed validation. Nothing was written.
    ValidationFailed,
}

/// Result of computing the delete phase.
enum DeletePhase {
    Blocked(Vec<String>),
    Invalid,
    Patch(ConfigTree),
}

/// Result of computing the add phase.
enum AddPhase {
    Invalid,
    Patch(ConfigTree),
}

/// Port-breakout orchestrator on top of [`ConfigMgmt`].
pub struct ConfigMgmtDpb {
    base: ConfigMgmt,
    asic_db: Box<dyn AsicDb>,
    default_config_path: PathBuf,
    max_wait_secs: u64,
}

impl ConfigMgmtDpb {
    /// Builds the orchestrator: loads schema, reads the running config and
    /// loads it into the engine (see [`ConfigMgmt::new`]).
    pub async fn new(
        engine: Box<dyn SchemaEngine>,
        config_db: Box<dyn ConfigDb>,
        asic_db: Box<dyn AsicDb>,
        allow_tables_without_schema: bool,
    ) -> CfgMgmtResult<Self> {
        let base = ConfigMgmt::new(engine, config_db, allow_tables_without_schema).await?;
        Ok(Self {
            base,
            asic_db,
            default_config_path: PathBuf::from(DEFAULT_CONFIG_DB_JSON_FILE),
            max_wait_secs: MAX_WAIT_SECS,
        })
    }

    /// Overrides the master default-configuration document location.
    pub fn with_default_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.default_config_path = path.into();
        self
    }

    /// Overrides the hardware-consistency wait bound.
    pub fn with_max_wait(mut self, secs: u64) -> Self {
        self.max_wait_secs = secs;
        self
    }

    /// The underlying configuration-management layer.
    pub fn base(&self) -> &ConfigMgmt {
        &self.base
    }

    /// Replaces `del_ports` with `add_ports` as one operation.
    ///
    /// `port_json` carries the caller's explicit configuration for the new
    /// ports (same shape as the PORT table); with `load_def_config`, default
    /// fragments for the new ports are synthesized from the master document
    /// and merged underneath it.
    #[instrument(skip(self, port_json), fields(del = ?del_ports, add = ?add_ports))]
    pub async fn break_out_port(
        &mut self,
        del_ports: &[String],
        add_ports: &[String],
        port_json: &ConfigTree,
        force: bool,
        load_def_config: bool,
    ) -> CfgMgmtResult<DpbStatus> {
        // Compute the delete phase; a block or invalid tree stops the
        // operation before anything is written.
        let del_patch = match self.delete_ports(del_ports, force)? {
            DeletePhase::Blocked(deps) => return Ok(DpbStatus::Blocked(deps)),
            DeletePhase::Invalid => return Ok(DpbStatus::ValidationFailed),
            DeletePhase::Patch(patch) => patch,
        };

        // Compute the add phase up front as well: no change reaches the
        // datastore unless both phases are valid.
        let add_patch = match self.add_ports(add_ports, port_json, load_def_config)? {
            AddPhase::Invalid => return Ok(DpbStatus::ValidationFailed),
            AddPhase::Patch(patch) => patch,
        };

        // Save the port-to-OID mapping before the delete patch lands; the
        // hardware keys are unreachable by name afterwards.
        let port_map = self.asic_db.interface_oid_map().await?;

        // Update deletion first, verify the hardware caught up, then update
        // addition. A timeout here is critical: the delete patch is already
        // durable and is not rolled back.
        self.base.write_config_db(&del_patch).await?;
        wait_until_ports_absent(self.asic_db.as_ref(), del_ports, &port_map, self.max_wait_secs)
            .await
            .inspect_err(|e| {
                if e.is_critical() {
                    error!("Bailing out, add phase will not run: {}", e);
                }
            })?;
        self.base.write_config_db(&add_patch).await?;

        Ok(DpbStatus::Completed)
    }

    /// Deletes `ports` (and, when forced, their dependents) from the working
    /// tree and computes the delete patch. Nothing is written.
    fn delete_ports(&mut self, ports: &[String], force: bool) -> CfgMgmtResult<DeletePhase> {
        info!("Start port deletion, force={}", force);

        match remove_ports_with_dependencies(self.base.engine.as_mut(), ports, force)? {
            RemovalOutcome::Blocked(deps) => {
                info!("Port deletion blocked by {} dependents", deps.len());
                return Ok(DeletePhase::Blocked(deps));
            }
            RemovalOutcome::Removed => {}
        }

        if !self.base.validate_config_data()? {
            warn!("Port deletion failed: tree invalid after removal");
            return Ok(DeletePhase::Invalid);
        }

        let json_out = self.base.engine.get_data()?;
        let patch = self.update_diff_config_db(&json_out)?;
        self.base.json_out = Some(json_out);
        Ok(DeletePhase::Patch(patch))
    }

    /// Folds `port_json` and the default-config fragments for `ports` into
    /// the tree and computes the add patch. Nothing is written.
    fn add_ports(
        &mut self,
        ports: &[String],
        port_json: &ConfigTree,
        load_def_config: bool,
    ) -> CfgMgmtResult<AddPhase> {
        info!("Start port addition, load_def_config={}", load_def_config);

        let def_config = if load_def_config {
            let fragments = load_default_config(&self.default_config_path, ports)?;
            info!("Merge default config for {:?}", ports);
            fragments
        } else {
            ConfigTree::new()
        };

        // The post-delete tree is the starting point now.
        self.base.json_in = self.base.engine.get_data()?;
        let mut json_out = match self.base.json_out.take() {
            Some(out) => out,
            None => self.base.json_in.clone(),
        };

        let new_ports = port_json
            .get(CFG_PORT_TABLE_NAME)
            .and_then(serde_json::Value::as_object)
            .ok_or_else(|| {
                CfgMgmtError::internal(format!(
                    "port config must carry a {CFG_PORT_TABLE_NAME} table"
                ))
            })?;
        let port_table = json_out
            .entry(CFG_PORT_TABLE_NAME.to_string())
            .or_insert_with(|| serde_json::Value::Object(Default::default()));
        if let Some(table) = port_table.as_object_mut() {
            for (key, value) in new_ports {
                table.insert(key.clone(), value.clone());
            }
        }

        // Caller's explicit values win over defaults: json_out is the base.
        if load_def_config {
            let (merged, _remaining) = merge_configs(&json_out, &def_config, true)?;
            json_out = merged;
        }

        self.base.load_data(&json_out)?;
        if !self.base.validate_config_data()? {
            warn!("Port addition failed: merged tree invalid");
            return Ok(AddPhase::Invalid);
        }

        let json_out = self.base.engine.get_data()?;
        let patch = self.update_diff_config_db(&json_out)?;
        self.base.json_out = Some(json_out);
        Ok(AddPhase::Patch(patch))
    }

    /// Diffs the snapshot pair and translates the diff into a datastore
    /// patch.
    fn update_diff_config_db(&self, json_out: &ConfigTree) -> CfgMgmtResult<ConfigTree> {
        info!("Generate final config to write in datastore");
        let diff = symmetric_diff(&self.base.json_in, json_out);
        create_config_to_load(&diff, &self.base.json_in, json_out)
    }
}
