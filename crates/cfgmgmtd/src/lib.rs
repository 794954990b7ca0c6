//! Configuration management and Dynamic Port Breakout for SONiC.
//!
//! This crate implements the `cfgmgmtd` engine: a schema-validated in-memory
//! view of the device's running configuration, structural edits for dynamic
//! port breakout, minimal diff/patch computation against the configuration
//! datastore, and a bounded-wait hardware-consistency handshake against the
//! ASIC state store.
//!
//! # Responsibilities
//!
//! - Load the config into a schema tree and validate it ([`schema`])
//! - Discover dependent nodes before destructive edits ([`deps`])
//! - Synthesize per-port default config from the master document
//!   ([`default_config`])
//! - Merge caller config with defaults under a priority rule ([`merge`])
//! - Diff snapshots and translate the diff into datastore patches ([`diff`])
//! - Verify port deletion against the ASIC state store ([`asic_verify`])
//! - Orchestrate the whole breakout ([`dpb`])
//!
//! # Breakout flow
//!
//! | Step | Component | Datastore effect |
//! |------|-----------|------------------|
//! | Resolve dependencies | `deps` | none (may block) |
//! | Delete ports, validate, diff | `schema` + `diff` | none (patch held) |
//! | Merge defaults + caller config, validate, diff | `merge` + `diff` | none (patch held) |
//! | Write delete patch | `db` | keys nulled |
//! | Poll ASIC state | `asic_verify` | none (may time out, critical) |
//! | Write add patch | `db` | keys set |
//!
//! The delete patch is committed before polling begins; there is no
//! atomicity across that checkpoint and no rollback on timeout.

pub mod asic_verify;
pub mod config_mgmt;
pub mod db;
pub mod default_config;
pub mod deps;
pub mod diff;
pub mod dpb;
pub mod merge;
pub mod schema;
pub mod tables;

pub use asic_verify::{AsicDb, MemoryAsicDb};
pub use config_mgmt::ConfigMgmt;
pub use db::{ConfigDb, MemoryConfigDb};
pub use dpb::{ConfigMgmtDpb, DpbStatus};
pub use schema::{JsonSchemaEngine, SchemaEngine};
