//! Common infrastructure for SONiC configuration management crates.
//!
//! This crate provides the pieces shared by the cfgmgmt engine and its
//! consumers:
//!
//! - [`error`]: the `CfgMgmtError` taxonomy and `CfgMgmtResult` alias
//! - [`types`]: the `ConfigTree` value model and JSON loading helpers
//!
//! Expected domain outcomes (a deletion blocked by dependent configuration,
//! a tree that fails validation) are deliberately not part of the error
//! taxonomy; errors here mean an adapter or infrastructure failure.

pub mod error;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CfgMgmtError, CfgMgmtResult};
pub use types::{get_entry, get_table, read_json_file, ConfigTree};
