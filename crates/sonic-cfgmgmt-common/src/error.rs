//! Error types for configuration management operations.
//!
//! This module defines the error taxonomy shared by the cfgmgmt crates.
//! All errors implement `std::error::Error` via `thiserror`.
//!
//! Expected domain outcomes (blocked-by-dependency, failed validation) are
//! not errors; they are modeled as status values by the callers. Errors are
//! reserved for adapter and infrastructure failures.

use std::io;
use thiserror::Error;

/// Result type alias for cfgmgmt operations.
pub type CfgMgmtResult<T> = Result<T, CfgMgmtError>;

/// Errors that can occur during cfgmgmt operations.
#[derive(Debug, Error)]
pub enum CfgMgmtError {
    /// Schema engine operation failed. The underlying engine error is
    /// opaque and carried as a message, never interpreted.
    #[error("Schema engine operation failed: {operation}: {message}")]
    Schema {
        /// The operation that failed (e.g., "load_schema", "delete_node").
        operation: String,
        /// Error message from the engine.
        message: String,
    },

    /// Configuration datastore operation failed.
    #[error("Database operation failed: {operation}: {message}")]
    Database {
        /// The operation that failed (e.g., "connect", "write_config").
        operation: String,
        /// Error message.
        message: String,
    },

    /// A schema-tree path does not address an existing node.
    #[error("Path not found in data tree: {path}")]
    PathNotFound {
        /// The slash-separated node path.
        path: String,
    },

    /// Structurally incompatible values at the same key during a merge
    /// (list vs. dict, container vs. scalar). Indicates malformed input.
    #[error("Cannot merge configs at key '{key}': {message}")]
    MergeConflict {
        /// The key at which the conflict occurred.
        key: String,
        /// Description of the incompatibility.
        message: String,
    },

    /// The diff contains an in-place value update, which the patch
    /// translator does not support. Updates must be modeled as
    /// delete + insert.
    #[error("In-place update not supported by patch translation at: {path}")]
    UnsupportedUpdate {
        /// Location of the update marker in the diff.
        path: String,
    },

    /// Hardware state still holds entities after the bounded wait.
    /// Critical: the configuration store and the device now disagree.
    #[error(
        "Ports still present in ASIC state after {timeout_secs}s: {entities:?}"
    )]
    HardwareTimeout {
        /// The entities that never disappeared.
        entities: Vec<String>,
        /// The configured timeout in seconds.
        timeout_secs: u64,
    },

    /// JSON document could not be parsed.
    #[error("Failed to parse JSON from {path}: {message}")]
    Json {
        /// Source file path or description.
        path: String,
        /// Parser error message.
        message: String,
    },

    /// File I/O failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file path involved.
        path: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl CfgMgmtError {
    /// Creates a schema engine error.
    pub fn schema(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a database error.
    pub fn database(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Database {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a path-not-found error.
    pub fn path_not_found(path: impl Into<String>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    /// Creates a merge conflict error.
    pub fn merge_conflict(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MergeConflict {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error means the device's live state may now
    /// disagree with the configuration store. Callers must abort the
    /// in-flight operation and must not write further patches.
    pub fn is_critical(&self) -> bool {
        matches!(self, CfgMgmtError::HardwareTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CfgMgmtError::path_not_found("/PORT/Ethernet0");
        assert_eq!(err.to_string(), "Path not found in data tree: /PORT/Ethernet0");
    }

    #[test]
    fn test_schema_error() {
        let err = CfgMgmtError::schema("delete_node", "no such node");
        assert_eq!(
            err.to_string(),
            "Schema engine operation failed: delete_node: no such node"
        );
    }

    #[test]
    fn test_merge_conflict() {
        let err = CfgMgmtError::merge_conflict("ports", "list vs dict");
        assert!(err.to_string().contains("ports"));
        assert!(err.to_string().contains("list vs dict"));
    }

    #[test]
    fn test_is_critical() {
        let timeout = CfgMgmtError::HardwareTimeout {
            entities: vec!["Ethernet0".to_string()],
            timeout_secs: 60,
        };
        assert!(timeout.is_critical());
        assert!(!CfgMgmtError::internal("bug").is_critical());
        assert!(!CfgMgmtError::database("read_config", "down").is_critical());
    }
}
