//! Table name and path constants for the cfgmgmt engine.
//!
//! These match the CONFIG_DB and ASIC_DB schema used on the switch.

/// CONFIG_DB table holding physical port configuration.
pub const CFG_PORT_TABLE_NAME: &str = "PORT";

/// ASIC_DB key prefix for hardware-programmed port objects. The port OID
/// (hex, without leading `0x`) is appended to form the full key.
pub const ASIC_PORT_OID_KEY_PREFIX: &str = "ASIC_STATE:SAI_OBJECT_TYPE_PORT:oid:0x";

/// Default directory holding the schema modules.
pub const DEFAULT_SCHEMA_DIR: &str = "/usr/local/yang-models";

/// Dump of CONFIG_DB, used when operating on files instead of the live DB.
pub const CONFIG_DB_JSON_FILE: &str = "/etc/sonic/config_db.json";

/// Master default-configuration document, keyed like CONFIG_DB.
pub const DEFAULT_CONFIG_DB_JSON_FILE: &str = "/etc/sonic/default_config_db.json";

/// Bound on the hardware-consistency wait, in seconds (1 Hz polling).
pub const MAX_WAIT_SECS: u64 = 60;
