//! Hardware-state verification.
//!
//! After the delete patch is committed, the orchestrator must not proceed to
//! the add phase until the hardware has actually unprogrammed the deleted
//! ports. [`wait_until_ports_absent`] polls the ASIC state store at 1 Hz,
//! bounded by a timeout; expiry is the critical
//! [`CfgMgmtError::HardwareTimeout`], since configuration intent and device
//! state then disagree.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use sonic_cfgmgmt_common::{CfgMgmtError, CfgMgmtResult};

use crate::tables::ASIC_PORT_OID_KEY_PREFIX;

/// Boundary trait for the hardware/ASIC state store.
#[async_trait]
pub trait AsicDb: Send + Sync {
    /// Reports whether a hardware-programmed key exists.
    async fn key_exists(&self, key: &str) -> CfgMgmtResult<bool>;

    /// Resolves the port-name to hardware-OID mapping.
    async fn interface_oid_map(&self) -> CfgMgmtResult<HashMap<String, String>>;
}

/// One poll: returns the ports whose hardware keys still exist.
async fn ports_still_present(
    db: &dyn AsicDb,
    ports: &[String],
    port_map: &HashMap<String, String>,
) -> CfgMgmtResult<Vec<String>> {
    let mut present = Vec::new();
    for port in ports {
        let oid = port_map.get(port).ok_or_else(|| {
            CfgMgmtError::internal(format!("no hardware OID mapping for port {port}"))
        })?;
        let key = format!("{ASIC_PORT_OID_KEY_PREFIX}{oid}");
        debug!("Check key in ASIC state: {}", key);
        if db.key_exists(&key).await? {
            present.push(port.clone());
        }
    }
    Ok(present)
}

/// Polls the ASIC state store once per second until none of `ports` has a
/// hardware key left, or `timeout_secs` elapses.
pub async fn wait_until_ports_absent(
    db: &dyn AsicDb,
    ports: &[String],
    port_map: &HashMap<String, String>,
    timeout_secs: u64,
) -> CfgMgmtResult<()> {
    info!("Verify port deletion from ASIC state, wait...");

    let attempts = timeout_secs.max(1);
    let mut present = Vec::new();
    for attempt in 0..attempts {
        debug!("Check ASIC state: try {}", attempt + 1);
        present = ports_still_present(db, ports, port_map).await?;
        if present.is_empty() {
            info!("All {} ports absent from ASIC state", ports.len());
            return Ok(());
        }
        if attempt + 1 < attempts {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    warn!(
        "Critical failure: ports not deleted from ASIC state after {}s: {:?}",
        timeout_secs, present
    );
    Err(CfgMgmtError::HardwareTimeout {
        entities: present,
        timeout_secs,
    })
}

#[derive(Debug, Default)]
struct MemoryAsicDbInner {
    /// key -> polls remaining before the key reads as absent. `None` means
    /// the key never vanishes.
    keys: HashMap<String, Option<u32>>,
    oid_map: HashMap<String, String>,
}

/// In-memory ASIC state store with scriptable key lifetimes.
#[derive(Debug, Clone, Default)]
pub struct MemoryAsicDb {
    inner: Arc<Mutex<MemoryAsicDbInner>>,
}

impl MemoryAsicDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Programs a port: records its OID mapping and creates its hardware
    /// key, which vanishes after `vanish_after_polls` existence checks
    /// (`None`: never vanishes).
    pub fn program_port(&self, port: &str, oid: &str, vanish_after_polls: Option<u32>) {
        let mut inner = self.inner.lock().unwrap();
        inner.oid_map.insert(port.to_string(), oid.to_string());
        inner
            .keys
            .insert(format!("{ASIC_PORT_OID_KEY_PREFIX}{oid}"), vanish_after_polls);
    }

    /// Records an OID mapping without a hardware key (port already absent).
    pub fn map_port(&self, port: &str, oid: &str) {
        self.inner
            .lock()
            .unwrap()
            .oid_map
            .insert(port.to_string(), oid.to_string());
    }
}

#[async_trait]
impl AsicDb for MemoryAsicDb {
    async fn key_exists(&self, key: &str) -> CfgMgmtResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.keys.get_mut(key) {
            None => Ok(false),
            Some(None) => Ok(true),
            Some(Some(polls)) => {
                if *polls == 0 {
                    inner.keys.remove(key);
                    Ok(false)
                } else {
                    *polls -= 1;
                    Ok(true)
                }
            }
        }
    }

    async fn interface_oid_map(&self) -> CfgMgmtResult<HashMap<String, String>> {
        Ok(self.inner.lock().unwrap().oid_map.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ports_already_absent() {
        let db = MemoryAsicDb::new();
        db.map_port("Ethernet0", "1000000000001");

        let map = db.interface_oid_map().await.unwrap();
        wait_until_ports_absent(&db, &ports(&["Ethernet0"]), &map, 60)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_port_vanishes_within_timeout() {
        let db = MemoryAsicDb::new();
        db.program_port("Ethernet0", "1000000000001", Some(2));

        let map = db.interface_oid_map().await.unwrap();
        let start = tokio::time::Instant::now();
        wait_until_ports_absent(&db, &ports(&["Ethernet0"]), &map, 60)
            .await
            .unwrap();
        // Two present polls, so two 1s sleeps before the third succeeds.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_critical() {
        let db = MemoryAsicDb::new();
        db.program_port("Ethernet0", "1000000000001", None);

        let map = db.interface_oid_map().await.unwrap();
        let err = wait_until_ports_absent(&db, &ports(&["Ethernet0"]), &map, 5)
            .await
            .unwrap_err();
        assert!(err.is_critical());
        match err {
            CfgMgmtError::HardwareTimeout { entities, timeout_secs } => {
                assert_eq!(entities, ports(&["Ethernet0"]));
                assert_eq!(timeout_secs, 5);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_oid_mapping_is_error() {
        let db = MemoryAsicDb::new();
        let map = HashMap::new();
        let err = wait_until_ports_absent(&db, &ports(&["Ethernet0"]), &map, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, CfgMgmtError::Internal { .. }));
    }
}
