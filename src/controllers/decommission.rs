//! Decommission Controller
//!
//! Handles disk retirement requests placed on StoragePools. Only started
//! once the decommission feature flag is enabled on the cluster; data moves
//! off retired pools through the migration controller.

use super::MigrationController;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// StoragePool parameter carrying the requested decommission mode
pub const DECOMMISSION_MODE_PARAMETER: &str = "decommMode";

/// How data is handled when a pool's disk is retired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DecommissionMode {
    /// Move only what is needed to keep volumes accessible
    EnsureAccessibility,
    /// Move every volume off the pool
    EvacuateAll,
    /// Retire without moving data
    NoAction,
}

impl DecommissionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ensureAccessibility" => Some(DecommissionMode::EnsureAccessibility),
            "evacuateAll" => Some(DecommissionMode::EvacuateAll),
            "noAction" => Some(DecommissionMode::NoAction),
            _ => None,
        }
    }
}

impl std::fmt::Display for DecommissionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecommissionMode::EnsureAccessibility => write!(f, "ensureAccessibility"),
            DecommissionMode::EvacuateAll => write!(f, "evacuateAll"),
            DecommissionMode::NoAction => write!(f, "noAction"),
        }
    }
}

/// Controller handling disk retirement on StoragePools
#[derive(Debug)]
pub struct DecommissionController {
    migration: Arc<MigrationController>,
    requests: RwLock<BTreeMap<String, DecommissionMode>>,
}

impl DecommissionController {
    pub fn new(migration: Arc<MigrationController>) -> Self {
        Self {
            migration,
            requests: RwLock::new(BTreeMap::new()),
        }
    }

    /// Record a decommission request. Returns whether anything changed.
    pub fn request(&self, pool: &str, mode: DecommissionMode) -> bool {
        let previous = self.requests.write().insert(pool.to_string(), mode);
        if previous != Some(mode) {
            info!(
                "Decommission of pool {} requested ({}) on cluster {}",
                pool,
                mode,
                self.migration.cluster_id()
            );
            true
        } else {
            false
        }
    }

    /// Drop a decommission request. Returns whether one was pending.
    pub fn withdraw(&self, pool: &str) -> bool {
        let removed = self.requests.write().remove(pool).is_some();
        if removed {
            info!("Decommission of pool {} withdrawn", pool);
        }
        removed
    }

    pub fn mode(&self, pool: &str) -> Option<DecommissionMode> {
        self.requests.read().get(pool).copied()
    }

    pub fn pending(&self) -> Vec<(String, DecommissionMode)> {
        self.requests
            .read()
            .iter()
            .map(|(pool, mode)| (pool.clone(), *mode))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSession;

    fn controller() -> DecommissionController {
        let migration = Arc::new(MigrationController::new(MockSession::handle("vc"), "cluster-1"));
        DecommissionController::new(migration)
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(
            DecommissionMode::parse("evacuateAll"),
            Some(DecommissionMode::EvacuateAll)
        );
        assert_eq!(DecommissionMode::parse("bogus"), None);
        assert_eq!(DecommissionMode::NoAction.to_string(), "noAction");
    }

    #[test]
    fn test_request_and_withdraw() {
        let controller = controller();
        assert!(controller.request("pool-a", DecommissionMode::EvacuateAll));
        assert!(!controller.request("pool-a", DecommissionMode::EvacuateAll));
        assert!(controller.request("pool-a", DecommissionMode::NoAction));
        assert_eq!(controller.pending().len(), 1);

        assert!(controller.withdraw("pool-a"));
        assert!(!controller.withdraw("pool-a"));
        assert!(controller.pending().is_empty());
    }
}
