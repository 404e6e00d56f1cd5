//! Capacity Controller
//!
//! Owns the StoragePool view of datastore capacity for one cluster. The
//! capacity computation itself runs on resync requests raised by the
//! resource-class watcher and the change listener.

use super::ConnectionSlot;
use crate::domain::ports::ConnectionHandle;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Controller that keeps StoragePool capacity in sync with the endpoint
#[derive(Debug)]
pub struct CapacityController {
    cluster_id: String,
    connection: ConnectionSlot,
    resync_requests: AtomicU64,
    last_resync_reason: RwLock<Option<String>>,
}

impl CapacityController {
    /// Create a capacity controller bound to `connection`
    pub fn new(connection: ConnectionHandle, cluster_id: impl Into<String>) -> Result<Self> {
        let cluster_id = cluster_id.into();
        if cluster_id.trim().is_empty() {
            return Err(Error::controller_start("capacity", "cluster id is empty"));
        }

        Ok(Self {
            cluster_id,
            connection: ConnectionSlot::new(connection),
            resync_requests: AtomicU64::new(0),
            last_resync_reason: RwLock::new(None),
        })
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    /// Connection handle used for the next endpoint call
    pub fn connection(&self) -> ConnectionHandle {
        self.connection.get()
    }

    pub(crate) fn connection_slot(&self) -> &ConnectionSlot {
        &self.connection
    }

    /// Ask for all StoragePools of this cluster to be recomputed
    pub fn request_resync(&self, reason: impl Into<String>) {
        let reason = reason.into();
        debug!(cluster = %self.cluster_id, "StoragePool resync requested: {}", reason);
        self.resync_requests.fetch_add(1, Ordering::Relaxed);
        *self.last_resync_reason.write() = Some(reason);
    }

    /// Number of resyncs requested so far
    pub fn resync_requests(&self) -> u64 {
        self.resync_requests.load(Ordering::Relaxed)
    }

    pub fn last_resync_reason(&self) -> Option<String> {
        self.last_resync_reason.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSession;
    use assert_matches::assert_matches;

    #[test]
    fn test_empty_cluster_id_rejected() {
        let result = CapacityController::new(MockSession::handle("vc"), "  ");
        assert_matches!(result, Err(Error::ControllerStart { .. }));
    }

    #[test]
    fn test_resync_requests_counted() {
        let controller = CapacityController::new(MockSession::handle("vc"), "cluster-1").unwrap();
        assert_eq!(controller.resync_requests(), 0);
        assert_eq!(controller.last_resync_reason(), None);

        controller.request_resync("storage class gold added");
        controller.request_resync("session changed");

        assert_eq!(controller.resync_requests(), 2);
        assert_eq!(controller.last_resync_reason().as_deref(), Some("session changed"));
        assert_eq!(controller.cluster_id(), "cluster-1");
    }
}
