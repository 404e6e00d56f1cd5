//! StoragePool Sub-Controllers
//!
//! The controllers assembled by the StoragePool service:
//! - CapacityController: keeps StoragePool capacity in sync with datastores
//! - ResourceClassWatcher: tracks storage classes of the CSI provisioner
//! - MigrationController: tracks volume migrations between pools
//! - DecommissionController: drives disk retirement (feature gated)
//!
//! The first three each hold their own [`ConnectionSlot`]; the slots are
//! rewritten together by the service's reconnection protocol.

pub mod capacity;
pub mod decommission;
pub mod migration;
pub mod resource_class;

pub use capacity::*;
pub use decommission::*;
pub use migration::*;
pub use resource_class::*;

use crate::domain::ports::ConnectionHandle;
use parking_lot::RwLock;
use std::sync::Arc;

// =============================================================================
// Connection Slot
// =============================================================================

/// A controller's replaceable reference to the shared connection handle
#[derive(Debug)]
pub struct ConnectionSlot {
    inner: RwLock<ConnectionHandle>,
}

impl ConnectionSlot {
    pub fn new(connection: ConnectionHandle) -> Self {
        Self {
            inner: RwLock::new(connection),
        }
    }

    /// Currently installed handle
    pub fn get(&self) -> ConnectionHandle {
        self.inner.read().clone()
    }

    /// Install `connection`, returning the previous handle
    pub(crate) fn replace(&self, connection: ConnectionHandle) -> ConnectionHandle {
        std::mem::replace(&mut *self.inner.write(), connection)
    }

    /// Check whether `connection` is the installed handle
    pub fn holds(&self, connection: &ConnectionHandle) -> bool {
        same_connection(&self.inner.read(), connection)
    }
}

/// Identity comparison of two handles (same session object)
pub fn same_connection(a: &ConnectionHandle, b: &ConnectionHandle) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSession;

    #[test]
    fn test_slot_replace() {
        let first = MockSession::handle("vc-1");
        let second = MockSession::handle("vc-2");
        let slot = ConnectionSlot::new(first.clone());

        assert!(slot.holds(&first));
        let previous = slot.replace(second.clone());
        assert!(same_connection(&previous, &first));
        assert!(slot.holds(&second));
        assert!(!slot.holds(&first));
    }

    #[test]
    fn test_same_connection_is_identity() {
        let a = MockSession::handle("vc");
        let b = MockSession::handle("vc");
        assert!(same_connection(&a, &a.clone()));
        assert!(!same_connection(&a, &b));
    }
}
