//! Resource-Class Watcher
//!
//! Tracks the storage classes served by the CSI provisioner and asks the
//! capacity controller to resync whenever that set changes, since pool
//! compatibility is computed per storage class.

use super::{CapacityController, ConnectionSlot};
use crate::domain::ports::ConnectionHandle;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Watcher of storage classes feeding the capacity controller
#[derive(Debug)]
pub struct ResourceClassWatcher {
    provisioner: String,
    capacity: Arc<CapacityController>,
    connection: ConnectionSlot,
    classes: RwLock<BTreeSet<String>>,
}

impl ResourceClassWatcher {
    /// Create a watcher bound to `capacity`, sharing its connection
    pub fn new(capacity: Arc<CapacityController>, provisioner: impl Into<String>) -> Self {
        let connection = ConnectionSlot::new(capacity.connection());
        Self {
            provisioner: provisioner.into(),
            capacity,
            connection,
            classes: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn provisioner(&self) -> &str {
        &self.provisioner
    }

    pub fn connection(&self) -> ConnectionHandle {
        self.connection.get()
    }

    pub(crate) fn connection_slot(&self) -> &ConnectionSlot {
        &self.connection
    }

    pub fn capacity_controller(&self) -> &Arc<CapacityController> {
        &self.capacity
    }

    /// Record an added or updated storage class. Returns whether the tracked
    /// set changed.
    pub fn observe_applied(&self, name: &str, provisioner: &str) -> bool {
        let changed = if provisioner == self.provisioner {
            self.classes.write().insert(name.to_string())
        } else {
            // the class may have moved away from our provisioner
            self.classes.write().remove(name)
        };

        if changed {
            debug!("Storage class {} changed (provisioner {})", name, provisioner);
            self.capacity
                .request_resync(format!("storage class {} changed", name));
        }
        changed
    }

    /// Record a deleted storage class. Returns whether it was tracked.
    pub fn observe_deleted(&self, name: &str) -> bool {
        let removed = self.classes.write().remove(name);
        if removed {
            debug!("Storage class {} deleted", name);
            self.capacity
                .request_resync(format!("storage class {} deleted", name));
        }
        removed
    }

    /// Replace the tracked set from a full listing of `(name, provisioner)`
    pub fn observe_listing<'a, I>(&self, listing: I) -> bool
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let fresh: BTreeSet<String> = listing
            .into_iter()
            .filter(|(_, provisioner)| *provisioner == self.provisioner)
            .map(|(name, _)| name.to_string())
            .collect();

        let changed = {
            let mut classes = self.classes.write();
            if *classes == fresh {
                false
            } else {
                *classes = fresh;
                true
            }
        };

        if changed {
            info!(
                "Tracking {} storage classes of provisioner {}",
                self.classes.read().len(),
                self.provisioner
            );
            self.capacity.request_resync("storage class listing changed");
        }
        changed
    }

    /// Storage classes currently tracked
    pub fn classes(&self) -> Vec<String> {
        self.classes.read().iter().cloned().collect()
    }
}
