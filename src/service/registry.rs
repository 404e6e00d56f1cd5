//! Service Registry
//!
//! Holds the assembled controller set. Empty until the initialization
//! pipeline publishes it; afterwards only the controllers' connection fields
//! change, and only while the registry's write lock is held.

use crate::controllers::{
    same_connection, CapacityController, MigrationController, ResourceClassWatcher,
};
use crate::domain::ports::ConnectionHandle;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::sync::Arc;

// =============================================================================
// Service
// =============================================================================

/// Snapshot of references to the assembled controllers
#[derive(Debug, Clone)]
pub struct Service {
    capacity: Arc<CapacityController>,
    resource_class_watcher: Arc<ResourceClassWatcher>,
    migration: Arc<MigrationController>,
    cluster_id: Arc<str>,
}

impl Service {
    pub fn new(
        capacity: Arc<CapacityController>,
        resource_class_watcher: Arc<ResourceClassWatcher>,
        migration: Arc<MigrationController>,
        cluster_id: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            capacity,
            resource_class_watcher,
            migration,
            cluster_id: cluster_id.into(),
        }
    }

    pub fn capacity_controller(&self) -> &Arc<CapacityController> {
        &self.capacity
    }

    pub fn resource_class_watcher(&self) -> &Arc<ResourceClassWatcher> {
        &self.resource_class_watcher
    }

    pub fn migration_controller(&self) -> &Arc<MigrationController> {
        &self.migration
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    /// Handles installed in the capacity controller, resource-class watcher
    /// and migration controller, in that order
    pub fn connections(&self) -> [ConnectionHandle; 3] {
        [
            self.capacity.connection(),
            self.resource_class_watcher.connection(),
            self.migration.connection(),
        ]
    }

    /// Whether all three controllers hold the same handle
    pub fn is_consistent(&self) -> bool {
        let [capacity, watcher, migration] = self.connections();
        same_connection(&capacity, &watcher) && same_connection(&capacity, &migration)
    }
}

// =============================================================================
// Service Registry
// =============================================================================

/// Holder of the assembled [`Service`]
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    service: RwLock<Option<Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Current service, `None` until initialization completes
    pub fn get(&self) -> Option<Service> {
        self.service.read().clone()
    }

    pub fn is_populated(&self) -> bool {
        self.service.read().is_some()
    }

    /// Run `f` under the registry's read lock. Connection fields read inside
    /// `f` cannot interleave with a reset.
    pub fn inspect<R>(&self, f: impl FnOnce(Option<&Service>) -> R) -> R {
        let guard = self.service.read();
        f(guard.as_ref())
    }

    /// Publish the assembled service; only the first publication succeeds
    pub(crate) fn publish(&self, service: Service) -> Result<()> {
        let mut slot = self.service.write();
        if slot.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        *slot = Some(service);
        Ok(())
    }

    /// Install `connection` in every controller within one critical section.
    /// Returns false when there is nothing to update yet.
    pub(crate) fn install_connection(&self, connection: &ConnectionHandle) -> bool {
        let guard = self.service.write();
        let Some(service) = guard.as_ref() else {
            return false;
        };

        service.capacity.connection_slot().replace(connection.clone());
        service
            .resource_class_watcher
            .connection_slot()
            .replace(connection.clone());
        service.migration.connection_slot().replace(connection.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_service, MockSession};
    use assert_matches::assert_matches;

    #[test]
    fn test_empty_registry() {
        let registry = ServiceRegistry::new();
        assert!(registry.get().is_none());
        assert!(!registry.is_populated());
        assert!(registry.inspect(|s| s.is_none()));
        assert!(!registry.install_connection(&MockSession::handle("vc")));
    }

    #[test]
    fn test_publish_once() {
        let registry = ServiceRegistry::new();
        let (service, _) = sample_service("cluster-1");
        registry.publish(service.clone()).unwrap();

        let current = registry.get().unwrap();
        assert_eq!(current.cluster_id(), "cluster-1");
        assert!(Arc::ptr_eq(
            current.capacity_controller(),
            service.capacity_controller()
        ));

        let (other, _) = sample_service("cluster-2");
        assert_matches!(registry.publish(other), Err(Error::AlreadyInitialized));
        assert_eq!(registry.get().unwrap().cluster_id(), "cluster-1");
    }

    #[test]
    fn test_install_connection_updates_all_controllers() {
        let registry = ServiceRegistry::new();
        let (service, original) = sample_service("cluster-1");
        registry.publish(service).unwrap();

        let fresh = MockSession::handle("vc");
        assert!(registry.install_connection(&fresh));

        registry.inspect(|service| {
            let service = service.unwrap();
            assert!(service.is_consistent());
            for connection in service.connections() {
                assert!(same_connection(&connection, &fresh));
                assert!(!same_connection(&connection, &original));
            }
        });
    }
}
