//! Migration Controller
//!
//! Moves volumes between StoragePools on behalf of the decommission
//! controller. Construction is purely local and cannot fail.

use super::ConnectionSlot;
use crate::domain::ports::ConnectionHandle;

/// Controller migrating data between pools
#[derive(Debug)]
pub struct MigrationController {
    cluster_id: String,
    connection: ConnectionSlot,
}

impl MigrationController {
    pub fn new(connection: ConnectionHandle, cluster_id: impl Into<String>) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            connection: ConnectionSlot::new(connection),
        }
    }

    pub fn cluster_id(&self) -> &str {
        &self.cluster_id
    }

    pub fn connection(&self) -> ConnectionHandle {
        self.connection.get()
    }

    pub(crate) fn connection_slot(&self) -> &ConnectionSlot {
        &self.connection
    }
}
