//! Domain Ports - Trait definitions for the StoragePool service's collaborators
//!
//! The service only orchestrates. Registering the resource definition,
//! talking to the storage endpoint, reading feature flags, constructing the
//! sub-controllers and listening for property changes all happen behind
//! these traits.

use crate::config::EndpointConfig;
use crate::controllers::{
    CapacityController, DecommissionController, MigrationController, ResourceClassWatcher,
};
use crate::error::Result;
use crate::service::Service;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Connection Handle
// =============================================================================

/// An authenticated session to the remote storage-management endpoint
#[async_trait]
pub trait RemoteSession: Send + Sync + std::fmt::Debug {
    /// Endpoint this session is connected to
    fn endpoint(&self) -> &str;

    /// Opaque identity of this session, distinct for every established session
    fn session_id(&self) -> &str;

    /// Authenticate the storage policy sub-session on this connection
    async fn connect_policy_service(&self) -> Result<()>;

    /// Check whether the endpoint still honours this session
    async fn is_alive(&self) -> bool;
}

/// Shared connection handle; replaced as a unit on reconnection
pub type ConnectionHandle = Arc<dyn RemoteSession>;

/// Port for establishing endpoint sessions
#[async_trait]
pub trait EndpointConnector: Send + Sync {
    /// Authenticate against the endpoint and return a new session
    async fn connect(&self, endpoint: &EndpointConfig) -> Result<ConnectionHandle>;
}

// =============================================================================
// Resource Definition Registration
// =============================================================================

/// Port for registering cluster-scoped resource definitions
#[async_trait]
pub trait ResourceDefinitionRegistrar: Send + Sync {
    /// Register the definition for `kind`; not assumed to be idempotent
    async fn register(&self, kind: &str) -> Result<()>;
}

// =============================================================================
// Feature Gate
// =============================================================================

/// Port for querying cluster feature flags
#[async_trait]
pub trait FeatureGate: Send + Sync {
    /// Current state of `feature`; lookup failures read as disabled
    async fn is_enabled(&self, feature: &str) -> bool;
}

// =============================================================================
// Controller Construction
// =============================================================================

/// Port for constructing and starting the sub-controllers
#[async_trait]
pub trait ControllerFactory: Send + Sync {
    /// Construct the capacity controller bound to `connection`
    async fn capacity_controller(
        &self,
        connection: ConnectionHandle,
        cluster_id: &str,
    ) -> Result<Arc<CapacityController>>;

    /// Start the resource-class watcher feeding `capacity`
    async fn resource_class_watcher(
        &self,
        capacity: Arc<CapacityController>,
        shutdown: CancellationToken,
    ) -> Result<Arc<ResourceClassWatcher>>;

    /// Construct the migration controller; cannot fail
    fn migration_controller(
        &self,
        connection: ConnectionHandle,
        cluster_id: &str,
    ) -> Arc<MigrationController>;

    /// Start the decommission controller on top of `migration`
    async fn decommission_controller(
        &self,
        migration: Arc<MigrationController>,
        shutdown: CancellationToken,
    ) -> Result<Arc<DecommissionController>>;
}

// =============================================================================
// Change Listener
// =============================================================================

/// Port for the long-lived endpoint property/state change listener
#[async_trait]
pub trait ChangeListener: Send + Sync {
    /// Listen until `shutdown` fires; re-subscribes on its own when the
    /// installed connection changes
    async fn listen(&self, service: Service, shutdown: CancellationToken) -> Result<()>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type EndpointConnectorRef = Arc<dyn EndpointConnector>;
pub type ResourceDefinitionRegistrarRef = Arc<dyn ResourceDefinitionRegistrar>;
pub type FeatureGateRef = Arc<dyn FeatureGate>;
pub type ControllerFactoryRef = Arc<dyn ControllerFactory>;
pub type ChangeListenerRef = Arc<dyn ChangeListener>;
