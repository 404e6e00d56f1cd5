//! StoragePool Operator
//!
//! Kubernetes-side lifecycle of the StoragePool service: publishes the
//! StoragePool resource, opens a session with the storage-management
//! endpoint and brings up the sub-controllers that share it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      StoragePoolService                          │
//! │   initialize ─► register CRD ─► connect ─► policy service        │
//! │                     │                                            │
//! │        ┌────────────┼─────────────────┬──────────────────┐       │
//! │        ▼            ▼                 ▼                  ▼       │
//! │   Capacity    ResourceClass      Migration     FeatureGated      │
//! │   Controller  Watcher            Controller    Activator         │
//! │        │            │                 │              │           │
//! │        └──── ServiceRegistry ─────────┘              ▼           │
//! │              (one shared session)          Decommission          │
//! │                                            Controller            │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  reset / reconnect: swap the session in every controller at once │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`service`]: Lifecycle, registry, activator and keepalive
//! - [`controllers`]: The StoragePool sub-controllers
//! - [`adapters`]: Kubernetes and endpoint implementations of the ports
//! - [`crd`]: Custom Resource Definitions
//! - [`domain`]: Port traits
//! - [`config`]: Service configuration
//! - [`error`]: Error types and handling

pub mod adapters;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod domain;
pub mod error;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use adapters::{
    ConfigMapFeatureGate, HttpEndpointConnector, KubeControllerFactory, KubeCrdRegistrar,
    SessionChangeListener,
};

pub use config::{ConfigInfo, EndpointConfig, FeatureStatesConfig};

pub use controllers::{
    CapacityController, DecommissionController, DecommissionMode, MigrationController,
    ResourceClassWatcher,
};

pub use crd::{StoragePool, StoragePoolSpec, StoragePoolStatus};

pub use domain::ports::{
    ChangeListener, ConnectionHandle, ControllerFactory, EndpointConnector, FeatureGate,
    RemoteSession, ResourceDefinitionRegistrar,
};

pub use error::{Error, Result};

pub use service::{
    ActivationOutcome, Collaborators, ResetOutcome, Service, ServiceRegistry, ServiceStats,
    ServiceStatsSnapshot, StoragePoolService,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
