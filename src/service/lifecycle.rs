//! StoragePool Service Lifecycle
//!
//! Brings the sub-controllers up in dependency order around one shared
//! endpoint session, publishes them into the [`ServiceRegistry`] and swaps
//! the session in all of them when the connection is recycled.

use super::activator::{ActivationOutcome, FeatureGatedActivator};
use super::registry::{Service, ServiceRegistry};
use super::stats::ServiceStats;
use super::ticker::IntervalTicker;
use crate::config::{ConfigInfo, EndpointConfig, DISK_DECOMMISSION_FEATURE};
use crate::crd::StoragePool;
use crate::domain::ports::{
    ChangeListenerRef, ConnectionHandle, ControllerFactoryRef, EndpointConnectorRef,
    FeatureGateRef, ResourceDefinitionRegistrarRef,
};
use crate::error::{Error, Result};
use kube::Resource;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

// =============================================================================
// Collaborators
// =============================================================================

/// External collaborators the service is assembled from
#[derive(Clone)]
pub struct Collaborators {
    pub registrar: ResourceDefinitionRegistrarRef,
    pub connector: EndpointConnectorRef,
    pub feature_gate: FeatureGateRef,
    pub factory: ControllerFactoryRef,
    pub listener: ChangeListenerRef,
}

// =============================================================================
// Reset Outcome
// =============================================================================

/// What a reconnection attempt did to the installed handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// The new handle is installed in every controller
    Applied,
    /// No handle was given
    MissingHandle,
    /// Policy service authentication failed; previous handle kept
    PolicyServiceFailed,
    /// Nothing to update yet
    NotInitialized,
}

// =============================================================================
// StoragePool Service
// =============================================================================

/// The StoragePool service: lifecycle owner of the sub-controllers
pub struct StoragePoolService {
    collaborators: Collaborators,
    registry: Arc<ServiceRegistry>,
    stats: Arc<ServiceStats>,
    shutdown: CancellationToken,
    started: AtomicBool,
    activator: Mutex<Option<JoinHandle<ActivationOutcome>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl StoragePoolService {
    /// Create an uninitialized service
    pub fn new(collaborators: Collaborators) -> Arc<Self> {
        Arc::new(Self {
            collaborators,
            registry: ServiceRegistry::new(),
            stats: Arc::new(ServiceStats::default()),
            shutdown: CancellationToken::new(),
            started: AtomicBool::new(false),
            activator: Mutex::new(None),
            listener: Mutex::new(None),
        })
    }

    pub fn registry(&self) -> &Arc<ServiceRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> &Arc<ServiceStats> {
        &self.stats
    }

    /// Current service; `None` until [`initialize`](Self::initialize) succeeds
    pub fn get_service(&self) -> Option<Service> {
        self.registry.get()
    }

    /// Token observed by every background task of this service
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Initialize the service. Startup errors are returned as produced by
    /// the failing collaborator and leave the registry empty.
    pub async fn initialize(&self, config: &ConfigInfo) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(Error::AlreadyInitialized);
        }

        info!("Initializing StoragePool service");
        let result = self.assemble(config).await;
        match &result {
            Ok(()) => info!("Done initializing StoragePool service"),
            Err(_) => self.started.store(false, Ordering::Release),
        }
        result
    }

    async fn assemble(&self, config: &ConfigInfo) -> Result<()> {
        let kind = StoragePool::kind(&());
        if let Err(e) = self.collaborators.registrar.register(&kind).await {
            error!("Failed to create {:?} CRD: {}", kind, e);
            return Err(e);
        }

        let connection = match self.collaborators.connector.connect(&config.endpoint).await {
            Ok(connection) => connection,
            Err(e) => {
                error!("Failed to connect to endpoint {}: {}", config.endpoint.host, e);
                return Err(e);
            }
        };

        if let Err(e) = connection.connect_policy_service().await {
            error!("Failed to connect to storage policy service: {}", e);
            return Err(e);
        }

        let capacity = match self
            .collaborators
            .factory
            .capacity_controller(connection.clone(), &config.cluster_id)
            .await
        {
            Ok(capacity) => capacity,
            Err(e) => {
                error!("Failed starting StoragePool capacity controller: {}", e);
                return Err(e);
            }
        };

        let watcher = match self
            .collaborators
            .factory
            .resource_class_watcher(capacity.clone(), self.shutdown.child_token())
            .await
        {
            Ok(watcher) => watcher,
            Err(e) => {
                error!("Failed starting the storage class watch: {}", e);
                return Err(e);
            }
        };

        let migration = self
            .collaborators
            .factory
            .migration_controller(connection, &config.cluster_id);

        let activator = FeatureGatedActivator::new(
            DISK_DECOMMISSION_FEATURE,
            config.feature_check_interval(),
            self.collaborators.feature_gate.clone(),
            self.collaborators.factory.clone(),
            migration.clone(),
            self.stats.clone(),
        );
        let ticker = IntervalTicker::new(config.feature_check_interval());
        let token = self.shutdown.child_token();
        *self.activator.lock() = Some(tokio::spawn(activator.run(ticker, token)));

        let service = Service::new(capacity, watcher, migration, config.cluster_id.as_str());
        self.registry.publish(service.clone())?;

        let listener = self.collaborators.listener.clone();
        let token = self.shutdown.child_token();
        *self.listener.lock() = Some(tokio::spawn(async move {
            if let Err(e) = listener.listen(service, token).await {
                error!("Change listener stopped: {}", e);
            }
        }));

        Ok(())
    }

    /// Install a recycled connection in every controller. Failures are
    /// logged; the previously installed handle stays in use.
    pub async fn reset(&self, connection: Option<ConnectionHandle>) {
        self.try_reset(connection).await;
    }

    pub(crate) async fn try_reset(&self, connection: Option<ConnectionHandle>) -> ResetOutcome {
        let Some(connection) = connection else {
            error!("Connection handle not given to reset");
            self.stats.record_reset_rejected();
            return ResetOutcome::MissingHandle;
        };

        if let Err(e) = connection.connect_policy_service().await {
            error!("Failed to connect to storage policy service: {}", e);
            self.stats.record_reset_rejected();
            return ResetOutcome::PolicyServiceFailed;
        }

        info!("Resetting endpoint connection in StoragePool service");
        if !self.registry.install_connection(&connection) {
            warn!("StoragePool service not initialized; connection reset ignored");
            self.stats.record_reset_rejected();
            return ResetOutcome::NotInitialized;
        }

        // the change listener re-subscribes on its own
        self.stats.record_reset_applied();
        debug!(
            "Successfully reset connection to {} (session {})",
            connection.endpoint(),
            connection.session_id()
        );
        ResetOutcome::Applied
    }

    /// Establish a fresh session with `endpoint` and reset onto it
    pub async fn reconnect(&self, endpoint: &EndpointConfig) -> Result<ResetOutcome> {
        let connection = self.collaborators.connector.connect(endpoint).await?;
        self.stats.record_reconnect();
        Ok(self.try_reset(Some(connection)).await)
    }

    /// Wait for the feature-gated activator to finish. Returns `None` if it
    /// was never started or has already been joined.
    pub async fn join_activator(&self) -> Option<ActivationOutcome> {
        let handle = self.activator.lock().take()?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Feature-gated activator task failed: {}", e);
                None
            }
        }
    }

    /// Stop every background task and wait for the change listener
    pub async fn shutdown(&self) {
        info!("Shutting down StoragePool service");
        self.shutdown.cancel();

        let listener = self.listener.lock().take();
        if let Some(handle) = listener {
            if let Err(e) = handle.await {
                warn!("Change listener task failed: {}", e);
            }
        }
    }
}
