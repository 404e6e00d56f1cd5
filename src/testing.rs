//! In-memory collaborators for unit tests
//!
//! Every mock records how it was called so tests can assert on ordering and
//! retry behaviour without a Kubernetes API or storage endpoint.

use crate::config::{ConfigInfo, EndpointConfig};
use crate::controllers::{
    CapacityController, DecommissionController, MigrationController, ResourceClassWatcher,
};
use crate::domain::ports::{
    ChangeListener, ConnectionHandle, ControllerFactory, EndpointConnector, FeatureGate,
    RemoteSession, ResourceDefinitionRegistrar,
};
use crate::error::{Error, Result};
use crate::service::{Collaborators, Service, StoragePoolService, Ticker};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

static NEXT_MOCK_SESSION: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Sessions
// =============================================================================

#[derive(Debug)]
pub struct MockSession {
    endpoint: String,
    session_id: String,
    policy_fails: bool,
    alive: AtomicBool,
    policy_calls: AtomicU64,
}

impl MockSession {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            session_id: format!(
                "mock-session-{}",
                NEXT_MOCK_SESSION.fetch_add(1, Ordering::Relaxed)
            ),
            policy_fails: false,
            alive: AtomicBool::new(true),
            policy_calls: AtomicU64::new(0),
        }
    }

    pub fn handle(endpoint: &str) -> ConnectionHandle {
        Arc::new(Self::new(endpoint))
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn with_policy_failure(mut self) -> Arc<Self> {
        self.policy_fails = true;
        Arc::new(self)
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn policy_calls(&self) -> u64 {
        self.policy_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSession for MockSession {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn connect_policy_service(&self) -> Result<()> {
        self.policy_calls.fetch_add(1, Ordering::SeqCst);
        if self.policy_fails {
            Err(Error::PolicyService {
                endpoint: self.endpoint.clone(),
                reason: "503 Service Unavailable".into(),
            })
        } else {
            Ok(())
        }
    }

    async fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Connector handing out queued sessions, then fresh ones
#[derive(Default)]
pub struct MockConnector {
    fail: AtomicBool,
    queued: Mutex<VecDeque<Arc<MockSession>>>,
    connects: AtomicU64,
}

impl MockConnector {
    pub fn queue(&self, session: Arc<MockSession>) {
        self.queued.lock().push_back(session);
    }

    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EndpointConnector for MockConnector {
    async fn connect(&self, endpoint: &EndpointConfig) -> Result<ConnectionHandle> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::SessionRejected {
                endpoint: endpoint.base_url(),
                reason: "401 Unauthorized".into(),
            });
        }
        let session: ConnectionHandle = self
            .queued
            .lock()
            .pop_front()
            .unwrap_or_else(|| MockSession::new(&endpoint.host).shared());
        Ok(session)
    }
}

// =============================================================================
// Registrar
// =============================================================================

#[derive(Default)]
pub struct MockRegistrar {
    fail: AtomicBool,
    kinds: Mutex<Vec<String>>,
}

impl MockRegistrar {
    pub fn kinds(&self) -> Vec<String> {
        self.kinds.lock().clone()
    }
}

#[async_trait]
impl ResourceDefinitionRegistrar for MockRegistrar {
    async fn register(&self, kind: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::ResourceDefinition {
                kind: kind.to_string(),
                reason: "forbidden".into(),
            });
        }
        self.kinds.lock().push(kind.to_string());
        Ok(())
    }
}

// =============================================================================
// Feature Gate
// =============================================================================

/// Gate answering from a script, then a fixed default
pub struct ScriptedGate {
    script: Mutex<VecDeque<bool>>,
    default: bool,
    queries: AtomicU64,
}

impl ScriptedGate {
    pub fn always(enabled: bool) -> Self {
        Self::scripted(Vec::new(), enabled)
    }

    pub fn scripted(script: Vec<bool>, default: bool) -> Self {
        Self {
            script: Mutex::new(script.into()),
            default,
            queries: AtomicU64::new(0),
        }
    }

    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeatureGate for ScriptedGate {
    async fn is_enabled(&self, _feature: &str) -> bool {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.script.lock().pop_front().unwrap_or(self.default)
    }
}

// =============================================================================
// Controller Factory
// =============================================================================

#[derive(Default)]
pub struct MockFactory {
    fail_capacity: AtomicBool,
    fail_watcher: AtomicBool,
    decommission_failures: AtomicU64,
    capacity_attempts: AtomicU64,
    decommission_attempts: AtomicU64,
}

impl MockFactory {
    /// Fail the first `count` decommission controller starts
    pub fn failing_decommission(self, count: u64) -> Self {
        self.decommission_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn clear_failures(&self) {
        self.fail_capacity.store(false, Ordering::SeqCst);
        self.fail_watcher.store(false, Ordering::SeqCst);
        self.decommission_failures.store(0, Ordering::SeqCst);
    }

    pub fn capacity_attempts(&self) -> u64 {
        self.capacity_attempts.load(Ordering::SeqCst)
    }

    pub fn decommission_attempts(&self) -> u64 {
        self.decommission_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ControllerFactory for MockFactory {
    async fn capacity_controller(
        &self,
        connection: ConnectionHandle,
        cluster_id: &str,
    ) -> Result<Arc<CapacityController>> {
        self.capacity_attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_capacity.load(Ordering::SeqCst) {
            return Err(Error::controller_start("capacity", "datastores unavailable"));
        }
        Ok(Arc::new(CapacityController::new(connection, cluster_id)?))
    }

    async fn resource_class_watcher(
        &self,
        capacity: Arc<CapacityController>,
        _shutdown: CancellationToken,
    ) -> Result<Arc<ResourceClassWatcher>> {
        if self.fail_watcher.load(Ordering::SeqCst) {
            return Err(Error::controller_start("resource-class", "watch refused"));
        }
        Ok(Arc::new(ResourceClassWatcher::new(
            capacity,
            crate::config::DEFAULT_PROVISIONER,
        )))
    }

    fn migration_controller(
        &self,
        connection: ConnectionHandle,
        cluster_id: &str,
    ) -> Arc<MigrationController> {
        Arc::new(MigrationController::new(connection, cluster_id))
    }

    async fn decommission_controller(
        &self,
        migration: Arc<MigrationController>,
        _shutdown: CancellationToken,
    ) -> Result<Arc<DecommissionController>> {
        self.decommission_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.decommission_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.decommission_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::controller_start("decommission", "StoragePool API not ready"));
        }
        Ok(Arc::new(DecommissionController::new(migration)))
    }
}

// =============================================================================
// Listener
// =============================================================================

/// Listener that only records its lifecycle
#[derive(Default)]
pub struct NoopListener {
    started: AtomicBool,
    stopped: AtomicBool,
    notify: Notify,
}

impl NoopListener {
    pub async fn wait_started(&self) {
        if !self.started.load(Ordering::SeqCst) {
            self.notify.notified().await;
        }
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChangeListener for NoopListener {
    async fn listen(&self, _service: Service, shutdown: CancellationToken) -> Result<()> {
        self.started.store(true, Ordering::SeqCst);
        self.notify.notify_one();
        shutdown.cancelled().await;
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Ticker
// =============================================================================

/// Shared view of a [`CountingTicker`]'s tick count
#[derive(Clone, Default)]
pub struct TickCounter(Arc<AtomicU64>);

impl TickCounter {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Ticker that never waits; counts ticks and can cancel a token
#[derive(Default)]
pub struct CountingTicker {
    ticks: TickCounter,
    cancel_after: Option<(u64, CancellationToken)>,
    hook: Option<Box<dyn FnMut(u64) + Send>>,
}

impl CountingTicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self) -> TickCounter {
        self.ticks.clone()
    }

    /// Cancel `token` on tick number `ticks`
    pub fn cancel_after(mut self, ticks: u64, token: CancellationToken) -> Self {
        self.cancel_after = Some((ticks, token));
        self
    }

    /// Run `hook` with the tick number on every tick
    pub fn on_tick(mut self, hook: impl FnMut(u64) + Send + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }
}

#[async_trait]
impl Ticker for CountingTicker {
    async fn tick(&mut self) {
        let tick = self.ticks.0.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = self.hook.as_mut() {
            hook(tick);
        }
        if let Some((limit, token)) = &self.cancel_after {
            if tick >= *limit {
                token.cancel();
            }
        }
        tokio::task::yield_now().await;
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub fn test_config() -> ConfigInfo {
    ConfigInfo::from_yaml_str(
        r#"
clusterId: cluster-1
endpoint:
  host: vc.example.local
  username: administrator
  password: s3cret
"#,
    )
    .expect("test config parses")
}

/// A consistent service around one fresh session
pub fn sample_service(cluster_id: &str) -> (Service, ConnectionHandle) {
    let connection = MockSession::handle("vc.example.local");
    let capacity = Arc::new(
        CapacityController::new(connection.clone(), cluster_id).expect("valid cluster id"),
    );
    let watcher = Arc::new(ResourceClassWatcher::new(
        capacity.clone(),
        crate::config::DEFAULT_PROVISIONER,
    ));
    let migration = Arc::new(MigrationController::new(connection.clone(), cluster_id));
    (Service::new(capacity, watcher, migration, cluster_id), connection)
}

/// Mock collaborators ready to assemble a [`StoragePoolService`]
pub struct TestHarness {
    pub registrar: Arc<MockRegistrar>,
    pub connector: Arc<MockConnector>,
    pub gate: Arc<ScriptedGate>,
    pub factory: Arc<MockFactory>,
    pub listener: Arc<NoopListener>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            registrar: Arc::default(),
            connector: Arc::default(),
            gate: Arc::new(ScriptedGate::always(true)),
            factory: Arc::default(),
            listener: Arc::default(),
        }
    }

    pub fn failing_registration(self) -> Self {
        self.registrar.fail.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_connect(self) -> Self {
        self.connector.fail.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_capacity(self) -> Self {
        self.factory.fail_capacity.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_watcher(self) -> Self {
        self.factory.fail_watcher.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_gate_disabled(mut self) -> Self {
        self.gate = Arc::new(ScriptedGate::always(false));
        self
    }

    pub fn service(&self) -> Arc<StoragePoolService> {
        StoragePoolService::new(Collaborators {
            registrar: self.registrar.clone(),
            connector: self.connector.clone(),
            feature_gate: self.gate.clone(),
            factory: self.factory.clone(),
            listener: self.listener.clone(),
        })
    }
}
