//! Feature-Gated Activator
//!
//! Starts the decommission controller once its feature flag is enabled on
//! the cluster. The gate is checked immediately and then once per tick; a
//! failed start is retried on the next tick after re-checking the gate.
//! There is no retry limit: the loop ends on activation or cancellation.

use super::stats::ServiceStats;
use super::ticker::Ticker;
use crate::controllers::{DecommissionController, MigrationController};
use crate::domain::ports::{ControllerFactoryRef, FeatureGateRef};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Activator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivatorState {
    Polling,
    Activated,
}

/// How the activator loop ended
#[derive(Debug)]
pub enum ActivationOutcome {
    Activated {
        controller: Arc<DecommissionController>,
        polls: u64,
    },
    Cancelled {
        polls: u64,
    },
}

impl ActivationOutcome {
    pub fn polls(&self) -> u64 {
        match self {
            ActivationOutcome::Activated { polls, .. } => *polls,
            ActivationOutcome::Cancelled { polls } => *polls,
        }
    }

    pub fn is_activated(&self) -> bool {
        matches!(self, ActivationOutcome::Activated { .. })
    }
}

/// Polls a feature gate and starts the decommission controller when enabled
pub struct FeatureGatedActivator {
    feature: String,
    retry_interval: Duration,
    gate: FeatureGateRef,
    factory: ControllerFactoryRef,
    migration: Arc<MigrationController>,
    stats: Arc<ServiceStats>,
    state: ActivatorState,
    polls: u64,
    controller: Option<Arc<DecommissionController>>,
}

impl FeatureGatedActivator {
    pub fn new(
        feature: impl Into<String>,
        retry_interval: Duration,
        gate: FeatureGateRef,
        factory: ControllerFactoryRef,
        migration: Arc<MigrationController>,
        stats: Arc<ServiceStats>,
    ) -> Self {
        Self {
            feature: feature.into(),
            retry_interval,
            gate,
            factory,
            migration,
            stats,
            state: ActivatorState::Polling,
            polls: 0,
            controller: None,
        }
    }

    /// Number of gate checks performed
    pub fn polls(&self) -> u64 {
        self.polls
    }

    /// Run one poll. Once activated, further calls do nothing.
    pub async fn poll_once(&mut self, shutdown: &CancellationToken) -> ActivatorState {
        if self.state == ActivatorState::Activated {
            return self.state;
        }

        self.polls += 1;
        self.stats.record_activator_poll();

        if !self.gate.is_enabled(&self.feature).await {
            info!("{} feature is disabled on the cluster", self.feature);
            return self.state;
        }

        match self
            .factory
            .decommission_controller(self.migration.clone(), shutdown.child_token())
            .await
        {
            Ok(controller) => {
                info!("Decommission controller started ({} enabled)", self.feature);
                self.controller = Some(controller);
                self.state = ActivatorState::Activated;
                self.stats.set_decommission_active();
            }
            Err(e) => {
                self.stats.record_activation_failure();
                let next_retry = chrono::Duration::from_std(self.retry_interval)
                    .map(|delay| Utc::now() + delay)
                    .unwrap_or_else(|_| Utc::now());
                warn!(
                    "Error while initializing decommission controller: {}. Retry will be triggered at {}",
                    e,
                    next_retry.to_rfc3339()
                );
            }
        }

        self.state
    }

    /// Poll until activated or `shutdown` fires, waiting one tick between polls
    pub async fn run<T: Ticker>(mut self, mut ticker: T, shutdown: CancellationToken) -> ActivationOutcome {
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if self.poll_once(&shutdown).await == ActivatorState::Activated {
                if let Some(controller) = self.controller.take() {
                    return ActivationOutcome::Activated {
                        controller,
                        polls: self.polls,
                    };
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
        }

        debug!("Feature-gated activator for {} cancelled", self.feature);
        ActivationOutcome::Cancelled { polls: self.polls }
    }
}
