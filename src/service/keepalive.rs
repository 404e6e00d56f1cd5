//! Session Keepalive
//!
//! Probes the installed endpoint session once per tick and, when the
//! endpoint no longer honours it, connects a fresh one and runs the
//! reconnection protocol. A failed reconnect is retried on the next tick.

use super::lifecycle::{ResetOutcome, StoragePoolService};
use super::ticker::{IntervalTicker, Ticker};
use crate::config::EndpointConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Run the keepalive loop until `shutdown` fires
pub async fn run_session_keepalive<T: Ticker>(
    service: Arc<StoragePoolService>,
    endpoint: EndpointConfig,
    mut ticker: T,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let Some(current) = service.get_service() else {
            continue;
        };
        let connection = current.capacity_controller().connection();
        if connection.is_alive().await {
            debug!("Session {} on {} is alive", connection.session_id(), connection.endpoint());
            continue;
        }

        warn!(
            "Session {} on {} is no longer valid, reconnecting",
            connection.session_id(),
            connection.endpoint()
        );
        match service.reconnect(&endpoint).await {
            Ok(ResetOutcome::Applied) => info!("Reconnected to {}", endpoint.host),
            Ok(outcome) => warn!("Reconnect to {} not applied: {:?}", endpoint.host, outcome),
            Err(e) => warn!("Reconnect to {} failed, retrying at next check: {}", endpoint.host, e),
        }
    }

    debug!("Session keepalive stopped");
}

impl StoragePoolService {
    /// Spawn the session keepalive on the service's shutdown token
    pub fn spawn_keepalive(self: &Arc<Self>, endpoint: EndpointConfig, interval: Duration) -> JoinHandle<()> {
        let token = self.shutdown_token().child_token();
        tokio::spawn(run_session_keepalive(
            self.clone(),
            endpoint,
            IntervalTicker::new(interval),
            token,
        ))
    }
}
