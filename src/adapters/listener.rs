//! Session Change Listener
//!
//! Follows property changes on the endpoint for the capacity controller.
//! Each pass reads the handle currently installed in the capacity
//! controller; when a reset has swapped it, the listener re-subscribes on
//! the new session and requests a full resync.

use crate::domain::ports::ChangeListener;
use crate::error::Result;
use crate::service::{IntervalTicker, Service, Ticker};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Listener that re-subscribes whenever the installed session changes
#[derive(Debug, Clone)]
pub struct SessionChangeListener {
    interval: Duration,
}

impl SessionChangeListener {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Run passes on `ticker` until `shutdown` fires
    pub async fn run<T: Ticker>(&self, service: Service, mut ticker: T, shutdown: CancellationToken) {
        let capacity = service.capacity_controller().clone();
        let mut subscribed = capacity.connection().session_id().to_string();
        info!("Property change listener subscribed on {}", subscribed);
        capacity.request_resync("listener subscribed");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let connection = capacity.connection();
            if connection.session_id() != subscribed {
                info!(
                    "Session changed from {} to {}, re-subscribing property listener",
                    subscribed,
                    connection.session_id()
                );
                subscribed = connection.session_id().to_string();
                capacity.request_resync("session changed");
            } else {
                debug!("Property listener pass on {}", subscribed);
            }
        }

        debug!("Property change listener stopped");
    }
}

#[async_trait]
impl ChangeListener for SessionChangeListener {
    async fn listen(&self, service: Service, shutdown: CancellationToken) -> Result<()> {
        self.run(service, IntervalTicker::new(self.interval), shutdown)
            .await;
        Ok(())
    }
}
