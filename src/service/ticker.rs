//! Tickers pacing the service's polling loops

use crate::config::MAX_INTERVAL_SECS;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Wait between two polls of a background loop
#[async_trait]
pub trait Ticker: Send {
    async fn tick(&mut self);
}

/// Fixed-interval ticker. The first tick completes one full period after
/// creation, so a loop polling before each tick checks immediately. The
/// period is clamped to between 1ms and [`MAX_INTERVAL_SECS`].
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let period = period.clamp(
            Duration::from_millis(1),
            Duration::from_secs(MAX_INTERVAL_SECS),
        );
        let now = Instant::now();
        let start = now.checked_add(period).unwrap_or(now);
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}
