//! Service Statistics
//!
//! Counters for the background paths whose failures are only logged, so the
//! binary can expose them as metrics.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Lock-free counters updated by the service's background paths
#[derive(Debug, Default)]
pub struct ServiceStats {
    resets_applied: AtomicU64,
    resets_rejected: AtomicU64,
    reconnects: AtomicU64,
    activator_polls: AtomicU64,
    activation_failures: AtomicU64,
    decommission_active: AtomicBool,
}

impl ServiceStats {
    #[inline]
    pub fn record_reset_applied(&self) {
        self.resets_applied.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reset_rejected(&self) {
        self.resets_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_activator_poll(&self) {
        self.activator_polls.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_activation_failure(&self) {
        self.activation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_decommission_active(&self) {
        self.decommission_active.store(true, Ordering::Release);
    }

    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            resets_applied: self.resets_applied.load(Ordering::Relaxed),
            resets_rejected: self.resets_rejected.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            activator_polls: self.activator_polls.load(Ordering::Relaxed),
            activation_failures: self.activation_failures.load(Ordering::Relaxed),
            decommission_active: self.decommission_active.load(Ordering::Acquire),
        }
    }
}

/// Point-in-time copy of [`ServiceStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatsSnapshot {
    pub resets_applied: u64,
    pub resets_rejected: u64,
    pub reconnects: u64,
    pub activator_polls: u64,
    pub activation_failures: u64,
    pub decommission_active: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = ServiceStats::default();
        assert_eq!(stats.snapshot(), ServiceStatsSnapshot::default());

        stats.record_reset_applied();
        stats.record_reset_rejected();
        stats.record_reset_rejected();
        stats.record_activator_poll();
        stats.set_decommission_active();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.resets_applied, 1);
        assert_eq!(snapshot.resets_rejected, 2);
        assert_eq!(snapshot.activator_polls, 1);
        assert!(snapshot.decommission_active);
    }
}
