//! Engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Monotonic counters shared by the dispatcher, ledger and pipeline.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub events_accepted: AtomicU64,
    /// Events refused because the dispatcher queue was full.
    pub events_rejected: AtomicU64,
    pub player_tasks_completed: AtomicU64,
    /// Player tasks that returned an error or panicked.
    pub player_tasks_failed: AtomicU64,
    pub evaluation_errors: AtomicU64,
    pub unlocks: AtomicU64,
    pub notifications_created: AtomicU64,
    pub deliveries_sent: AtomicU64,
    pub deliveries_failed: AtomicU64,
}

/// Point-in-time copy of [`EngineMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_accepted: u64,
    pub events_rejected: u64,
    pub player_tasks_completed: u64,
    pub player_tasks_failed: u64,
    pub evaluation_errors: u64,
    pub unlocks: u64,
    pub notifications_created: u64,
    pub deliveries_sent: u64,
    pub deliveries_failed: u64,
}

impl EngineMetrics {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            events_accepted: load(&self.events_accepted),
            events_rejected: load(&self.events_rejected),
            player_tasks_completed: load(&self.player_tasks_completed),
            player_tasks_failed: load(&self.player_tasks_failed),
            evaluation_errors: load(&self.evaluation_errors),
            unlocks: load(&self.unlocks),
            notifications_created: load(&self.notifications_created),
            deliveries_sent: load(&self.deliveries_sent),
            deliveries_failed: load(&self.deliveries_failed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reads_counters() {
        let metrics = EngineMetrics::default();
        EngineMetrics::incr(&metrics.unlocks);
        EngineMetrics::incr(&metrics.unlocks);
        EngineMetrics::incr(&metrics.events_rejected);

        let snap = metrics.snapshot();
        assert_eq!(snap.unlocks, 2);
        assert_eq!(snap.events_rejected, 1);
        assert_eq!(snap.events_accepted, 0);
    }
}
