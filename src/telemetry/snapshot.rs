//! Point-in-time view of pool metrics, shared by the recording and the
//! no-op builds.

use std::time::{Duration, Instant};

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub timestamp: Instant,
    pub uptime: Duration,
    pub tasks_submitted: u64,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub tasks_faulted: u64,
    pub tasks_rejected: u64,
    pub units_spawned: u64,
    pub spawn_failures: u64,
    pub unit_faults: u64,
    pub routing_anomalies: u64,
    pub avg_latency_ns: u64,
    pub p50_latency_ns: u64,
    pub p95_latency_ns: u64,
    pub p99_latency_ns: u64,
    pub max_latency_ns: u64,
}

impl MetricsSnapshot {
    /// Tasks that reached a final outcome
    pub fn tasks_settled(&self) -> u64 {
        self.tasks_completed + self.tasks_failed + self.tasks_faulted + self.tasks_rejected
    }

    /// Fraction of settled tasks that succeeded (0.0 to 1.0)
    pub fn success_rate(&self) -> f64 {
        let settled = self.tasks_settled();
        if settled == 0 {
            return 0.0;
        }
        self.tasks_completed as f64 / settled as f64
    }

    /// Settled tasks per second of uptime
    pub fn tasks_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.tasks_settled() as f64 / seconds
    }

    /// All-zero snapshot taken now.
    pub fn empty() -> Self {
        Self {
            timestamp: Instant::now(),
            uptime: Duration::ZERO,
            tasks_submitted: 0,
            tasks_completed: 0,
            tasks_failed: 0,
            tasks_faulted: 0,
            tasks_rejected: 0,
            units_spawned: 0,
            spawn_failures: 0,
            unit_faults: 0,
            routing_anomalies: 0,
            avg_latency_ns: 0,
            p50_latency_ns: 0,
            p95_latency_ns: 0,
            p99_latency_ns: 0,
            max_latency_ns: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_rates() {
        let snapshot = MetricsSnapshot::empty();
        assert_eq!(snapshot.tasks_settled(), 0);
        assert_eq!(snapshot.success_rate(), 0.0);
        assert_eq!(snapshot.tasks_per_second(), 0.0);
    }

    #[test]
    fn test_settled_counts_every_outcome() {
        let snapshot = MetricsSnapshot {
            uptime: Duration::from_secs(2),
            tasks_completed: 5,
            tasks_failed: 1,
            tasks_faulted: 1,
            tasks_rejected: 1,
            ..MetricsSnapshot::empty()
        };
        assert_eq!(snapshot.tasks_settled(), 8);
        assert_eq!(snapshot.success_rate(), 0.625);
        assert_eq!(snapshot.tasks_per_second(), 4.0);
    }
}
