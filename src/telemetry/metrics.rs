//! Metrics collection for pool monitoring.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use hdrhistogram::Histogram;
use parking_lot::RwLock;

use super::snapshot::MetricsSnapshot;

/// Pool metrics collector, written by the orchestrator and read by anyone
#[derive(Debug)]
pub struct Metrics {
    // Task outcomes
    tasks_submitted: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_failed: AtomicU64,
    tasks_faulted: AtomicU64,
    tasks_rejected: AtomicU64,

    // Unit lifecycle
    units_spawned: AtomicU64,
    spawn_failures: AtomicU64,
    unit_faults: AtomicU64,

    routing_anomalies: AtomicU64,

    // Submission to settlement, in nanoseconds
    latency_histogram: RwLock<Histogram<u64>>,

    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        // 3 significant figures, max value of 1 hour in nanoseconds
        let histogram = Histogram::new_with_max(3_600_000_000_000, 3)
            .expect("histogram bounds are valid");

        Self {
            tasks_submitted: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            tasks_failed: AtomicU64::new(0),
            tasks_faulted: AtomicU64::new(0),
            tasks_rejected: AtomicU64::new(0),
            units_spawned: AtomicU64::new(0),
            spawn_failures: AtomicU64::new(0),
            unit_faults: AtomicU64::new(0),
            routing_anomalies: AtomicU64::new(0),
            latency_histogram: RwLock::new(histogram),
            start_time: Instant::now(),
        }
    }

    pub fn record_task_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a task that settled successfully
    pub fn record_task_completed(&self, latency_ns: u64) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency_ns);
    }

    /// Record a task the capability reported an error for
    pub fn record_task_failed(&self, latency_ns: u64) {
        self.tasks_failed.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency_ns);
    }

    /// Record a task rejected because a unit faulted
    pub fn record_task_faulted(&self, latency_ns: u64) {
        self.tasks_faulted.fetch_add(1, Ordering::Relaxed);
        self.record_latency(latency_ns);
    }

    /// Record a task rejected for lack of units
    pub fn record_task_rejected(&self) {
        self.tasks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unit_spawned(&self) {
        self.units_spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_spawn_failure(&self) {
        self.spawn_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unit_fault(&self) {
        self.unit_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_routing_anomaly(&self) {
        self.routing_anomalies.fetch_add(1, Ordering::Relaxed);
    }

    fn record_latency(&self, latency_ns: u64) {
        let mut hist = self.latency_histogram.write();
        let _ = hist.record(latency_ns);
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let histogram = self.latency_histogram.read();

        MetricsSnapshot {
            timestamp: Instant::now(),
            uptime: self.start_time.elapsed(),
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            tasks_faulted: self.tasks_faulted.load(Ordering::Relaxed),
            tasks_rejected: self.tasks_rejected.load(Ordering::Relaxed),
            units_spawned: self.units_spawned.load(Ordering::Relaxed),
            spawn_failures: self.spawn_failures.load(Ordering::Relaxed),
            unit_faults: self.unit_faults.load(Ordering::Relaxed),
            routing_anomalies: self.routing_anomalies.load(Ordering::Relaxed),
            avg_latency_ns: if histogram.len() > 0 {
                histogram.mean() as u64
            } else {
                0
            },
            p50_latency_ns: histogram.value_at_quantile(0.50),
            p95_latency_ns: histogram.value_at_quantile(0.95),
            p99_latency_ns: histogram.value_at_quantile(0.99),
            max_latency_ns: histogram.max(),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.tasks_submitted.store(0, Ordering::Relaxed);
        self.tasks_completed.store(0, Ordering::Relaxed);
        self.tasks_failed.store(0, Ordering::Relaxed);
        self.tasks_faulted.store(0, Ordering::Relaxed);
        self.tasks_rejected.store(0, Ordering::Relaxed);
        self.units_spawned.store(0, Ordering::Relaxed);
        self.spawn_failures.store(0, Ordering::Relaxed);
        self.unit_faults.store(0, Ordering::Relaxed);
        self.routing_anomalies.store(0, Ordering::Relaxed);
        self.latency_histogram.write().reset();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
