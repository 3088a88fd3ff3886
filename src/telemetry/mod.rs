//! Telemetry and observability subsystem.
//!
//! Counts task outcomes and unit lifecycle events, keeps a latency histogram,
//! and exports snapshots as JSON or as `tracing` events.

pub mod snapshot;

#[cfg(feature = "telemetry")]
pub mod metrics;

#[cfg(feature = "telemetry")]
pub mod export;

pub use snapshot::MetricsSnapshot;

#[cfg(feature = "telemetry")]
pub use metrics::Metrics;

#[cfg(feature = "telemetry")]
pub use export::{JsonExporter, LogExporter, MetricsExporter};

// No-op implementations when telemetry is disabled
#[cfg(not(feature = "telemetry"))]
pub mod metrics {
    use super::snapshot::MetricsSnapshot;

    #[derive(Debug, Clone, Default)]
    pub struct Metrics;

    impl Metrics {
        pub fn new() -> Self { Self }
        pub fn record_task_submitted(&self) {}
        pub fn record_task_completed(&self, _: u64) {}
        pub fn record_task_failed(&self, _: u64) {}
        pub fn record_task_faulted(&self, _: u64) {}
        pub fn record_task_rejected(&self) {}
        pub fn record_unit_spawned(&self) {}
        pub fn record_spawn_failure(&self) {}
        pub fn record_unit_fault(&self) {}
        pub fn record_routing_anomaly(&self) {}
        pub fn snapshot(&self) -> MetricsSnapshot { MetricsSnapshot::empty() }
        pub fn reset(&self) {}
    }
}

#[cfg(not(feature = "telemetry"))]
pub use metrics::Metrics;
