//! Metrics export functionality for various formats.

use super::snapshot::MetricsSnapshot;
use crate::error::Result;

/// Trait for exporting metrics to different formats
pub trait MetricsExporter: Send + Sync {
    /// Export a metrics snapshot
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()>;
}

/// Export metrics to a JSON file
#[derive(Debug)]
pub struct JsonExporter {
    output_path: std::path::PathBuf,
}

impl JsonExporter {
    /// Create a new JSON exporter
    pub fn new(output_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }
}

impl MetricsExporter for JsonExporter {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let serializable = SerializableSnapshot::from(snapshot);
        let json = serde_json::to_string_pretty(&serializable).map_err(|e| {
            crate::error::Error::telemetry(format!("JSON serialization failed: {}", e))
        })?;

        std::fs::write(&self.output_path, json)?;

        Ok(())
    }
}

/// Serializable version of MetricsSnapshot
#[derive(Debug, Clone, serde::Serialize)]
struct SerializableSnapshot {
    uptime_secs: f64,
    tasks_submitted: u64,
    tasks_completed: u64,
    tasks_failed: u64,
    tasks_faulted: u64,
    tasks_rejected: u64,
    units_spawned: u64,
    spawn_failures: u64,
    unit_faults: u64,
    routing_anomalies: u64,
    avg_latency_us: f64,
    p50_latency_us: f64,
    p95_latency_us: f64,
    p99_latency_us: f64,
    max_latency_us: f64,
    success_rate: f64,
    tasks_per_second: f64,
}

impl From<&MetricsSnapshot> for SerializableSnapshot {
    fn from(snapshot: &MetricsSnapshot) -> Self {
        Self {
            uptime_secs: snapshot.uptime.as_secs_f64(),
            tasks_submitted: snapshot.tasks_submitted,
            tasks_completed: snapshot.tasks_completed,
            tasks_failed: snapshot.tasks_failed,
            tasks_faulted: snapshot.tasks_faulted,
            tasks_rejected: snapshot.tasks_rejected,
            units_spawned: snapshot.units_spawned,
            spawn_failures: snapshot.spawn_failures,
            unit_faults: snapshot.unit_faults,
            routing_anomalies: snapshot.routing_anomalies,
            avg_latency_us: snapshot.avg_latency_ns as f64 / 1_000.0,
            p50_latency_us: snapshot.p50_latency_ns as f64 / 1_000.0,
            p95_latency_us: snapshot.p95_latency_ns as f64 / 1_000.0,
            p99_latency_us: snapshot.p99_latency_ns as f64 / 1_000.0,
            max_latency_us: snapshot.max_latency_ns as f64 / 1_000.0,
            success_rate: snapshot.success_rate(),
            tasks_per_second: snapshot.tasks_per_second(),
        }
    }
}

/// Emit metrics as a structured `tracing` event
#[derive(Debug, Default)]
pub struct LogExporter {
    verbose: bool,
}

impl LogExporter {
    /// Create a new log exporter
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl MetricsExporter for LogExporter {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        tracing::info!(
            uptime_secs = snapshot.uptime.as_secs_f64(),
            submitted = snapshot.tasks_submitted,
            completed = snapshot.tasks_completed,
            failed = snapshot.tasks_failed,
            faulted = snapshot.tasks_faulted,
            rejected = snapshot.tasks_rejected,
            unit_faults = snapshot.unit_faults,
            "pool metrics"
        );

        if self.verbose {
            tracing::info!(
                units_spawned = snapshot.units_spawned,
                spawn_failures = snapshot.spawn_failures,
                routing_anomalies = snapshot.routing_anomalies,
                avg_us = snapshot.avg_latency_ns as f64 / 1_000.0,
                p50_us = snapshot.p50_latency_ns as f64 / 1_000.0,
                p95_us = snapshot.p95_latency_ns as f64 / 1_000.0,
                p99_us = snapshot.p99_latency_ns as f64 / 1_000.0,
                max_us = snapshot.max_latency_ns as f64 / 1_000.0,
                "pool latency"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn dummy_snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Instant::now(),
            uptime: std::time::Duration::from_secs(10),
            tasks_submitted: 1000,
            tasks_completed: 990,
            tasks_failed: 7,
            tasks_faulted: 3,
            tasks_rejected: 0,
            units_spawned: 5,
            spawn_failures: 0,
            unit_faults: 1,
            routing_anomalies: 2,
            avg_latency_ns: 1000,
            p50_latency_ns: 900,
            p95_latency_ns: 1500,
            p99_latency_ns: 2000,
            max_latency_ns: 5000,
        }
    }

    #[test]
    fn test_log_exporter() {
        let exporter = LogExporter::new(true);
        assert!(exporter.export(&dummy_snapshot()).is_ok());
    }

    #[test]
    fn test_json_exporter() {
        use std::env::temp_dir;

        let path = temp_dir().join(format!("kiln_metrics_{}.json", std::process::id()));
        let exporter = JsonExporter::new(&path);

        assert!(exporter.export(&dummy_snapshot()).is_ok());

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["tasks_completed"], 990);
        assert_eq!(written["unit_faults"], 1);
        assert_eq!(written["tasks_per_second"], 100.0);

        let _ = std::fs::remove_file(&path);
    }
}
