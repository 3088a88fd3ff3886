pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{
    Capability, Job, PanicStrategy, Pending, PendingBatch, Pool, PoolStats, TaskId, UnitId,
};

pub use crate::telemetry::{Metrics, MetricsSnapshot};

#[cfg(feature = "telemetry")]
pub use crate::telemetry::{JsonExporter, LogExporter, MetricsExporter};
