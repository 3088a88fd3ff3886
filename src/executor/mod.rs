//! Task execution infrastructure.
//!
//! This module provides the execution units, the orchestrator that owns the
//! task queue, and the [`Pool`] handle callers submit work through.

pub mod capability;
pub mod panic_handler;
pub mod pool;
pub mod task;
pub mod unit;

pub(crate) mod orchestrator;

pub use capability::{Capability, Job};
pub use panic_handler::{PanicHandler, PanicInfo, PanicStrategy};
pub use pool::{Pool, PoolStats};
pub use task::{Pending, PendingBatch, TaskId};
pub use unit::UnitId;
