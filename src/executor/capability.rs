//! The work an execution unit knows how to perform.

/// A request payload understood by a [`Capability`].
///
/// Usually an enum with one variant per operation the units support, each
/// carrying its own strongly typed payload.
pub trait Job: Send + 'static {
    /// Short tag naming the operation, used in logs.
    fn kind(&self) -> &'static str;
}

/// Opaque computation hosted by every execution unit of a pool.
///
/// Each unit owns a private instance built by the pool's factory, so any state
/// kept here is never shared with the orchestrator or with other units.
///
/// Returning `Err` fails only the task that carried `job`; the unit stays
/// healthy. Panicking is treated as a fault of the whole unit.
pub trait Capability: Send + 'static {
    type Job: Job;
    type Output: Send + 'static;

    fn run(&mut self, job: Self::Job) -> Result<Self::Output, String>;
}
