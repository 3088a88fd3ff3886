//! kiln - bounded-concurrency task dispatcher
//!
//! A fixed pool of isolated execution units runs CPU-bound jobs submitted by
//! the application. Submitting never blocks: every job comes back as a
//! [`Pending`] handle that settles exactly once, either with the job's output
//! or with an [`Error`].
//!
//! # Quick Start
//!
//! ```no_run
//! use kiln::prelude::*;
//!
//! enum ImageJob {
//!     Histogram(Vec<u8>),
//! }
//!
//! impl Job for ImageJob {
//!     fn kind(&self) -> &'static str {
//!         "histogram"
//!     }
//! }
//!
//! struct Imaging;
//!
//! impl Capability for Imaging {
//!     type Job = ImageJob;
//!     type Output = [u32; 256];
//!
//!     fn run(&mut self, job: ImageJob) -> std::result::Result<[u32; 256], String> {
//!         let ImageJob::Histogram(pixels) = job;
//!         let mut bins = [0u32; 256];
//!         for p in pixels {
//!             bins[p as usize] += 1;
//!         }
//!         Ok(bins)
//!     }
//! }
//!
//! let pool = Pool::new(|_| Ok(Imaging)).unwrap();
//! let bins = pool.submit(ImageJob::Histogram(vec![0, 0, 255])).wait().unwrap();
//! assert_eq!(bins[0], 2);
//! pool.shutdown();
//! ```
//!
//! # Behaviour
//!
//! - **FIFO dispatch**: queued jobs are handed to units in submission order;
//!   completion order follows each unit's latency.
//! - **Task errors** (`Err` from [`Capability::run`]) reject only that task.
//! - **Unit faults** (a panic inside a unit) reject every task in flight
//!   across the pool, then the unit is replaced and the queue keeps draining.
//! - **Telemetry**: counters and a latency histogram (feature `telemetry`).

#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod telemetry;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use error::{Error, Result};
pub use executor::{
    Capability, Job, PanicStrategy, Pending, PendingBatch, Pool, PoolStats, TaskId, UnitId,
};

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    struct Text(&'static str);

    impl Job for Text {
        fn kind(&self) -> &'static str {
            "upper"
        }
    }

    impl Capability for Upper {
        type Job = Text;
        type Output = String;

        fn run(&mut self, job: Text) -> std::result::Result<String, String> {
            Ok(job.0.to_uppercase())
        }
    }

    #[test]
    fn test_basic_submit() {
        let config = Config::builder().num_units(2).build().unwrap();
        let pool = Pool::with_config(config, |_| Ok(Upper)).unwrap();

        assert_eq!(pool.submit(Text("pack.png")).wait().unwrap(), "PACK.PNG");

        pool.shutdown();
    }

    #[test]
    fn test_batch_submit() {
        let pool = Pool::new(|_| Ok(Upper)).unwrap();

        let out = pool
            .submit_batch(vec![Text("a"), Text("b"), Text("c")])
            .wait()
            .unwrap();
        assert_eq!(out, vec!["A", "B", "C"]);

        pool.shutdown();
    }

    #[test]
    fn test_metrics_surface_in_every_build() {
        let pool = Pool::new(|_| Ok(Upper)).unwrap();
        pool.submit(Text("a")).wait().unwrap();

        let metrics = pool.metrics();
        let settled = metrics.tasks_settled();
        assert!(settled <= 1);
        assert_eq!(settled, metrics.tasks_completed);
        assert!(metrics.success_rate() == 0.0 || metrics.success_rate() == 1.0);
        assert!(metrics.tasks_per_second() >= 0.0);
        assert!(metrics.p95_latency_ns <= metrics.max_latency_ns);
        assert!(metrics.uptime < std::time::Duration::from_secs(60));

        pool.shutdown();
    }

    #[test]
    fn test_submit_after_shutdown() {
        let pool = Pool::new(|_| Ok(Upper)).unwrap();
        pool.shutdown();
        pool.shutdown();

        assert!(pool.is_shut_down());
        assert!(matches!(pool.submit(Text("x")).wait(), Err(Error::ShutDown)));
        assert_eq!(pool.stats(), PoolStats::default());
    }
}
