use super::capability::{Capability, Job};
use super::orchestrator::{Message, Orchestrator};
use super::panic_handler::PanicHandler;
use super::task::{Pending, PendingBatch};
use super::unit::{ThreadLauncher, UnitId};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::telemetry::{Metrics, MetricsSnapshot};
use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Point-in-time view of pool occupancy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Units currently alive, idle or busy.
    pub total_capacity: usize,
    pub idle_count: usize,
    pub in_flight_count: usize,
    pub queued_count: usize,
}

/// Fixed-size pool of execution units fed by a single orchestrator thread.
///
/// Build one per application and hand out references; every method takes
/// `&self` and none of them waits for a task to run.
pub struct Pool<C: Capability> {
    sender: Sender<Message<C>>,
    // Held for reading while a submission is sent, so nothing lands behind
    // the shutdown message.
    closed: RwLock<bool>,
    orchestrator: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<Metrics>,
    panics: PanicHandler,
    config: Config,
}

impl<C: Capability> Pool<C> {
    /// Pool with the default configuration.
    ///
    /// `factory` is called once per unit, including replacements spawned after
    /// a fault, and builds the capability that unit will own.
    pub fn new<F>(factory: F) -> Result<Self>
    where
        F: FnMut(UnitId) -> std::result::Result<C, String> + Send + 'static,
    {
        Self::with_config(Config::default(), factory)
    }

    pub fn with_config<F>(config: Config, factory: F) -> Result<Self>
    where
        F: FnMut(UnitId) -> std::result::Result<C, String> + Send + 'static,
    {
        config.validate()?;

        let metrics = Arc::new(Metrics::new());
        let panics = PanicHandler::new(config.panic_strategy);
        let launcher = ThreadLauncher::new(&config, factory, panics.clone());
        let (sender, inbox) = crossbeam_channel::unbounded();

        let orchestrator =
            Orchestrator::new(launcher, sender.clone(), config.units(), metrics.clone());
        if orchestrator.capacity() == 0 {
            return Err(Error::NoUnits);
        }

        tracing::info!(
            units = orchestrator.capacity(),
            prefix = %config.thread_name_prefix,
            "pool started"
        );

        let thread = thread::Builder::new()
            .name(format!("{}-orchestrator", config.thread_name_prefix))
            .spawn(move || orchestrator.run(inbox))
            .map_err(|e| Error::spawn(format!("orchestrator spawn failed: {}", e)))?;

        Ok(Self {
            sender,
            closed: RwLock::new(false),
            orchestrator: Mutex::new(Some(thread)),
            metrics,
            panics,
            config,
        })
    }

    /// Queue `job` and return a handle to its eventual result.
    ///
    /// Jobs are dispatched in submission order; they may complete in any order.
    /// Once [`Pool::shutdown`] has started, the handle settles with
    /// [`Error::ShutDown`].
    pub fn submit(&self, job: C::Job) -> Pending<C::Output> {
        let kind = job.kind();
        let closed = self.closed.read();
        if *closed {
            return Pending::settled(Err(Error::ShutDown));
        }

        let (reply, pending) = Pending::channel();
        match self.sender.send(Message::Submit { job, kind, reply }) {
            Ok(()) => pending,
            Err(_) => Pending::settled(Err(Error::ShutDown)),
        }
    }

    /// Submit every job and combine the results in input order.
    pub fn submit_batch<I>(&self, jobs: I) -> PendingBatch<C::Output>
    where
        I: IntoIterator<Item = C::Job>,
    {
        let members = jobs.into_iter().map(|job| self.submit(job)).collect();
        PendingBatch::new(members)
    }

    /// Occupancy as seen by the orchestrator after every earlier call on this
    /// pool has been handled. All zeros once the pool is shut down.
    pub fn stats(&self) -> PoolStats {
        let (reply, answer) = crossbeam_channel::bounded(1);
        if self.sender.send(Message::Stats(reply)).is_err() {
            return PoolStats::default();
        }
        answer.recv().unwrap_or_default()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Number of capability panics caught since the pool started.
    pub fn panic_count(&self) -> usize {
        self.panics.panic_count()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        *self.closed.read()
    }

    /// Stop every unit and the orchestrator.
    ///
    /// Tasks still queued or running are not settled; their handles report
    /// [`Error::Abandoned`]. Units that are mid-job finish that job before
    /// their thread exits. Calling this twice is harmless.
    pub fn shutdown(&self) {
        let Some(thread) = self.orchestrator.lock().take() else {
            return;
        };

        {
            let mut closed = self.closed.write();
            *closed = true;
            let _ = self.sender.send(Message::Shutdown);
        }
        if thread.join().is_err() {
            tracing::error!("orchestrator thread panicked");
        }
    }
}

impl<C: Capability> fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("config", &self.config)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl<C: Capability> Drop for Pool<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
