//! Execution units: one OS thread per unit, each owning its capability.

use super::capability::Capability;
use super::orchestrator::Message;
use super::panic_handler::PanicHandler;
use super::task::TaskId;
use crate::config::Config;
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, Sender};
use std::fmt;
use std::thread::{self, JoinHandle};

/// Identifier of an execution unit. Replacement units get fresh ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub(crate) u64);

impl UnitId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit-{}", self.0)
    }
}

/// One job sent to one unit.
pub(crate) struct Request<J> {
    pub(crate) task: TaskId,
    pub(crate) job: J,
}

/// Orchestrator-side handle of a running unit.
pub(crate) struct UnitHandle<J> {
    pub(crate) id: UnitId,
    requests: Sender<Request<J>>,
    thread: Option<JoinHandle<()>>,
}

impl<J> UnitHandle<J> {
    pub(crate) fn new(
        id: UnitId,
        requests: Sender<Request<J>>,
        thread: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            id,
            requests,
            thread,
        }
    }

    /// Hand a request to the unit, giving it back if the unit is gone.
    pub(crate) fn send(&self, request: Request<J>) -> std::result::Result<(), Request<J>> {
        self.requests.send(request).map_err(|err| err.into_inner())
    }

    /// Close the request channel and wait for the thread to exit.
    ///
    /// A unit that is mid-job finishes that job first.
    pub(crate) fn retire(self) {
        let UnitHandle {
            id,
            requests,
            thread,
        } = self;
        drop(requests);

        if let Some(thread) = thread {
            if thread.join().is_err() {
                tracing::warn!(unit = %id, "unit thread exited with a panic");
            }
        }
    }
}

/// Starts execution units.
///
/// The orchestrator only ever talks to units through this seam, which lets
/// tests drive it without real threads.
pub(crate) trait Launch<C: Capability>: Send + 'static {
    fn launch(&mut self, unit: UnitId, events: Sender<Message<C>>) -> Result<UnitHandle<C::Job>>;
}

/// Launches each unit on its own OS thread with a capability built by `factory`.
pub(crate) struct ThreadLauncher<F> {
    factory: F,
    thread_name_prefix: String,
    stack_size: Option<usize>,
    pin_units: bool,
    panics: PanicHandler,
}

impl<F> ThreadLauncher<F> {
    pub(crate) fn new(config: &Config, factory: F, panics: PanicHandler) -> Self {
        Self {
            factory,
            thread_name_prefix: config.thread_name_prefix.clone(),
            stack_size: config.stack_size,
            pin_units: config.pin_units,
            panics,
        }
    }
}

impl<C, F> Launch<C> for ThreadLauncher<F>
where
    C: Capability,
    F: FnMut(UnitId) -> std::result::Result<C, String> + Send + 'static,
{
    fn launch(&mut self, unit: UnitId, events: Sender<Message<C>>) -> Result<UnitHandle<C::Job>> {
        let capability = (self.factory)(unit).map_err(Error::spawn)?;

        // A unit holds at most one request, so the channel never fills.
        let (requests, inbox) = crossbeam_channel::bounded(1);

        let mut builder =
            thread::Builder::new().name(format!("{}-{}", self.thread_name_prefix, unit.0));

        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }

        let pin_units = self.pin_units;
        let panics = self.panics.clone();
        let thread = builder
            .spawn(move || {
                #[cfg(target_os = "linux")]
                if pin_units {
                    pin_thread_to_core(unit, unit.0 as usize % num_cpus::get());
                }
                #[cfg(not(target_os = "linux"))]
                let _ = pin_units;

                run(unit, capability, inbox, events, panics);
            })
            .map_err(|e| Error::spawn(format!("thread spawn failed: {}", e)))?;

        Ok(UnitHandle::new(unit, requests, Some(thread)))
    }
}

/// Unit thread body. Answers one request at a time and exits after a
/// panic or once its request channel closes.
fn run<C: Capability>(
    unit: UnitId,
    mut capability: C,
    inbox: Receiver<Request<C::Job>>,
    events: Sender<Message<C>>,
    panics: PanicHandler,
) {
    tracing::debug!(%unit, "execution unit started");

    while let Ok(Request { task, job }) = inbox.recv() {
        match panics.execute(unit, || capability.run(job)) {
            Ok(outcome) => {
                if events
                    .send(Message::Completed {
                        unit,
                        task,
                        outcome,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Err(info) => {
                let _ = events.send(Message::Faulted {
                    unit,
                    reason: info.to_string(),
                });
                return;
            }
        }
    }

    tracing::debug!(%unit, "execution unit stopped");
}

#[cfg(target_os = "linux")]
fn pin_thread_to_core(unit: UnitId, core_id: usize) {
    // SAFETY: cpu_set_t is plain data and is fully initialised before the call.
    unsafe {
        let mut cpuset: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core_id, &mut cpuset);
        let result = libc::sched_setaffinity(
            0, // current thread
            std::mem::size_of::<libc::cpu_set_t>(),
            &cpuset,
        );
        if result != 0 {
            tracing::warn!(%unit, core_id, "failed to pin unit thread to core");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::capability::Job;
    use crate::executor::panic_handler::PanicStrategy;
    use std::time::Duration;

    enum Op {
        Double(u32),
        Reject,
        Crash,
    }

    impl Job for Op {
        fn kind(&self) -> &'static str {
            match self {
                Op::Double(_) => "double",
                Op::Reject => "reject",
                Op::Crash => "crash",
            }
        }
    }

    struct Doubler;

    impl Capability for Doubler {
        type Job = Op;
        type Output = u32;

        fn run(&mut self, job: Op) -> std::result::Result<u32, String> {
            match job {
                Op::Double(x) => Ok(x * 2),
                Op::Reject => Err("rejected".to_string()),
                Op::Crash => panic!("crashed"),
            }
        }
    }

    fn launcher() -> ThreadLauncher<impl FnMut(UnitId) -> std::result::Result<Doubler, String>> {
        let config = Config::builder().thread_name_prefix("unit-test").build().unwrap();
        ThreadLauncher::new(
            &config,
            |_: UnitId| -> std::result::Result<Doubler, String> { Ok(Doubler) },
            PanicHandler::new(PanicStrategy::Replace),
        )
    }

    fn next(events: &Receiver<Message<Doubler>>) -> Message<Doubler> {
        events.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_unit_round_trips_task_id() {
        let (events_tx, events) = crossbeam_channel::unbounded();
        let handle = launcher().launch(UnitId(3), events_tx).unwrap();

        assert!(handle
            .send(Request {
                task: TaskId(41),
                job: Op::Double(21),
            })
            .is_ok());

        match next(&events) {
            Message::Completed {
                unit,
                task,
                outcome,
            } => {
                assert_eq!(unit, UnitId(3));
                assert_eq!(task, TaskId(41));
                assert_eq!(outcome, Ok(42));
            }
            _ => panic!("expected a completion"),
        }

        handle.retire();
    }

    #[test]
    fn test_task_error_keeps_unit_alive() {
        let (events_tx, events) = crossbeam_channel::unbounded();
        let handle = launcher().launch(UnitId(1), events_tx).unwrap();

        assert!(handle
            .send(Request {
                task: TaskId(1),
                job: Op::Reject,
            })
            .is_ok());
        assert!(matches!(
            next(&events),
            Message::Completed { outcome: Err(ref e), .. } if e == "rejected"
        ));

        assert!(handle
            .send(Request {
                task: TaskId(2),
                job: Op::Double(5),
            })
            .is_ok());
        assert!(matches!(
            next(&events),
            Message::Completed { outcome: Ok(10), .. }
        ));

        handle.retire();
    }

    #[test]
    fn test_panic_reports_fault_and_exits() {
        let (events_tx, events) = crossbeam_channel::unbounded();
        let handle = launcher().launch(UnitId(7), events_tx).unwrap();

        assert!(handle
            .send(Request {
                task: TaskId(1),
                job: Op::Crash,
            })
            .is_ok());
        match next(&events) {
            Message::Faulted { unit, reason } => {
                assert_eq!(unit, UnitId(7));
                assert!(reason.contains("crashed"));
            }
            _ => panic!("expected a fault"),
        }

        handle.retire();
    }

    #[test]
    fn test_factory_failure_is_spawn_error() {
        let config = Config::default();
        let mut launcher = ThreadLauncher::new(
            &config,
            |_: UnitId| -> std::result::Result<Doubler, String> {
                Err("no gpu context".to_string())
            },
            PanicHandler::default(),
        );
        let (events_tx, _events) = crossbeam_channel::unbounded();

        match launcher.launch(UnitId(1), events_tx) {
            Err(Error::Spawn(msg)) => assert_eq!(msg, "no gpu context"),
            _ => panic!("expected a spawn failure"),
        }
    }
}
