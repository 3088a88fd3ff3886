//! Single owner of the queue and of unit availability.
//!
//! Everything that changes pool state arrives as a [`Message`] and is handled
//! to completion before the next one is looked at, so no lock guards the
//! queue, the idle set or the in-flight map.

use super::capability::Capability;
use super::pool::PoolStats;
use super::task::{Envelope, Reply, TaskId};
use super::unit::{Launch, Request, UnitHandle, UnitId};
use crate::error::{Error, Result};
use crate::telemetry::Metrics;
use crossbeam_channel::{Receiver, Sender};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

pub(crate) enum Message<C: Capability> {
    /// `kind` is read on the submitting thread so no user code runs here.
    Submit {
        job: C::Job,
        kind: &'static str,
        reply: Reply<C::Output>,
    },
    Completed {
        unit: UnitId,
        task: TaskId,
        outcome: std::result::Result<C::Output, String>,
    },
    Faulted {
        unit: UnitId,
        reason: String,
    },
    Stats(Sender<PoolStats>),
    Shutdown,
}

struct InFlight<O> {
    unit: UnitId,
    kind: &'static str,
    reply: Reply<O>,
    submitted: Instant,
}

pub(crate) struct Orchestrator<C: Capability, L> {
    launcher: L,
    events: Sender<Message<C>>,
    next_unit: u64,
    next_task: u64,
    units: HashMap<UnitId, UnitHandle<C::Job>>,
    idle: BTreeSet<UnitId>,
    queue: VecDeque<Envelope<C::Job, C::Output>>,
    in_flight: HashMap<TaskId, InFlight<C::Output>>,
    metrics: Arc<Metrics>,
}

impl<C, L> Orchestrator<C, L>
where
    C: Capability,
    L: Launch<C>,
{
    /// Starts `units` execution units. Units that fail to start are skipped.
    pub(crate) fn new(
        launcher: L,
        events: Sender<Message<C>>,
        units: usize,
        metrics: Arc<Metrics>,
    ) -> Self {
        let mut orchestrator = Self {
            launcher,
            events,
            next_unit: 0,
            next_task: 0,
            units: HashMap::with_capacity(units),
            idle: BTreeSet::new(),
            queue: VecDeque::new(),
            in_flight: HashMap::new(),
            metrics,
        };

        for _ in 0..units {
            orchestrator.spawn_unit();
        }

        if orchestrator.units.len() < units {
            tracing::warn!(
                requested = units,
                started = orchestrator.units.len(),
                "pool starting at reduced capacity"
            );
        }

        orchestrator
    }

    pub(crate) fn capacity(&self) -> usize {
        self.units.len()
    }

    pub(crate) fn stats(&self) -> PoolStats {
        PoolStats {
            total_capacity: self.units.len(),
            idle_count: self.idle.len(),
            in_flight_count: self.in_flight.len(),
            queued_count: self.queue.len(),
        }
    }

    /// Event loop. Returns once a shutdown message has been handled.
    pub(crate) fn run(mut self, inbox: Receiver<Message<C>>) {
        while let Ok(message) = inbox.recv() {
            if let Message::Shutdown = message {
                break;
            }
            self.handle(message);
        }

        self.shutdown();
    }

    pub(crate) fn handle(&mut self, message: Message<C>) {
        match message {
            Message::Submit { job, kind, reply } => self.submit(job, kind, reply),
            Message::Completed {
                unit,
                task,
                outcome,
            } => self.complete(unit, task, outcome),
            Message::Faulted { unit, reason } => self.fault(unit, reason),
            Message::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
            Message::Shutdown => self.shutdown(),
        }
    }

    fn submit(&mut self, job: C::Job, kind: &'static str, reply: Reply<C::Output>) {
        self.metrics.record_task_submitted();

        if self.units.is_empty() {
            self.metrics.record_task_rejected();
            let _ = reply.send(Err(Error::NoUnits));
            return;
        }

        let id = TaskId(self.next_task);
        self.next_task += 1;

        tracing::trace!(task = %id, kind, "task queued");
        self.queue.push_back(Envelope {
            id,
            job,
            kind,
            reply,
            submitted: Instant::now(),
        });

        self.dispatch();
    }

    /// FIFO drain: pair the oldest queued task with an idle unit until one
    /// side runs out.
    fn dispatch(&mut self) {
        while !self.queue.is_empty() {
            let Some(unit) = self.idle.pop_first() else {
                break;
            };
            let Some(Envelope {
                id,
                job,
                kind,
                reply,
                submitted,
            }) = self.queue.pop_front()
            else {
                self.idle.insert(unit);
                break;
            };

            let Some(handle) = self.units.get(&unit) else {
                tracing::warn!(%unit, "idle set referenced an unknown unit, dropping it");
                self.queue.push_front(Envelope {
                    id,
                    job,
                    kind,
                    reply,
                    submitted,
                });
                continue;
            };

            match handle.send(Request { task: id, job }) {
                Ok(()) => {
                    tracing::debug!(task = %id, %unit, kind, "task dispatched");
                    self.in_flight.insert(
                        id,
                        InFlight {
                            unit,
                            kind,
                            reply,
                            submitted,
                        },
                    );
                }
                Err(Request { job, .. }) => {
                    // The unit went away without reporting a fault. Keep the
                    // task at the head and recover as for any other fault.
                    self.queue.push_front(Envelope {
                        id,
                        job,
                        kind,
                        reply,
                        submitted,
                    });
                    self.fault(unit, "request channel disconnected".to_string());
                    return;
                }
            }
        }
    }

    fn complete(
        &mut self,
        unit: UnitId,
        task: TaskId,
        outcome: std::result::Result<C::Output, String>,
    ) {
        match self.in_flight.remove(&task) {
            Some(entry) if entry.unit == unit => {
                self.idle.insert(unit);
                self.settle(task, entry, outcome.map_err(Error::TaskFailed));
            }
            Some(entry) => {
                tracing::warn!(
                    %task,
                    expected = %entry.unit,
                    actual = %unit,
                    "response came from the wrong unit, discarding"
                );
                self.metrics.record_routing_anomaly();
                self.in_flight.insert(task, entry);
                self.release_if_untracked(unit);
            }
            None => {
                tracing::warn!(%task, %unit, "response for untracked task, discarding");
                self.metrics.record_routing_anomaly();
                self.release_if_untracked(unit);
            }
        }

        self.dispatch();
    }

    /// A unit that answered for a task nobody tracks is done with it. This is
    /// the normal path for units still busy when a fault cleared the
    /// in-flight map.
    fn release_if_untracked(&mut self, unit: UnitId) {
        if self.units.contains_key(&unit) && !self.in_flight.values().any(|e| e.unit == unit) {
            self.idle.insert(unit);
        }
    }

    fn fault(&mut self, unit: UnitId, reason: String) {
        let Some(handle) = self.units.remove(&unit) else {
            tracing::warn!(%unit, %reason, "fault reported by unknown unit, ignoring");
            return;
        };
        self.idle.remove(&unit);
        self.metrics.record_unit_fault();

        tracing::error!(
            %unit,
            %reason,
            in_flight = self.in_flight.len(),
            "execution unit faulted, failing every in-flight task"
        );
        handle.retire();

        let mut failed: Vec<_> = self.in_flight.drain().collect();
        failed.sort_by_key(|(task, _)| *task);
        for (task, entry) in failed {
            let err = Error::UnitFault {
                unit,
                reason: reason.clone(),
            };
            self.settle(task, entry, Err(err));
        }

        if !self.spawn_unit() && self.units.is_empty() {
            self.reject_queued();
        }

        self.dispatch();
    }

    fn settle(&self, task: TaskId, entry: InFlight<C::Output>, result: Result<C::Output>) {
        let latency_ns = entry.submitted.elapsed().as_nanos() as u64;

        match &result {
            Ok(_) => {
                self.metrics.record_task_completed(latency_ns);
                tracing::debug!(%task, unit = %entry.unit, kind = entry.kind, "task completed");
            }
            Err(err) if err.is_unit_fault() => {
                self.metrics.record_task_faulted(latency_ns);
                tracing::debug!(%task, unit = %entry.unit, kind = entry.kind, "task lost to unit fault");
            }
            Err(err) => {
                self.metrics.record_task_failed(latency_ns);
                tracing::debug!(%task, unit = %entry.unit, kind = entry.kind, error = %err, "task failed");
            }
        }

        // The caller may have dropped its handle; nothing to do then.
        let _ = entry.reply.send(result);
    }

    fn spawn_unit(&mut self) -> bool {
        let unit = UnitId(self.next_unit);
        self.next_unit += 1;

        match self.launcher.launch(unit, self.events.clone()) {
            Ok(handle) => {
                self.units.insert(handle.id, handle);
                self.idle.insert(unit);
                self.metrics.record_unit_spawned();
                tracing::debug!(%unit, "execution unit spawned");
                true
            }
            Err(err) => {
                self.metrics.record_spawn_failure();
                tracing::warn!(%unit, error = %err, "could not spawn execution unit, capacity reduced");
                false
            }
        }
    }

    /// Fails all queued work once no unit is left to run it.
    fn reject_queued(&mut self) {
        tracing::error!(
            queued = self.queue.len(),
            "no execution units left, rejecting queued tasks"
        );

        for envelope in self.queue.drain(..) {
            self.metrics.record_task_rejected();
            let _ = envelope.reply.send(Err(Error::NoUnits));
        }
    }

    /// Stops every unit. Queued and in-flight tasks are dropped unsettled.
    fn shutdown(&mut self) {
        tracing::info!(
            units = self.units.len(),
            queued = self.queue.len(),
            in_flight = self.in_flight.len(),
            "shutting down pool"
        );

        self.queue.clear();
        self.in_flight.clear();
        self.idle.clear();

        let mut units: Vec<_> = self.units.drain().map(|(_, handle)| handle).collect();
        units.sort_by_key(|handle| handle.id);
        for handle in units {
            handle.retire();
        }
    }
}
