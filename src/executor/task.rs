//! Task identity and the caller-side handles that observe settlement.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use futures::channel::oneshot;

use crate::error::{Error, Result};

/// Unique identifier for a submitted task. Never reused by a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) u64);

impl TaskId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Sending half of a task's continuation.
pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

/// Orchestrator-side record of a queued task.
pub(crate) struct Envelope<J, O> {
    pub(crate) id: TaskId,
    pub(crate) job: J,
    pub(crate) kind: &'static str,
    pub(crate) reply: Reply<O>,
    pub(crate) submitted: Instant,
}

impl<J, O> fmt::Debug for Envelope<J, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("submitted", &self.submitted)
            .finish()
    }
}

/// Pending result of a single submitted task.
///
/// Resolves exactly once. Await it from async code, or call [`Pending::wait`]
/// from a plain thread.
#[derive(Debug)]
pub struct Pending<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> Pending<T> {
    pub(crate) fn channel() -> (Reply<T>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    /// A handle that is already settled with `result`.
    pub(crate) fn settled(result: Result<T>) -> Self {
        let (sender, pending) = Self::channel();
        let _ = sender.send(result);
        pending
    }

    /// Block the current thread until the task settles.
    pub fn wait(self) -> Result<T> {
        futures::executor::block_on(self)
    }

    /// Take the outcome if the task has already settled.
    pub fn try_wait(&mut self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(Some(result)) => Some(result),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(Error::Abandoned)),
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            // The orchestrator dropped the continuation without settling it,
            // which only happens when the pool shuts down.
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(Error::Abandoned)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Aggregate of several pending results.
///
/// Succeeds with every output in submission order, or fails with the first
/// failure observed. Members that are still running are not cancelled.
#[derive(Debug)]
pub struct PendingBatch<T> {
    members: Vec<Option<Pending<T>>>,
    outputs: Vec<Option<T>>,
}

impl<T> PendingBatch<T> {
    pub(crate) fn new(members: Vec<Pending<T>>) -> Self {
        let outputs = members.iter().map(|_| None).collect();
        Self {
            members: members.into_iter().map(Some).collect(),
            outputs,
        }
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Block the current thread until the batch settles.
    pub fn wait(self) -> Result<Vec<T>> {
        futures::executor::block_on(self)
    }
}

// Outputs are never pinned in place.
impl<T> Unpin for PendingBatch<T> {}

impl<T> Future for PendingBatch<T> {
    type Output = Result<Vec<T>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let mut outstanding = false;
        let mut failure = None;

        for (slot, output) in this.members.iter_mut().zip(this.outputs.iter_mut()) {
            let Some(pending) = slot else { continue };
            match Pin::new(pending).poll(cx) {
                Poll::Ready(Ok(value)) => {
                    *output = Some(value);
                    *slot = None;
                }
                Poll::Ready(Err(err)) => {
                    failure = Some(err);
                    break;
                }
                Poll::Pending => outstanding = true,
            }
        }

        if let Some(err) = failure {
            this.members.clear();
            return Poll::Ready(Err(err));
        }

        if outstanding {
            return Poll::Pending;
        }

        let outputs = std::mem::take(&mut this.outputs);
        Poll::Ready(Ok(outputs.into_iter().flatten().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_resolves() {
        let (reply, pending) = Pending::channel();
        reply.send(Ok(7u32)).unwrap();
        assert_eq!(pending.wait().unwrap(), 7);
    }

    #[test]
    fn test_dropped_reply_is_abandoned() {
        let (reply, mut pending) = Pending::<u32>::channel();
        assert!(pending.try_wait().is_none());

        drop(reply);
        assert!(matches!(pending.try_wait(), Some(Err(Error::Abandoned))));
    }

    #[test]
    fn test_batch_keeps_input_order() {
        let (first, a) = Pending::channel();
        let (second, b) = Pending::channel();
        let (third, c) = Pending::channel();
        let batch = PendingBatch::new(vec![a, b, c]);
        assert_eq!(batch.len(), 3);

        third.send(Ok("c")).unwrap();
        first.send(Ok("a")).unwrap();
        second.send(Ok("b")).unwrap();

        assert_eq!(batch.wait().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_batch_fails_without_waiting_for_rest() {
        let (_slow, a) = Pending::<u32>::channel();
        let (failing, b) = Pending::channel();
        let batch = PendingBatch::new(vec![a, b]);

        failing
            .send(Err(Error::TaskFailed("bad header".into())))
            .unwrap();

        match batch.wait() {
            Err(Error::TaskFailed(msg)) => assert_eq!(msg, "bad header"),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_empty_batch_resolves_immediately() {
        let batch = PendingBatch::<u32>::new(Vec::new());
        assert!(batch.is_empty());
        assert_eq!(batch.wait().unwrap(), Vec::<u32>::new());
    }

    #[test]
    fn test_settled_handle() {
        let pending = Pending::<u32>::settled(Err(Error::ShutDown));
        assert!(matches!(pending.wait(), Err(Error::ShutDown)));
    }
}
