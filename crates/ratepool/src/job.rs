//! Jobs and their single-assignment result slots.
//!
//! A job is split in two halves when it is created:
//!
//! - [`Job`] carries the payload and the right to publish the result. It is
//!   moved into the pool's queue and from there into exactly one worker.
//! - [`JobHandle`] is the read side. It can be cloned freely and every clone
//!   observes the same outcome.
//!
//! Publishing consumes the [`Completer`], so a result can be stored at most
//! once and a job can never be executed twice through the same slot. If the
//! write side is dropped without publishing (for example when a pool is torn
//! down with work still queued), waiters observe [`JobError::Cancelled`]
//! instead of waiting forever.

use crate::JobError;
use core::fmt;
use tokio::sync::watch;

/// Stored outcome of a job.
pub type JobResult<T, E> = Result<T, JobError<E>>;

type Slot<T, E> = Option<JobResult<T, E>>;

/// Opaque job identity, unique within the pool that assigned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(u64);

impl JobId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// The queued half of a job: payload plus the right to publish its result.
pub struct Job<P, T, E> {
    id: JobId,
    payload: P,
    completer: Completer<T, E>,
}

impl<P, T, E> Job<P, T, E> {
    /// Creates a job for `payload` and the handle used to await its result.
    pub fn new(id: JobId, payload: P) -> (Self, JobHandle<T, E>) {
        let (tx, rx) = watch::channel(None);
        let job = Self {
            id,
            payload,
            completer: Completer { id, tx },
        };
        (job, JobHandle { id, rx })
    }

    pub const fn id(&self) -> JobId {
        self.id
    }

    pub const fn payload(&self) -> &P {
        &self.payload
    }

    /// Splits the job so the payload can be handed to a handler while the
    /// completer waits for its outcome.
    pub fn into_parts(self) -> (P, Completer<T, E>) {
        (self.payload, self.completer)
    }

    /// Resolves the job as [`JobError::Cancelled`] without running it.
    pub fn cancel(self) {
        self.completer.complete(Err(JobError::Cancelled));
    }
}

impl<P: fmt::Debug, T, E> fmt::Debug for Job<P, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// Write side of a job's result slot.
///
/// [`Completer::complete`] takes `self`, which makes "set exactly once" a
/// property of ownership rather than a runtime check.
pub struct Completer<T, E> {
    id: JobId,
    tx: watch::Sender<Slot<T, E>>,
}

impl<T, E> Completer<T, E> {
    pub const fn id(&self) -> JobId {
        self.id
    }

    /// Publishes the outcome and wakes every waiter.
    ///
    /// Succeeds even when no handle is alive any more; the outcome is simply
    /// discarded with the slot.
    pub fn complete(self, outcome: JobResult<T, E>) {
        let previous = self.tx.send_replace(Some(outcome));
        debug_assert!(previous.is_none(), "{} completed twice", self.id);
    }
}

/// Read side of a job. Cheap to clone; all clones share one slot.
pub struct JobHandle<T, E> {
    id: JobId,
    rx: watch::Receiver<Slot<T, E>>,
}

impl<T, E> Clone for JobHandle<T, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            rx: self.rx.clone(),
        }
    }
}

impl<T, E> fmt::Debug for JobHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("done", &self.rx.borrow().is_some())
            .finish()
    }
}

impl<T, E> JobHandle<T, E> {
    pub const fn id(&self) -> JobId {
        self.id
    }
}

impl<T, E> JobHandle<T, E>
where
    T: Clone,
    E: Clone,
{
    /// Waits until the job has an outcome and returns a copy of it.
    ///
    /// Can be called any number of times, from any number of clones, and
    /// always yields the same value. Awaiting never triggers execution.
    pub async fn result(&self) -> JobResult<T, E> {
        let mut rx = self.rx.clone();
        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone().unwrap_or(Err(JobError::Cancelled)),
            // Write side dropped without publishing.
            Err(_) => Err(JobError::Cancelled),
        };
        outcome
    }

    /// Returns the outcome if the job has finished, without waiting.
    pub fn try_result(&self) -> Option<JobResult<T, E>> {
        let slot = (*self.rx.borrow()).clone();
        match slot {
            Some(outcome) => Some(outcome),
            None if self.rx.has_changed().is_err() => Some(Err(JobError::Cancelled)),
            None => None,
        }
    }

    /// Returns `true` once an outcome is available.
    pub fn is_finished(&self) -> bool {
        self.try_result().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    type TestJob = Job<&'static str, u64, String>;

    #[tokio::test]
    async fn all_waiters_observe_the_same_outcome() {
        let (job, handle) = TestJob::new(JobId::new(7), "payload");
        assert_eq!(job.id(), JobId::new(7));
        assert_eq!(*job.payload(), "payload");

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.result().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!handle.is_finished());

        let (_, completer) = job.into_parts();
        completer.complete(Ok(42));

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), Ok(42));
        }
        assert_eq!(handle.result().await, Ok(42));
        assert_eq!(handle.result().await, Ok(42));
    }

    #[tokio::test]
    async fn failure_is_stored_as_failure() {
        let (job, handle) = TestJob::new(JobId::new(1), "payload");
        let (_, completer) = job.into_parts();
        completer.complete(Err(JobError::Failed("boom".to_string())));

        assert_eq!(
            handle.result().await,
            Err(JobError::Failed("boom".to_string()))
        );
    }

    #[tokio::test]
    async fn dropped_job_resolves_as_cancelled() {
        let (job, handle) = TestJob::new(JobId::new(2), "payload");
        assert_eq!(handle.try_result(), None);

        drop(job);
        assert_eq!(handle.try_result(), Some(Err(JobError::Cancelled)));
        assert_eq!(handle.result().await, Err(JobError::Cancelled));
    }

    #[tokio::test]
    async fn cancel_publishes_cancelled() {
        let (job, handle) = TestJob::new(JobId::new(3), "payload");
        job.cancel();
        assert_eq!(handle.result().await, Err(JobError::Cancelled));
    }

    #[test]
    fn completing_without_handles_is_harmless() {
        let (job, handle) = TestJob::new(JobId::new(4), "payload");
        drop(handle);
        let (_, completer) = job.into_parts();
        completer.complete(Ok(1));
    }

    #[test]
    fn job_id_display() {
        assert_eq!(JobId::new(12).to_string(), "job-12");
        assert_eq!(JobId::new(12).to_raw(), 12);
    }
}
