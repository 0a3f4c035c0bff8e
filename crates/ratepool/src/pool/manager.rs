//! The rate-limited worker pool.
//!
//! This module defines [`WorkerPool`], which owns a fixed set of Tokio worker
//! tasks, a shared FIFO queue of [`Job`]s, one [`RateLimiter`] and one
//! [`Handler`]. Jobs are submitted without waiting; each worker dequeues the
//! next job, takes a limiter token, runs the handler and publishes the outcome
//! into the job's result slot.
//!
//! All workers pull from the same queue, so any free worker picks up the
//! oldest pending job. Completion order is not submission order.
//!
//! Shutdown is coordinated through a shared [`CancellationToken`] that is
//! threaded through dequeueing, token acquisition and handler execution.

use super::{
    config::PoolConfig,
    worker::{WorkerContext, worker_loop},
};
use crate::{Handler, Job, JobHandle, JobId, RateLimiter, Result};
use parking_lot::Mutex;
use portable_atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::{
    sync::{Mutex as AsyncMutex, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

/// Receiving end of the job queue, shared by every worker.
///
/// Holding the lock while waiting in `recv` is what makes dequeue
/// exactly-once; Tokio's mutex wakes waiters in FIFO order.
pub(crate) type SharedReceiver<P, T, E> = Arc<AsyncMutex<mpsc::UnboundedReceiver<Job<P, T, E>>>>;

#[derive(Debug, Default)]
pub(crate) struct PoolStats {
    pub(crate) queued: AtomicUsize,
    pub(crate) in_flight: AtomicUsize,
}

/// A fixed-size pool of workers whose job starts are gated by a token bucket.
///
/// The pool guarantees that:
///
/// - at most [`PoolConfig::workers`] handler invocations run at once;
/// - at most [`PoolConfig::burst`] jobs start within any refill period (one
///   second when `burst == rate`);
/// - every submitted job is executed at most once and its handle always
///   resolves, to [`JobError::Cancelled`](crate::JobError::Cancelled) if the
///   pool shuts down first.
///
/// The pool must be created from within a Tokio runtime. Dropping it cancels
/// the workers; call [`WorkerPool::shutdown`] to also wait for them and
/// resolve queued jobs deterministically.
///
/// # Example
///
/// ```
/// use ratepool::{handler_fn, PoolConfig, WorkerPool};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> ratepool::Result<()> {
/// let pool: WorkerPool<u64, _> = WorkerPool::new(
///     PoolConfig::new(2, 100),
///     handler_fn(|_worker_id: usize, n: u64| async move { Ok::<_, String>(n + 1) }),
/// )?;
///
/// let handle = pool.submit(41);
/// assert_eq!(handle.result().await, Ok(42));
///
/// pool.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct WorkerPool<P, H>
where
    H: Handler<P>,
{
    config: PoolConfig,
    handler: Arc<H>,
    limiter: Arc<RateLimiter>,
    sender: mpsc::UnboundedSender<Job<P, H::Output, H::Error>>,
    receiver: SharedReceiver<P, H::Output, H::Error>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutdown_token: CancellationToken,
    next_job_id: AtomicU64,
    stats: Arc<PoolStats>,
}

impl<P, H> WorkerPool<P, H>
where
    P: Send + 'static,
    H: Handler<P>,
{
    /// Validates `config`, builds the limiter and spawns the workers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`](crate::Error::InvalidConfig) if any
    /// configured value is zero or `burst` exceeds `rate`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new(config: PoolConfig, handler: H) -> Result<Self> {
        config.validate()?;

        let limiter = Arc::new(RateLimiter::new(config.burst, config.rate)?);
        let handler = Arc::new(handler);
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(AsyncMutex::new(receiver));
        let shutdown_token = CancellationToken::new();
        let stats = Arc::new(PoolStats::default());

        let workers = (0..config.workers)
            .map(|worker_id| {
                let ctx = WorkerContext {
                    handler: Arc::clone(&handler),
                    limiter: Arc::clone(&limiter),
                    receiver: Arc::clone(&receiver),
                    shutdown_token: shutdown_token.clone(),
                    stats: Arc::clone(&stats),
                };
                tokio::spawn(worker_loop(worker_id, ctx))
            })
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Started worker pool with {} workers, rate {}/s, burst {}",
            config.workers,
            config.rate,
            config.burst
        );

        Ok(Self {
            config,
            handler,
            limiter,
            sender,
            receiver,
            workers: Mutex::new(workers),
            shutdown_token,
            next_job_id: AtomicU64::new(0),
            stats,
        })
    }

    /// Enqueues `payload` and returns a handle to its eventual outcome.
    ///
    /// Never waits and never rejects: the queue is unbounded and throughput is
    /// governed by the limiter alone. After [`Self::shutdown`] the returned
    /// handle is already resolved as cancelled.
    pub fn submit(&self, payload: P) -> JobHandle<H::Output, H::Error> {
        let id = JobId::new(self.next_job_id.fetch_add(1, Ordering::Relaxed));
        let (job, handle) = Job::new(id, payload);

        if self.shutdown_token.is_cancelled() {
            job.cancel();
            return handle;
        }

        self.stats.queued.fetch_add(1, Ordering::Relaxed);
        if let Err(mpsc::error::SendError(job)) = self.sender.send(job) {
            // The queue was closed by a concurrent shutdown.
            self.stats.queued.fetch_sub(1, Ordering::Relaxed);
            job.cancel();
        }

        handle
    }

    /// Stops the pool.
    ///
    /// - Cancels the shared token, which interrupts workers that are waiting
    ///   for a job or a limiter token and aborts handlers mid-flight. Their
    ///   jobs resolve as cancelled.
    /// - Waits for every worker task to exit.
    /// - Closes the queue and resolves every job still in it as cancelled.
    ///
    /// Calling it more than once is harmless.
    pub async fn shutdown(&self) {
        // === Phase 1: Stop the workers ===
        self.shutdown_token.cancel();

        let handles = core::mem::take(&mut *self.workers.lock());
        for (_worker_id, res) in futures::future::join_all(handles)
            .await
            .into_iter()
            .enumerate()
        {
            if let Err(_e) = res {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker {_worker_id} terminated abnormally: {_e}");
            }
        }

        // === Phase 2: Drain the queue ===
        let mut receiver = self.receiver.lock().await;
        receiver.close();

        let mut _cancelled = 0_usize;
        while let Ok(job) = receiver.try_recv() {
            self.stats.queued.fetch_sub(1, Ordering::Relaxed);
            job.cancel();
            _cancelled += 1;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Worker pool shut down, {_cancelled} queued jobs cancelled");
    }

    pub const fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Number of worker tasks the pool was built with.
    pub const fn workers(&self) -> usize {
        self.config.workers
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Number of jobs waiting to be picked up by a worker (approximate).
    pub fn queued(&self) -> usize {
        self.stats.queued.load(Ordering::Relaxed)
    }

    /// Number of handler invocations currently running.
    pub fn in_flight(&self) -> usize {
        self.stats.in_flight.load(Ordering::Relaxed)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }
}

impl<P, H> Drop for WorkerPool<P, H>
where
    H: Handler<P>,
{
    fn drop(&mut self) {
        // Workers notice on their next await point and exit. Anything still
        // queued is dropped with the channel, which resolves its handles as
        // cancelled.
        self.shutdown_token.cancel();
    }
}
