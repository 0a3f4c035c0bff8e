use super::manager::{PoolStats, SharedReceiver};
use crate::{Completer, Handler, Job, JobError, RateLimiter};
use core::{any::Any, panic::AssertUnwindSafe};
use futures::FutureExt;
use portable_atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a worker task shares with its pool.
pub(crate) struct WorkerContext<P, H>
where
    H: Handler<P>,
{
    pub(crate) handler: Arc<H>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) receiver: SharedReceiver<P, H::Output, H::Error>,
    pub(crate) shutdown_token: CancellationToken,
    pub(crate) stats: Arc<PoolStats>,
}

/// Worker task: dequeue, take a token, run the handler, publish, repeat.
///
/// Runs until the pool's shutdown token is cancelled or the queue is closed
/// and empty. A worker executes one job at a time, which is what bounds the
/// pool's concurrency to its worker count.
pub(crate) async fn worker_loop<P, H>(worker_id: usize, ctx: WorkerContext<P, H>)
where
    P: Send + 'static,
    H: Handler<P>,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    loop {
        let job = tokio::select! {
            biased;
            () = ctx.shutdown_token.cancelled() => break,
            job = next_job(&ctx.receiver) => match job {
                Some(job) => job,
                None => break,
            },
        };
        ctx.stats.queued.fetch_sub(1, Ordering::Relaxed);

        run_job(worker_id, &ctx, job).await;
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped");
}

async fn next_job<P, T, E>(receiver: &SharedReceiver<P, T, E>) -> Option<Job<P, T, E>> {
    receiver.lock().await.recv().await
}

async fn run_job<P, H>(worker_id: usize, ctx: &WorkerContext<P, H>, job: Job<P, H::Output, H::Error>)
where
    P: Send + 'static,
    H: Handler<P>,
{
    let (payload, completer) = job.into_parts();

    if ctx
        .limiter
        .acquire_or_cancel(&ctx.shutdown_token)
        .await
        .is_err()
    {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Worker {worker_id} cancelled {} while waiting for a token",
            completer.id()
        );
        completer.complete(Err(JobError::Cancelled));
        return;
    }

    ctx.stats.in_flight.fetch_add(1, Ordering::Relaxed);
    let outcome = tokio::select! {
        biased;
        () = ctx.shutdown_token.cancelled() => Err(JobError::Cancelled),
        res = AssertUnwindSafe(ctx.handler.handle(worker_id, payload)).catch_unwind() => match res {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(JobError::Failed(e)),
            Err(panic) => Err(JobError::Panicked {
                message: panic_message(&*panic),
            }),
        },
    };
    ctx.stats.in_flight.fetch_sub(1, Ordering::Relaxed);

    publish(worker_id, completer, outcome);
}

fn publish<T, E>(_worker_id: usize, completer: Completer<T, E>, outcome: Result<T, JobError<E>>) {
    #[cfg(feature = "tracing")]
    match &outcome {
        Ok(_) => tracing::trace!("Worker {_worker_id} completed {}", completer.id()),
        Err(JobError::Failed(_)) => tracing::debug!("Worker {_worker_id} failed {}", completer.id()),
        Err(JobError::Cancelled) => {
            tracing::debug!("Worker {_worker_id} cancelled {} mid-flight", completer.id());
        }
        Err(JobError::Panicked { message }) => tracing::error!(
            "Worker {_worker_id} caught a handler panic in {}: {message}",
            completer.id()
        ),
    }

    completer.complete(outcome);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
