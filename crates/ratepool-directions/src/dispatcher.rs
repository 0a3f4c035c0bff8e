//! Distance lookups on top of the rate-limited worker pool.
//!
//! [`Dispatcher`] turns each [`Trip`] into one pool job and interprets the
//! job's outcome. Single lookups surface every failure; the map-returning
//! batch call keeps only the successes.

use crate::{
    DirectionsConfig, DirectionsHandler, Error, Result, Trip,
    telemetry::{
        decrement_lookups_inflight, increment_lookup_errors, increment_lookups,
        increment_lookups_inflight, record_batch_size, record_lookup_duration,
    },
};
use futures::future::join_all;
use portable_atomic::{AtomicUsize, Ordering};
use ratepool::{Handler, JobHandle, PoolConfig, WorkerPool};
use std::{collections::HashMap, sync::Arc, time::Instant};

/// Production dispatcher backed by the Directions API.
pub type DirectionsApi = Dispatcher<DirectionsHandler>;

/// Submits distance lookups to a [`WorkerPool`] and collects their results.
///
/// The dispatcher owns its pool and, through it, the rate limiter. It is safe
/// to call from many tasks at once: every caller shares the same workers and
/// the same quota.
///
/// Call [`Dispatcher::shutdown`] when done. Dropping the dispatcher also stops
/// the workers but does not wait for them.
pub struct Dispatcher<H>
where
    H: Handler<Trip, Output = u64, Error = Error>,
{
    pool: WorkerPool<Trip, H>,
    pending: Arc<AtomicUsize>,
}

impl DirectionsApi {
    /// Builds the HTTP handler and the pool from `config`.
    ///
    /// # Errors
    ///
    /// - [`Error::Transport`] if the HTTP client cannot be built.
    /// - [`Error::Pool`] if the pool sizing is invalid.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new(config: DirectionsConfig) -> Result<Self> {
        let handler =
            DirectionsHandler::new(config.api_key, config.base_url, config.request_timeout)?;
        Self::with_handler(config.pool, handler)
    }
}

impl<H> Dispatcher<H>
where
    H: Handler<Trip, Output = u64, Error = Error>,
{
    /// Uses any handler that maps a trip to meters, e.g. a stub in tests.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Pool`] if `config` is invalid.
    pub fn with_handler(config: PoolConfig, handler: H) -> Result<Self> {
        Ok(Self {
            pool: WorkerPool::new(config, handler)?,
            pending: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Looks up one trip and waits for the answer.
    ///
    /// # Errors
    ///
    /// Whatever the handler reported, [`Error::Cancelled`] if the dispatcher
    /// shut down first, or [`Error::Unexpected`] if the handler panicked.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(trip = %trip)))]
    pub async fn get_distance(&self, trip: Trip) -> Result<u64> {
        let pending = self.submit(trip);
        pending.resolve().await
    }

    /// Looks up every trip and returns the distances of those that
    /// succeeded.
    ///
    /// All trips are queued before any result is awaited, so they run as
    /// parallel as the pool allows. Failed lookups are simply absent from the
    /// map; use [`Self::try_get_distances`] to see why. A trip listed twice
    /// is looked up twice and keeps the later result.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn get_distances<I>(&self, trips: I) -> HashMap<Trip, u64>
    where
        I: IntoIterator<Item = Trip>,
    {
        self.try_get_distances(trips)
            .await
            .into_iter()
            .filter_map(|(trip, res)| res.ok().map(|distance| (trip, distance)))
            .collect()
    }

    /// Like [`Self::get_distances`] but keeps every outcome, in input order.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all))]
    pub async fn try_get_distances<I>(&self, trips: I) -> Vec<(Trip, Result<u64>)>
    where
        I: IntoIterator<Item = Trip>,
    {
        let pending: Vec<_> = trips
            .into_iter()
            .map(|trip| (trip, self.submit(trip)))
            .collect();
        record_batch_size(pending.len() as f64);

        #[cfg(feature = "tracing")]
        tracing::debug!("Submitted batch of {} lookups", pending.len());

        join_all(
            pending
                .into_iter()
                .map(|(trip, lookup)| async move { (trip, lookup.resolve().await) }),
        )
        .await
    }

    /// Stops the workers and cancels every lookup that has not finished.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;

        #[cfg(feature = "tracing")]
        tracing::info!("Dispatcher shut down");
    }

    pub const fn pool(&self) -> &WorkerPool<Trip, H> {
        &self.pool
    }

    /// Number of lookups submitted whose caller is still waiting for them.
    ///
    /// A lookup stops counting once its result is returned or the future
    /// awaiting it is dropped, e.g. by a timeout. The job itself may still
    /// be queued or running in the pool at that point.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Relaxed)
    }

    fn submit(&self, trip: Trip) -> PendingLookup {
        increment_lookups();
        increment_lookups_inflight();
        self.pending.fetch_add(1, Ordering::Relaxed);
        PendingLookup {
            handle: self.pool.submit(trip),
            submitted_at: Instant::now(),
            pending: Arc::clone(&self.pending),
        }
    }
}

/// A submitted lookup and when it entered the queue.
///
/// Leaves the in-flight count on drop, whether or not it was resolved.
struct PendingLookup {
    handle: JobHandle<u64, Error>,
    submitted_at: Instant,
    pending: Arc<AtomicUsize>,
}

impl PendingLookup {
    async fn resolve(self) -> Result<u64> {
        let res = self.handle.result().await.map_err(Error::from);

        record_lookup_duration(self.submitted_at.elapsed().as_secs_f64() * 1_000.0);
        if let Err(_e) = &res {
            increment_lookup_errors();
            #[cfg(feature = "tracing")]
            tracing::debug!("Lookup {} failed: {_e}", self.handle.id());
        }

        res
    }
}

impl Drop for PendingLookup {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::Relaxed);
        decrement_lookups_inflight();

        #[cfg(feature = "tracing")]
        if !self.handle.is_finished() {
            tracing::debug!("Lookup {} abandoned before it finished", self.handle.id());
        }
    }
}

#[cfg(test)]
mod tests;
