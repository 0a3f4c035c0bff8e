use crate::{Error, Result};
use core::time::Duration;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Result of a non-blocking attempt to take a token from a [`RateLimiter`].
///
/// - [`AcquireStatus::Ready`] means a token was consumed and the caller may
///   proceed.
/// - [`AcquireStatus::Pending`] means the bucket is empty. No token was
///   consumed; the next one frees up after `yield_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStatus {
    /// A token was consumed.
    Ready,
    /// The bucket is empty.
    Pending {
        /// Time until the oldest outstanding token is returned to the bucket.
        yield_for: Duration,
    },
}

/// A token bucket that gates when queued work may start.
///
/// The bucket holds `burst` tokens. Each token taken is returned exactly one
/// refill period (`burst / rate` seconds) after it was taken, so with the
/// usual `burst == rate` a full second's quota may fire at once and then
/// nothing more until the first of those tokens is a second old. Requests are
/// not smoothed out over the second.
///
/// The consequence is a strict bound: in every window of one refill period
/// there are at most `burst` successful acquisitions.
///
/// Time is read from [`tokio::time::Instant`], so tests can drive the limiter
/// with a paused clock.
///
/// # Example
///
/// ```
/// use ratepool::{AcquireStatus, RateLimiter};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> ratepool::Result<()> {
/// let limiter = RateLimiter::new(2, 2)?;
/// assert_eq!(limiter.try_acquire(), AcquireStatus::Ready);
/// assert_eq!(limiter.try_acquire(), AcquireStatus::Ready);
/// assert!(matches!(limiter.try_acquire(), AcquireStatus::Pending { .. }));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    burst: u32,
    rate: u32,
    period: Duration,
    // Instants at which the currently outstanding tokens were taken, oldest
    // first. Its length never exceeds `burst`.
    taken: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter allowing `rate` acquisitions per second with bursts
    /// of up to `burst`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if either value is zero.
    pub fn new(burst: u32, rate: u32) -> Result<Self> {
        if burst == 0 {
            return Err(Error::InvalidConfig {
                reason: "burst must be greater than 0".to_string(),
            });
        }
        if rate == 0 {
            return Err(Error::InvalidConfig {
                reason: "rate must be greater than 0".to_string(),
            });
        }

        Ok(Self {
            burst,
            rate,
            period: Duration::from_secs(u64::from(burst)) / rate,
            taken: Mutex::new(VecDeque::new()),
        })
    }

    /// Maximum number of tokens the bucket holds.
    pub const fn burst(&self) -> u32 {
        self.burst
    }

    /// Tokens returned to the bucket per second.
    pub const fn rate(&self) -> u32 {
        self.rate
    }

    /// How long a taken token stays out of the bucket.
    pub const fn refill_period(&self) -> Duration {
        self.period
    }

    /// Number of tokens that could be taken right now.
    pub fn available(&self) -> u32 {
        let now = Instant::now();
        let mut taken = self.taken.lock();
        self.refill(&mut taken, now);
        // `taken.len() <= burst`, so the subtraction cannot underflow.
        self.burst - taken.len() as u32
    }

    /// Attempts to take a token without waiting.
    ///
    /// Checking for a token and consuming it happen under the same lock, so
    /// two callers can never proceed on the same token.
    pub fn try_acquire(&self) -> AcquireStatus {
        let now = Instant::now();
        let mut taken = self.taken.lock();
        self.refill(&mut taken, now);

        if taken.len() < self.burst as usize {
            taken.push_back(now);
            return AcquireStatus::Ready;
        }

        let yield_for = taken.front().map_or(Duration::ZERO, |&oldest| {
            self.period.saturating_sub(now.duration_since(oldest))
        });
        AcquireStatus::Pending { yield_for }
    }

    /// Waits until a token is available, then consumes it.
    ///
    /// Never fails and has no timeout; use [`Self::acquire_or_cancel`] to bound
    /// the wait.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                AcquireStatus::Ready => return,
                AcquireStatus::Pending { yield_for } => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Rate limit reached, waiting {yield_for:?} for a token");
                    tokio::time::sleep(yield_for).await;
                }
            }
        }
    }

    /// Like [`Self::acquire`] but gives up once `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the token fires before a token is
    /// taken. No token is consumed in that case.
    pub async fn acquire_or_cancel(&self, token: &CancellationToken) -> Result<()> {
        tokio::select! {
            biased;
            () = token.cancelled() => Err(Error::Cancelled),
            () = self.acquire() => Ok(()),
        }
    }

    fn refill(&self, taken: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = taken.front() {
            if now.duration_since(oldest) < self.period {
                break;
            }
            taken.pop_front();
        }
    }
}
