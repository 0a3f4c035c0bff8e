use crate::{Error, Result};

/// Default number of concurrent workers.
pub const DEFAULT_WORKERS: usize = 10;

/// Default number of job starts allowed per second.
pub const DEFAULT_OPS_PER_SEC: u32 = 8;

/// Sizing of a [`WorkerPool`](crate::WorkerPool) and its rate limiter.
///
/// All values are fixed once the pool is built. `burst` defaults to `rate`,
/// which lets a full second's quota start at once before the limiter gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of worker tasks, i.e. the maximum number of jobs executing at
    /// the same time.
    pub workers: usize,
    /// Job starts allowed per second.
    pub rate: u32,
    /// Maximum number of job starts allowed back to back after an idle
    /// period. Never more than `rate`.
    pub burst: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS, DEFAULT_OPS_PER_SEC)
    }
}

impl PoolConfig {
    /// A config with `burst == rate`.
    pub const fn new(workers: usize, rate: u32) -> Self {
        Self {
            workers,
            rate,
            burst: rate,
        }
    }

    #[must_use]
    pub const fn with_burst(mut self, burst: u32) -> Self {
        self.burst = burst;
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if any value is zero or `burst`
    /// exceeds `rate`.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig {
                reason: "workers must be greater than 0".to_string(),
            });
        }
        if self.rate == 0 {
            return Err(Error::InvalidConfig {
                reason: "rate must be greater than 0".to_string(),
            });
        }
        if self.burst == 0 {
            return Err(Error::InvalidConfig {
                reason: "burst must be greater than 0".to_string(),
            });
        }
        // A larger burst stretches the refill period past one second and lets
        // more than `rate` jobs start within a single second.
        if self.burst > self.rate {
            return Err(Error::InvalidConfig {
                reason: format!(
                    "burst ({}) must not exceed rate ({})",
                    self.burst, self.rate
                ),
            });
        }
        Ok(())
    }
}
