//! Error types for the worker pool.
//!
//! Two kinds of failure exist in this crate:
//!
//! - [`Error`]: problems with the pool itself, such as an invalid
//!   configuration or a wait that was cancelled by shutdown.
//! - [`JobError`]: the outcome of a single job that did not succeed. It either
//!   wraps the handler's own error type or reports that the pool could not run
//!   the handler to completion.

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Pool-level error.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The pool or limiter was constructed with unusable parameters.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A wait was interrupted by the pool's cancellation token.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Failure outcome of a job.
///
/// `E` is the error type returned by the [`Handler`](crate::Handler).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum JobError<E> {
    /// The handler ran and returned an error. Never retried by the pool.
    #[error("Job failed: {0}")]
    Failed(E),

    /// The job was cancelled before the handler produced a result, either
    /// because the pool shut down or because the job was dropped unexecuted.
    #[error("Job cancelled before completion")]
    Cancelled,

    /// The handler panicked. The worker survives and keeps serving jobs.
    #[error("Handler panicked: {message}")]
    Panicked { message: String },
}

impl<E> JobError<E> {
    /// Returns the handler error if this is a [`JobError::Failed`].
    pub fn into_failure(self) -> Option<E> {
        match self {
            Self::Failed(e) => Some(e),
            Self::Cancelled | Self::Panicked { .. } => None,
        }
    }

    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
