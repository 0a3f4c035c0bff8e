use ratepool::JobError;
use std::sync::Arc;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Everything that can go wrong with a distance lookup.
///
/// The enum is `Clone` because one job result is shared by every waiter on
/// it; sources that are not `Clone` are held behind an `Arc`.
#[derive(Clone, Debug, thiserror::Error)]
pub enum Error {
    /// The request could not be sent, timed out, or came back with a non-2xx
    /// status.
    #[error("Transport error: {0}")]
    Transport(#[source] Arc<reqwest::Error>),

    /// The response body was not the JSON we expected.
    #[error("Decode error: {0}")]
    Decode(#[source] Arc<serde_json::Error>),

    /// The API answered but refused the request (quota, bad key, bad
    /// request).
    #[error("Upstream error {status}: {message}")]
    Upstream { status: String, message: String },

    #[error("no route")]
    NoRoute,

    #[error("no legs in route")]
    NoLegs,

    /// The lookup was abandoned because the dispatcher shut down.
    #[error("Lookup cancelled")]
    Cancelled,

    /// A bug or invariant violation, e.g. a panicking handler.
    #[error("Unexpected error: {context}")]
    Unexpected { context: String },

    #[error("Worker pool error: {0}")]
    Pool(#[from] ratepool::Error),

    #[error("Invalid input {input:?}: {reason}")]
    Parse { input: String, reason: String },
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(Arc::new(err))
    }
}

impl From<JobError<Self>> for Error {
    fn from(err: JobError<Self>) -> Self {
        match err {
            JobError::Failed(e) => e,
            JobError::Cancelled => Self::Cancelled,
            JobError::Panicked { message } => Self::Unexpected {
                context: format!("handler panicked: {message}"),
            },
        }
    }
}
