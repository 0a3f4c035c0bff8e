#![doc = include_str!("../README.md")]

mod error;
mod handler;
mod job;
mod limiter;
mod pool;

pub use crate::error::*;
pub use crate::handler::*;
pub use crate::job::*;
pub use crate::limiter::*;
pub use crate::pool::*;
// Re-exported so callers can build cancellation-aware handlers without
// depending on `tokio-util` directly.
pub use tokio_util::sync::CancellationToken;
