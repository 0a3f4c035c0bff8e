//! Rate-limited worker pool.
//!
//! ## Structure
//!
//! - [`config`] - pool sizing and limiter parameters ([`PoolConfig`]).
//! - [`manager`] - the [`WorkerPool`] owning the queue, limiter and workers.
//! - [`worker`] - the loop each worker task runs.

mod config;
mod manager;
mod worker;


pub use config::*;
pub use manager::*;
