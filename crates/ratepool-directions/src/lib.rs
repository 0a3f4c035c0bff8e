#![doc = include_str!("../README.md")]

mod config;
mod dispatcher;
mod error;
mod handler;
mod response;
pub mod telemetry;
mod types;

pub use crate::config::*;
pub use crate::dispatcher::*;
pub use crate::error::*;
pub use crate::handler::*;
pub use crate::response::*;
pub use crate::types::*;
