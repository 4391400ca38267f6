//! Shared utilities for the LMNode masternode layer.

pub mod logging;
pub mod time;

pub use logging::init_tracing;
pub use time::{format_age, format_duration};
