//! Runtime utilities shared across Circuitry crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - (always) clocks, the [`time::Scheduler`] capability and the
//!   thread-backed scheduler
//! - `runtime`: tokio-backed scheduler
//! - `test-utils`: mock clock and manually ticked scheduler

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use time::{Clock, Scheduler, SchedulerError, SystemClock, TaskHandle, ThreadScheduler};
#[cfg(feature = "runtime")]
pub use time::TokioScheduler;
