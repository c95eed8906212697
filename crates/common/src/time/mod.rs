//! Time utilities and abstractions
//!
//! This module provides:
//! - **[`clock`]**: Real monotonic time behind the [`Clock`] trait
//! - **[`scheduler`]**: The fixed-rate [`Scheduler`] capability and
//!   [`TaskHandle`]
//! - **[`thread`]**: A scheduler running each task on a dedicated OS thread
//! - **[`timer`]**: Recurring timers on a tokio runtime (feature `runtime`)
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use circuitry_common::time::{Scheduler, ThreadScheduler};
//!
//! let ticks = Arc::new(AtomicU32::new(0));
//! let counter = Arc::clone(&ticks);
//! let handle = ThreadScheduler::new("doc-tick")
//!     .schedule_at_fixed_rate(
//!         Duration::from_millis(5),
//!         Box::new(move || {
//!             counter.fetch_add(1, Ordering::Relaxed);
//!         }),
//!     )
//!     .unwrap();
//! std::thread::sleep(Duration::from_millis(30));
//! handle.cancel();
//! assert!(ticks.load(Ordering::Relaxed) >= 1);
//! ```

pub mod clock;
pub mod scheduler;
pub mod thread;
#[cfg(feature = "runtime")]
pub mod timer;

// Re-export commonly used items
pub use clock::{Clock, SystemClock};
pub use scheduler::{Scheduler, SchedulerError, Task, TaskHandle};
pub use thread::ThreadScheduler;
#[cfg(feature = "runtime")]
pub use timer::{recurring, TokioScheduler};

// Re-export mock time from the testing module
#[cfg(any(feature = "test-utils", test))]
pub use crate::testing::time::MockClock;
