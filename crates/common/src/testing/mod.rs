//! Testing utilities and helpers
//!
//! - **[`time`]**: A clock that only moves when told to
//! - **[`scheduler`]**: A scheduler that only ticks when told to
//!
//! Together they make time-driven policies fully deterministic in tests.
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//!
//! use circuitry_common::testing::{ManualScheduler, MockClock};
//! use circuitry_common::time::{Clock, Scheduler};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_millis(250));
//! assert_eq!(clock.now() - start, Duration::from_millis(250));
//!
//! let scheduler = ManualScheduler::new();
//! let _handle = scheduler
//!     .schedule_at_fixed_rate(Duration::from_millis(100), Box::new(|| {}))
//!     .unwrap();
//! assert_eq!(scheduler.tick_all(), 1);
//! ```

pub mod scheduler;
pub mod time;

// Re-export commonly used items
pub use scheduler::ManualScheduler;
pub use time::MockClock;
