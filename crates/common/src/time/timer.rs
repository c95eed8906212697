//! Recurring timers on a tokio runtime
//!
//! Provides a fixed-rate timer with cancellation support and a
//! [`Scheduler`] that spawns onto a runtime handle.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::scheduler::{check_period, Scheduler, SchedulerError, Task, TaskHandle};

/// Create a recurring timer on `runtime`
///
/// The first call happens one `period` after spawning. Cancellation is
/// observed at the next tick.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
///
/// use circuitry_common::time::timer::recurring;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = recurring(&tokio::runtime::Handle::current(), Duration::from_secs(1), || {
///         println!("Tick!");
///     });
///
///     tokio::time::sleep(Duration::from_secs(5)).await;
///     handle.cancel();
/// }
/// ```
pub fn recurring<F>(runtime: &Handle, period: Duration, mut callback: F) -> TaskHandle
where
    F: FnMut() + Send + 'static,
{
    let handle = TaskHandle::new();
    let handle_clone = handle.clone();

    runtime.spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await; // Skip first immediate tick

        while !handle_clone.is_cancelled() {
            interval.tick().await;
            if !handle_clone.is_cancelled() {
                callback();
            }
        }
    });

    handle
}

/// Scheduler that runs tasks on a tokio runtime
///
/// Ticks run inline on a runtime worker, so tasks must be short and
/// non-blocking.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: Handle,
}

impl TokioScheduler {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Scheduler bound to the runtime the caller is running on.
    pub fn try_current() -> Result<Self, SchedulerError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| SchedulerError::NoRuntime(e.to_string()))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_at_fixed_rate(
        &self,
        period: Duration,
        task: Task,
    ) -> Result<TaskHandle, SchedulerError> {
        check_period(period)?;
        debug!(?period, "scheduling fixed-rate task on tokio runtime");
        Ok(recurring(&self.runtime, period, task))
    }
}
