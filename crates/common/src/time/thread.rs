//! Scheduler backed by dedicated OS threads
//!
//! Each scheduled task gets its own named thread that parks until the next
//! deadline. Cancelling the handle unparks the thread, so it exits promptly
//! instead of sleeping out the rest of its period.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use super::scheduler::{check_period, Scheduler, SchedulerError, Task, TaskHandle};

/// Runs each task on its own named thread
#[derive(Debug)]
pub struct ThreadScheduler {
    name: String,
    spawned: AtomicU64,
}

impl ThreadScheduler {
    /// Threads are named `{name}-{n}`.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), spawned: AtomicU64::new(0) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new("circuitry-scheduler")
    }
}

impl Scheduler for ThreadScheduler {
    fn schedule_at_fixed_rate(
        &self,
        period: Duration,
        mut task: Task,
    ) -> Result<TaskHandle, SchedulerError> {
        check_period(period)?;

        let index = self.spawned.fetch_add(1, Ordering::Relaxed);
        let thread_name = format!("{}-{index}", self.name);
        let cancel = TaskHandle::new();
        let worker_cancel = cancel.clone();

        let join = thread::Builder::new().name(thread_name.clone()).spawn(move || {
            let mut next = Instant::now() + period;
            loop {
                // Park until the deadline; unpark may be spurious.
                loop {
                    if worker_cancel.is_cancelled() {
                        debug!(thread = %thread_name, "scheduled task cancelled");
                        return;
                    }
                    let now = Instant::now();
                    if now >= next {
                        break;
                    }
                    thread::park_timeout(next - now);
                }

                task();
                next += period;

                // Fell behind by more than a period: skip the missed runs.
                let now = Instant::now();
                if next + period <= now {
                    trace!(thread = %thread_name, "scheduled task overran its period");
                    next = now + period;
                }
            }
        })?;

        debug!(thread = %self.name, ?period, "scheduled fixed-rate task");
        Ok(cancel.waking(join.thread().clone()))
    }
}
