//! Manually driven scheduler
//!
//! Tasks registered with [`ManualScheduler`] never run on their own; the test
//! calls [`ManualScheduler::tick_all`] to run every live task exactly once on
//! the calling thread.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::time::{Scheduler, SchedulerError, Task, TaskHandle};

struct Entry {
    period: Duration,
    handle: TaskHandle,
    task: Task,
}

/// Scheduler whose ticks are driven by the test
///
/// Clones share the same task list, so a test can keep one clone and hand
/// another to the code under test.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    entries: Arc<Mutex<Vec<Entry>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every non-cancelled task once. Returns how many ran.
    ///
    /// Cancelled tasks are dropped from the list.
    pub fn tick_all(&self) -> usize {
        let mut entries = self.lock();
        entries.retain(|entry| !entry.handle.is_cancelled());
        for entry in entries.iter_mut() {
            (entry.task)();
        }
        entries.len()
    }

    /// Run `tick_all` `n` times. Returns the total number of task runs.
    pub fn tick_n(&self, n: usize) -> usize {
        (0..n).map(|_| self.tick_all()).sum()
    }

    /// Number of registered tasks that have not been cancelled.
    pub fn active_tasks(&self) -> usize {
        self.lock().iter().filter(|entry| !entry.handle.is_cancelled()).count()
    }

    /// Periods of the active tasks, in registration order.
    pub fn periods(&self) -> Vec<Duration> {
        self.lock()
            .iter()
            .filter(|entry| !entry.handle.is_cancelled())
            .map(|entry| entry.period)
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler").field("active_tasks", &self.active_tasks()).finish()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_at_fixed_rate(
        &self,
        period: Duration,
        task: Task,
    ) -> Result<TaskHandle, SchedulerError> {
        if period.is_zero() {
            return Err(SchedulerError::InvalidPeriod);
        }
        let handle = TaskHandle::new();
        self.lock().push(Entry { period, handle: handle.clone(), task });
        Ok(handle)
    }
}
