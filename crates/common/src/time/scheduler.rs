//! Fixed-rate task scheduling capability
//!
//! A [`Scheduler`] runs a tick function repeatedly at a fixed period until the
//! returned [`TaskHandle`] is cancelled. Implementations decide *where* the
//! tick runs (a dedicated thread, a tokio task, or the test's own thread).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::Thread;
use std::time::Duration;

use circuitry_domain::CircuitError;
use thiserror::Error;

/// Recurring unit of work handed to a scheduler.
pub type Task = Box<dyn FnMut() + Send + 'static>;

/// Errors raised when a recurring task cannot be started
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("period must be greater than zero")]
    InvalidPeriod,

    #[error("failed to spawn scheduler thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("no async runtime available: {0}")]
    NoRuntime(String),
}

impl From<SchedulerError> for CircuitError {
    fn from(err: SchedulerError) -> Self {
        CircuitError::Scheduler(err.to_string())
    }
}

/// Run tasks at a fixed rate
pub trait Scheduler: Send + Sync {
    /// Start running `task` every `period`, first run one period from now.
    fn schedule_at_fixed_rate(
        &self,
        period: Duration,
        task: Task,
    ) -> Result<TaskHandle, SchedulerError>;
}

impl<S: Scheduler + ?Sized> Scheduler for Arc<S> {
    fn schedule_at_fixed_rate(
        &self,
        period: Duration,
        task: Task,
    ) -> Result<TaskHandle, SchedulerError> {
        (**self).schedule_at_fixed_rate(period, task)
    }
}

/// A handle that can be used to cancel a recurring task
///
/// Clones share the cancellation flag. Dropping a handle does not cancel.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
    sleeper: Option<Thread>,
}

impl TaskHandle {
    /// Create a new handle
    pub fn new() -> Self {
        Self { cancelled: Arc::new(AtomicBool::new(false)), sleeper: None }
    }

    /// Same handle, whose cancellation also wakes `thread` from a park.
    #[must_use]
    pub fn waking(mut self, thread: Thread) -> Self {
        self.sleeper = Some(thread);
        self
    }

    /// Cancel the task. Idempotent. A tick already running completes.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            if let Some(thread) = &self.sleeper {
                thread.unpark();
            }
        }
    }

    /// Check if the task has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn check_period(period: Duration) -> Result<(), SchedulerError> {
    if period.is_zero() {
        Err(SchedulerError::InvalidPeriod)
    } else {
        Ok(())
    }
}
