//! Time-sliced good-ratio policy
//!
//! Pulses only bump a packed counter. A background evaluator runs every
//! `eval_every_n_millis`, cuts the counter into a slice and decides on the
//! slice's good ratio:
//!
//! | state       | condition                              | target      |
//! |-------------|----------------------------------------|-------------|
//! | `Closed`    | ratio < `open_at_good_ratio`           | `Open`      |
//! | `Open`      | `reset_after_n_millis` elapsed         | `Resetting` |
//! | `Resetting` | ratio >= `close_at_good_ratio`         | `Closed`    |
//! | `Resetting` | otherwise, bad resets reach the limit  | `Failed`    |
//! | `Resetting` | otherwise                              | `Open`      |
//!
//! Slices smaller than `min_slice_count` are carried into the next slice,
//! except while `Open`, where only elapsed time matters.
//!
//! Slice counter layout:
//!
//! ```text
//!   63 62           32 31 30            0
//!  +--+---------------+--+---------------+
//!  |0 |   bad (31)    |0 |   good (31)   |
//!  +--+---------------+--+---------------+
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::{Duration, Instant};

use circuitry_common::time::{Clock, Scheduler, SystemClock, TaskHandle, ThreadScheduler};
use circuitry_domain::constants::{SLICE_COUNT_MAX, SLICE_HALF_BITS};
use circuitry_domain::{CircuitError, CircuitResult, State, StateSnapshot, TimedRatioConfig};
use serde::Serialize;
use tracing::{debug, error, info, trace};

use super::{saturating_increment, PulseCause, TransitionPolicy};
use crate::circuit::TransitionEngine;

const BAD_UNIT: u64 = 1 << SLICE_HALF_BITS;

fn split(word: u64) -> (u64, u64) {
    (word & SLICE_COUNT_MAX, (word >> SLICE_HALF_BITS) & SLICE_COUNT_MAX)
}

fn join(good: u64, bad: u64) -> u64 {
    (bad.min(SLICE_COUNT_MAX) << SLICE_HALF_BITS) | good.min(SLICE_COUNT_MAX)
}

/// Point-in-time view of the policy counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimedRatioStats {
    /// Good pulses not yet evaluated.
    pub pending_good: u64,
    /// Bad pulses not yet evaluated.
    pub pending_bad: u64,
    pub consecutive_bad_resets: u64,
    pub millis_since_last_transition: u64,
    /// Whether the background evaluator is scheduled.
    pub evaluating: bool,
}

/// State shared with the background evaluator.
struct SliceState {
    config: TimedRatioConfig,
    slice: AtomicU64,
    bad_resets: AtomicU64,
    clock: Arc<dyn Clock>,
    origin: Instant,
    last_transition_millis: AtomicU64,
    engine: OnceLock<Weak<TransitionEngine>>,
}

impl SliceState {
    fn now_millis(&self) -> u64 {
        u64::try_from(self.clock.elapsed_since(self.origin).as_millis()).unwrap_or(u64::MAX)
    }

    fn mark_transition(&self) {
        self.last_transition_millis.store(self.now_millis(), Ordering::Release);
    }

    fn millis_since_transition(&self) -> u64 {
        self.now_millis().saturating_sub(self.last_transition_millis.load(Ordering::Acquire))
    }

    fn reset_due(&self) -> bool {
        self.millis_since_transition() >= self.config.reset_after_n_millis
    }

    /// Add to one half of the slice counter; a full half drops the pulse.
    fn bump(&self, unit: u64, half_of: fn(u64) -> u64) {
        let _ = self.slice.fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
            (half_of(word) < SLICE_COUNT_MAX).then(|| word + unit)
        });
    }

    /// Put an undersized slice back so it joins the next one.
    fn carry_over(&self, good: u64, bad: u64) {
        let _ = self.slice.fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
            let (g, b) = split(word);
            Some(join(g.saturating_add(good), b.saturating_add(bad)))
        });
    }

    fn transition(
        &self,
        engine: &TransitionEngine,
        snapshot: StateSnapshot,
        target: State,
    ) -> CircuitResult<bool> {
        let moved = engine.try_transition(snapshot, target)?;
        if moved {
            self.mark_transition();
            if target == State::Closed {
                self.bad_resets.store(0, Ordering::Release);
            }
        }
        Ok(moved)
    }

    /// Cut one slice and act on it.
    fn evaluate(&self, engine: &TransitionEngine) -> CircuitResult<()> {
        let (good, bad) = split(self.slice.swap(0, Ordering::AcqRel));
        let total = good + bad;

        if total < self.config.min_slice_count {
            loop {
                let snapshot = engine.snapshot();
                if snapshot.state() != State::Open {
                    trace!(circuit = %engine.name(), good, bad, "slice too small, carrying over");
                    self.carry_over(good, bad);
                    return Ok(());
                }
                // While open, pulse counts are moot; only time matters.
                if !self.reset_due() || self.transition(engine, snapshot, State::Resetting)? {
                    return Ok(());
                }
                debug!(circuit = %engine.name(), "lost race to reset, re-evaluating");
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let ratio = good as f64 / total as f64;
        let mut failed_resets: Option<u64> = None;
        loop {
            let snapshot = engine.snapshot();
            let target = match snapshot.state() {
                State::Open if self.reset_due() => State::Resetting,
                State::Closed if ratio < self.config.open_at_good_ratio => State::Open,
                State::Resetting if ratio >= self.config.close_at_good_ratio => State::Closed,
                State::Resetting => {
                    let n = *failed_resets.get_or_insert_with(|| saturating_increment(&self.bad_resets));
                    let limit = self.config.fail_after_n_bad_resets;
                    if limit > 0 && n >= limit {
                        State::Failed
                    } else {
                        State::Open
                    }
                }
                State::Open | State::Closed | State::Failed => {
                    trace!(circuit = %engine.name(), good, bad, ratio, "slice evaluated, no change");
                    return Ok(());
                }
            };
            if self.transition(engine, snapshot, target)? {
                info!(
                    circuit = %engine.name(),
                    from = %snapshot.state(),
                    to = %target,
                    good,
                    bad,
                    ratio,
                    "slice evaluation moved circuit"
                );
                return Ok(());
            }
            debug!(circuit = %engine.name(), %target, "lost transition race, re-evaluating");
        }
    }

    /// One scheduled tick. Never unwinds into the scheduler.
    fn tick(&self) {
        let Some(engine) = self.engine.get().and_then(Weak::upgrade) else {
            return;
        };
        match panic::catch_unwind(AssertUnwindSafe(|| self.evaluate(&engine))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(circuit = %engine.name(), error = %err, "slice evaluation failed");
            }
            Err(_) => {
                error!(circuit = %engine.name(), "slice evaluation panicked");
            }
        }
    }
}

/// Ratio-driven transition policy with periodic background evaluation
///
/// The evaluator starts when the policy is bound to a circuit and stops when
/// [`stop`](Self::stop) is called or the policy is dropped. Pending pulse
/// counts are left in place on stop.
pub struct TimedRatioPolicy {
    shared: Arc<SliceState>,
    scheduler: Arc<dyn Scheduler>,
    task: OnceLock<TaskHandle>,
}

impl TimedRatioPolicy {
    /// Policy evaluated on a dedicated thread against the system clock.
    ///
    /// # Errors
    /// [`CircuitError::InvalidConfig`] if a threshold is out of range.
    pub fn new(config: TimedRatioConfig) -> CircuitResult<Self> {
        Self::with_runtime(
            config,
            Arc::new(ThreadScheduler::new("circuitry-timed-ratio")),
            Arc::new(SystemClock),
        )
    }

    /// Policy evaluated on `scheduler`, measuring time with `clock`.
    pub fn with_runtime(
        config: TimedRatioConfig,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> CircuitResult<Self> {
        config.validate()?;
        let origin = clock.now();
        Ok(Self {
            shared: Arc::new(SliceState {
                config,
                slice: AtomicU64::new(0),
                bad_resets: AtomicU64::new(0),
                clock,
                origin,
                last_transition_millis: AtomicU64::new(0),
                engine: OnceLock::new(),
            }),
            scheduler,
            task: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &TimedRatioConfig {
        &self.shared.config
    }

    /// Cancel future evaluations. Idempotent.
    pub fn stop(&self) {
        if let Some(task) = self.task.get() {
            if !task.is_cancelled() {
                debug!("stopping slice evaluator");
                task.cancel();
            }
        }
    }

    /// Whether the background evaluator is scheduled.
    pub fn is_evaluating(&self) -> bool {
        self.task.get().is_some_and(|task| !task.is_cancelled())
    }

    pub fn stats(&self) -> TimedRatioStats {
        let (pending_good, pending_bad) = split(self.shared.slice.load(Ordering::Acquire));
        TimedRatioStats {
            pending_good,
            pending_bad,
            consecutive_bad_resets: self.shared.bad_resets.load(Ordering::Acquire),
            millis_since_last_transition: self.shared.millis_since_transition(),
            evaluating: self.is_evaluating(),
        }
    }
}

impl TransitionPolicy for TimedRatioPolicy {
    fn bind(&self, engine: &Arc<TransitionEngine>) -> CircuitResult<()> {
        self.shared.engine.set(Arc::downgrade(engine)).map_err(|_| CircuitError::AlreadyBound)?;
        self.shared.mark_transition();

        let period = Duration::from_millis(self.shared.config.eval_every_n_millis);
        let shared = Arc::clone(&self.shared);
        let handle = self.scheduler.schedule_at_fixed_rate(period, Box::new(move || shared.tick()))?;
        // `engine` is set at most once, so the task slot is still empty.
        let _ = self.task.set(handle);

        debug!(circuit = %engine.name(), ?period, "slice evaluator scheduled");
        Ok(())
    }

    fn on_good_pulse(&self, _engine: &TransitionEngine) -> CircuitResult<()> {
        self.shared.bump(1, |word| split(word).0);
        Ok(())
    }

    fn on_bad_pulse(&self, engine: &TransitionEngine, cause: PulseCause<'_>) -> CircuitResult<()> {
        if let Some(cause) = cause {
            trace!(circuit = %engine.name(), error = %cause, "bad pulse");
        }
        self.shared.bump(BAD_UNIT, |word| split(word).1);
        Ok(())
    }

    fn on_alt_pulse(&self, _engine: &TransitionEngine) -> CircuitResult<()> {
        Ok(())
    }

    fn after_direct_transition(&self, _engine: &TransitionEngine, desired: State, _force: bool) {
        self.shared.mark_transition();
        if matches!(desired, State::Closed | State::Resetting) {
            self.shared.bad_resets.store(0, Ordering::Release);
        }
    }
}

impl Drop for TimedRatioPolicy {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for TimedRatioPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimedRatioPolicy")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}
