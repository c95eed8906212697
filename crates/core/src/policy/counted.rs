//! Consecutive-pulse counting policy
//!
//! All rules are counts of identical pulses in a row: open after N bads,
//! try a reset after M alts, accept the reset after K goods, fail after F
//! failed resets.
//!
//! The streak lives in one atomic word so kind and count always change
//! together:
//!
//! ```text
//!   63                                  2  1   0
//!  +--------------------------------------+-------+
//!  |              count (saturating)      | kind  |
//!  +--------------------------------------+-------+
//!                                    good=0 bad=1 alt=2
//! ```
//!
//! Under heavy concurrency pulses interleave, so low thresholds produce
//! fuzzy transitions. Size thresholds to the expected pulse rate.

use std::sync::atomic::{AtomicU64, Ordering};

use circuitry_domain::{CircuitResult, CountedPolicyConfig, State};
use serde::Serialize;
use tracing::{debug, trace};

use super::{saturating_decrement, saturating_increment, PulseCause, TransitionPolicy};
use crate::circuit::TransitionEngine;

const KIND_BITS: u32 = 2;
const KIND_MASK: u64 = 0b11;
const COUNT_MAX: u64 = u64::MAX >> KIND_BITS;

/// Kind of the most recent pulse run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PulseKind {
    Good = 0,
    Bad = 1,
    Alt = 2,
}

impl PulseKind {
    const fn from_bits(bits: u64) -> Self {
        match bits & KIND_MASK {
            1 => PulseKind::Bad,
            2 => PulseKind::Alt,
            _ => PulseKind::Good,
        }
    }
}

/// Decoded streak word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Streak {
    pub kind: PulseKind,
    pub count: u64,
}

impl Streak {
    const fn decode(word: u64) -> Self {
        Self { kind: PulseKind::from_bits(word), count: word >> KIND_BITS }
    }

    const fn encode(self) -> u64 {
        (self.count << KIND_BITS) | self.kind as u64
    }

    /// Streak after one more pulse of `kind`.
    fn record(self, kind: PulseKind) -> Self {
        let count = if self.kind == kind && self.count > 0 {
            self.count.saturating_add(1).min(COUNT_MAX)
        } else {
            1
        };
        Self { kind, count }
    }
}

/// Point-in-time view of the policy counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountedPolicyStats {
    pub streak: Streak,
    pub consecutive_bad_resets: u64,
}

/// Threshold-counting transition policy
#[derive(Debug)]
pub struct CountedTransitionPolicy {
    config: CountedPolicyConfig,
    streak: AtomicU64,
    bad_resets: AtomicU64,
}

impl CountedTransitionPolicy {
    /// # Errors
    /// [`CircuitError::InvalidConfig`](circuitry_domain::CircuitError) if a
    /// required threshold is zero.
    pub fn new(config: CountedPolicyConfig) -> CircuitResult<Self> {
        config.validate()?;
        Ok(Self { config, streak: AtomicU64::new(0), bad_resets: AtomicU64::new(0) })
    }

    pub fn config(&self) -> &CountedPolicyConfig {
        &self.config
    }

    pub fn streak(&self) -> Streak {
        Streak::decode(self.streak.load(Ordering::Acquire))
    }

    pub fn consecutive_bad_resets(&self) -> u64 {
        self.bad_resets.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> CountedPolicyStats {
        CountedPolicyStats {
            streak: self.streak(),
            consecutive_bad_resets: self.consecutive_bad_resets(),
        }
    }

    /// Fold one pulse into the streak word. Returns the updated streak.
    fn record(&self, kind: PulseKind) -> Streak {
        let previous = self
            .streak
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                Some(Streak::decode(word).record(kind).encode())
            })
            .unwrap_or_else(|word| word);
        Streak::decode(previous).record(kind)
    }

    /// Where a bad pulse should move a circuit seen in `state`, if anywhere.
    ///
    /// `failed_resets` caches this pulse's bad-reset count across dispatch
    /// retries. A pulse that counted a failed reset and then finds the
    /// probation already ended takes its count back.
    fn bad_pulse_target(&self, state: State, streak: Streak, failed_resets: &mut Option<u64>) -> Option<State> {
        if state != State::Resetting && failed_resets.take().is_some() {
            saturating_decrement(&self.bad_resets);
        }
        match state {
            State::Resetting => {
                let n = *failed_resets.get_or_insert_with(|| saturating_increment(&self.bad_resets));
                let limit = self.config.fail_after_n_bad_resets;
                if limit > 0 && n >= limit {
                    Some(State::Failed)
                } else {
                    Some(State::Open)
                }
            }
            State::Closed if streak.count >= self.config.open_after_n_bads => Some(State::Open),
            State::Closed | State::Open | State::Failed => None,
        }
    }
}

impl TransitionPolicy for CountedTransitionPolicy {
    fn on_good_pulse(&self, engine: &TransitionEngine) -> CircuitResult<()> {
        let streak = self.record(PulseKind::Good);
        if streak.count < self.config.accept_reset_after_n_goods {
            return Ok(());
        }

        loop {
            let snapshot = engine.snapshot();
            if snapshot.state() != State::Resetting {
                return Ok(());
            }
            if engine.try_transition(snapshot, State::Closed)? {
                self.bad_resets.store(0, Ordering::Release);
                return Ok(());
            }
            trace!(circuit = %engine.name(), "retrying reset acceptance");
        }
    }

    fn on_bad_pulse(&self, engine: &TransitionEngine, cause: PulseCause<'_>) -> CircuitResult<()> {
        let streak = self.record(PulseKind::Bad);
        if let Some(cause) = cause {
            debug!(circuit = %engine.name(), bads = streak.count, error = %cause, "bad pulse");
        }

        // Counted at most once per pulse, however often the dispatch restarts.
        let mut failed_resets: Option<u64> = None;
        loop {
            let snapshot = engine.snapshot();
            let Some(target) = self.bad_pulse_target(snapshot.state(), streak, &mut failed_resets) else {
                return Ok(());
            };
            if engine.try_transition(snapshot, target)? {
                return Ok(());
            }
            trace!(circuit = %engine.name(), %target, "retrying bad pulse dispatch");
        }
    }

    fn on_alt_pulse(&self, _engine: &TransitionEngine) -> CircuitResult<()> {
        self.record(PulseKind::Alt);
        Ok(())
    }

    fn should_attempt_reset(&self, _engine: &TransitionEngine) -> bool {
        let threshold = self.config.try_reset_after_n_alts;
        if threshold == 0 {
            return false;
        }
        let streak = self.streak();
        streak.kind == PulseKind::Alt && streak.count >= threshold
    }

    fn after_direct_transition(&self, _engine: &TransitionEngine, desired: State, _force: bool) {
        if matches!(desired, State::Closed | State::Resetting) {
            self.bad_resets.store(0, Ordering::Release);
        }
    }
}
