//! Transition policies
//!
//! A policy turns a stream of pulses into state transitions. The breaker
//! forwards every pulse to its policy together with a borrowed engine; the
//! policy keeps its own counters in single atomic words and calls
//! [`TransitionEngine::try_transition`] when a threshold is crossed.
//!
//! - **[`counted`]**: consecutive-pulse thresholds
//! - **[`timed_ratio`]**: good-ratio thresholds evaluated per time slice
//! - **[`inert`]**: ignores pulses entirely

use std::error::Error;
use std::sync::Arc;

use circuitry_domain::{CircuitResult, State};

use crate::circuit::TransitionEngine;

pub mod counted;
pub mod inert;
pub mod timed_ratio;

pub use counted::{CountedPolicyStats, CountedTransitionPolicy};
pub use inert::InertTransitionPolicy;
pub use timed_ratio::{TimedRatioPolicy, TimedRatioStats};

/// Source of a bad pulse, if the caller has one.
pub type PulseCause<'a> = Option<&'a (dyn Error + 'static)>;

/// Decides when a circuit changes state
///
/// Pulse reactions must not block. A returned error is a precondition
/// violation (strict-mode illegal edge), never a lost race.
pub trait TransitionPolicy: Send + Sync {
    /// Called once when the policy is attached to `engine`.
    ///
    /// Policies that act in the background keep a `Weak` to the engine.
    fn bind(&self, _engine: &Arc<TransitionEngine>) -> CircuitResult<()> {
        Ok(())
    }

    /// The normal path succeeded.
    fn on_good_pulse(&self, engine: &TransitionEngine) -> CircuitResult<()>;

    /// The normal path failed.
    fn on_bad_pulse(&self, engine: &TransitionEngine, cause: PulseCause<'_>) -> CircuitResult<()>;

    /// The caller took the alternate path.
    fn on_alt_pulse(&self, engine: &TransitionEngine) -> CircuitResult<()>;

    /// Consulted while `Open`: is an automatic reset attempt due?
    fn should_attempt_reset(&self, _engine: &TransitionEngine) -> bool {
        false
    }

    /// Veto hook for manual transitions. Return `false` to refuse.
    fn before_direct_transition(
        &self,
        _engine: &TransitionEngine,
        _desired: State,
        _force: bool,
    ) -> bool {
        true
    }

    /// Runs after a manual transition succeeded.
    fn after_direct_transition(&self, _engine: &TransitionEngine, _desired: State, _force: bool) {}
}

impl<P: TransitionPolicy + ?Sized> TransitionPolicy for Box<P> {
    fn bind(&self, engine: &Arc<TransitionEngine>) -> CircuitResult<()> {
        (**self).bind(engine)
    }

    fn on_good_pulse(&self, engine: &TransitionEngine) -> CircuitResult<()> {
        (**self).on_good_pulse(engine)
    }

    fn on_bad_pulse(&self, engine: &TransitionEngine, cause: PulseCause<'_>) -> CircuitResult<()> {
        (**self).on_bad_pulse(engine, cause)
    }

    fn on_alt_pulse(&self, engine: &TransitionEngine) -> CircuitResult<()> {
        (**self).on_alt_pulse(engine)
    }

    fn should_attempt_reset(&self, engine: &TransitionEngine) -> bool {
        (**self).should_attempt_reset(engine)
    }

    fn before_direct_transition(
        &self,
        engine: &TransitionEngine,
        desired: State,
        force: bool,
    ) -> bool {
        (**self).before_direct_transition(engine, desired, force)
    }

    fn after_direct_transition(&self, engine: &TransitionEngine, desired: State, force: bool) {
        (**self).after_direct_transition(engine, desired, force)
    }
}

/// Increment an atomic counter by one, saturating. Returns the new value.
pub(crate) fn saturating_increment(counter: &std::sync::atomic::AtomicU64) -> u64 {
    use std::sync::atomic::Ordering;

    let previous = counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_add(1)))
        .unwrap_or_else(|n| n);
    previous.saturating_add(1)
}

/// Decrement an atomic counter by one, stopping at zero.
pub(crate) fn saturating_decrement(counter: &std::sync::atomic::AtomicU64) {
    use std::sync::atomic::Ordering;

    let _ = counter.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_sub(1)));
}
