//! Caller-facing circuit breaker
//!
//! A breaker pairs one [`TransitionEngine`] with one [`TransitionPolicy`].
//! Application code asks [`CircuitBreaker::should_try_normal_path`], does the
//! normal or alternate work, and reports the outcome as a pulse.
//!
//! ```rust
//! use circuitry_core::{CircuitBreaker, InertTransitionPolicy};
//! use circuitry_domain::State;
//!
//! let breaker = CircuitBreaker::new("billing", InertTransitionPolicy).unwrap();
//! assert!(breaker.should_try_normal_path());
//!
//! // Operator trips the circuit by hand
//! breaker.direct_transition(State::Open, false).unwrap();
//! assert!(!breaker.should_try_normal_path());
//! ```

use std::sync::Arc;

use circuitry_common::time::{Clock, Scheduler, SystemClock, ThreadScheduler};
use circuitry_domain::{
    is_valid_transition, BreakerConfig, CircuitError, CircuitResult, PolicyConfig, State,
    StateSnapshot,
};
use tracing::{debug, info, warn};

use crate::circuit::{TransitionEngine, TransitionListener};
use crate::policy::{
    CountedTransitionPolicy, InertTransitionPolicy, PulseCause, TimedRatioPolicy, TransitionPolicy,
};

/// A circuit breaker driven by policy `P`
///
/// The breaker owns its policy, so a policy is bound to exactly one circuit.
pub struct CircuitBreaker<P: TransitionPolicy> {
    engine: Arc<TransitionEngine>,
    policy: P,
}

impl<P: TransitionPolicy> CircuitBreaker<P> {
    /// Non-strict breaker with no listeners.
    ///
    /// # Errors
    /// Whatever the policy's `bind` reports.
    pub fn new(name: impl Into<String>, policy: P) -> CircuitResult<Self> {
        Self::with_engine(TransitionEngine::new(name), policy)
    }

    /// Breaker around a pre-configured engine.
    pub fn with_engine(engine: TransitionEngine, policy: P) -> CircuitResult<Self> {
        let engine = Arc::new(engine);
        policy.bind(&engine)?;
        debug!(circuit = %engine.name(), strict = engine.is_strict(), "circuit breaker created");
        Ok(Self { engine, policy })
    }

    #[inline]
    pub fn state(&self) -> State {
        self.engine.state()
    }

    #[inline]
    pub fn snapshot(&self) -> StateSnapshot {
        self.engine.snapshot()
    }

    pub fn name(&self) -> &str {
        self.engine.name()
    }

    pub fn engine(&self) -> &Arc<TransitionEngine> {
        &self.engine
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Should the caller attempt the normal path right now?
    ///
    /// While `Open`, asks the policy whether a reset attempt is due and, if
    /// so, moves the circuit to `Resetting`.
    pub fn should_try_normal_path(&self) -> bool {
        let snapshot = self.engine.snapshot();
        let state = snapshot.state();
        if state.allows_normal_path() {
            return true;
        }
        if state != State::Open || !self.policy.should_attempt_reset(&self.engine) {
            return false;
        }
        // Open -> Resetting is always a legal edge.
        match self.engine.try_transition(snapshot, State::Resetting) {
            Ok(moved) => moved,
            Err(err) => {
                warn!(circuit = %self.engine.name(), error = %err, "reset attempt rejected");
                false
            }
        }
    }

    pub fn on_good_pulse(&self) -> CircuitResult<()> {
        self.policy.on_good_pulse(&self.engine)
    }

    pub fn on_bad_pulse(&self, cause: PulseCause<'_>) -> CircuitResult<()> {
        self.policy.on_bad_pulse(&self.engine, cause)
    }

    pub fn on_alt_pulse(&self) -> CircuitResult<()> {
        self.policy.on_alt_pulse(&self.engine)
    }

    /// Manual transition, e.g. from an operator console.
    ///
    /// The policy may veto (`Ok(false)`). With `force`, the graph and the
    /// current state are ignored; otherwise the edge from the current state
    /// must be legal. Returns whether the circuit now holds `desired` because
    /// of this request.
    ///
    /// # Errors
    /// [`CircuitError::InvalidTransition`] for an illegal non-forced edge.
    pub fn direct_transition(&self, desired: State, force: bool) -> CircuitResult<bool> {
        if !self.policy.before_direct_transition(&self.engine, desired, force) {
            warn!(circuit = %self.engine.name(), %desired, force, "direct transition vetoed");
            return Ok(false);
        }

        let accepted = if force {
            self.engine.force_transition(desired);
            true
        } else {
            let snapshot = self.engine.snapshot();
            let from = snapshot.state();
            if !is_valid_transition(from, desired) {
                return Err(CircuitError::InvalidTransition { from, to: desired });
            }
            self.engine.try_transition(snapshot, desired)?
        };

        if accepted {
            info!(circuit = %self.engine.name(), %desired, force, "direct transition applied");
            self.policy.after_direct_transition(&self.engine, desired, force);
        }
        Ok(accepted)
    }
}

impl CircuitBreaker<Box<dyn TransitionPolicy>> {
    /// Build a breaker from configuration.
    ///
    /// A timed-ratio policy is evaluated on its own thread against the system
    /// clock; use [`from_config_with_runtime`](Self::from_config_with_runtime)
    /// to choose both.
    pub fn from_config(
        config: &BreakerConfig,
        listener: Option<Arc<dyn TransitionListener>>,
    ) -> CircuitResult<Self> {
        Self::from_config_with_runtime(
            config,
            listener,
            Arc::new(ThreadScheduler::new(format!("{}-eval", config.name))),
            Arc::new(SystemClock),
        )
    }

    pub fn from_config_with_runtime(
        config: &BreakerConfig,
        listener: Option<Arc<dyn TransitionListener>>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
    ) -> CircuitResult<Self> {
        config.validate()?;

        let policy: Box<dyn TransitionPolicy> = match &config.policy {
            PolicyConfig::Counted(counted) => Box::new(CountedTransitionPolicy::new(*counted)?),
            PolicyConfig::TimedRatio(timed) => {
                Box::new(TimedRatioPolicy::with_runtime(*timed, scheduler, clock)?)
            }
            PolicyConfig::Inert => Box::new(InertTransitionPolicy),
        };

        let mut builder =
            TransitionEngine::builder().name(config.name.clone()).strict(config.strict_validation);
        if let Some(listener) = listener {
            builder = builder.listener(listener);
        }
        Self::with_engine(builder.build(), policy)
    }
}

impl<P: TransitionPolicy + std::fmt::Debug> std::fmt::Debug for CircuitBreaker<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("engine", &self.engine)
            .field("policy", &self.policy)
            .finish()
    }
}
