//! Policy that never moves the circuit on its own

use circuitry_domain::CircuitResult;

use super::{PulseCause, TransitionPolicy};
use crate::circuit::TransitionEngine;

/// Ignores every pulse
///
/// The circuit changes only through `CircuitBreaker::direct_transition`,
/// which makes this the policy for circuits driven by an operator or an
/// external health check.
#[derive(Debug, Clone, Copy, Default)]
pub struct InertTransitionPolicy;

impl TransitionPolicy for InertTransitionPolicy {
    fn on_good_pulse(&self, _engine: &TransitionEngine) -> CircuitResult<()> {
        Ok(())
    }

    fn on_bad_pulse(&self, _engine: &TransitionEngine, _cause: PulseCause<'_>) -> CircuitResult<()> {
        Ok(())
    }

    fn on_alt_pulse(&self, _engine: &TransitionEngine) -> CircuitResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use circuitry_domain::State;

    use super::*;

    #[test]
    fn test_inert_policy_ignores_pulses() {
        let engine = TransitionEngine::new("inert");
        let policy = InertTransitionPolicy;
        for _ in 0..100 {
            policy.on_bad_pulse(&engine, None).unwrap();
            policy.on_alt_pulse(&engine).unwrap();
            policy.on_good_pulse(&engine).unwrap();
        }
        assert_eq!(engine.state(), State::Closed);
        assert_eq!(engine.snapshot().generation(), 0);
        assert!(!policy.should_attempt_reset(&engine));
    }
}
