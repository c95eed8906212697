//! Transition listeners
//!
//! Listeners run synchronously on whichever thread won the transition, so
//! they must be quick and must not call back into the engine.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use circuitry_domain::{State, Transition};
use tracing::info;

/// Observer of accepted, non-redundant transitions
pub trait TransitionListener: Send + Sync {
    fn on_transition(&self, transition: Transition);
}

impl<F> TransitionListener for F
where
    F: Fn(Transition) + Send + Sync,
{
    fn on_transition(&self, transition: Transition) {
        self(transition);
    }
}

/// Emits one `tracing` event per transition
#[derive(Debug, Clone)]
pub struct LoggingListener {
    circuit: String,
}

impl LoggingListener {
    pub fn new(circuit: impl Into<String>) -> Self {
        Self { circuit: circuit.into() }
    }
}

impl TransitionListener for LoggingListener {
    fn on_transition(&self, transition: Transition) {
        info!(
            circuit = %self.circuit,
            from = %transition.from,
            to = %transition.to,
            generation = transition.generation,
            "circuit transition"
        );
    }
}

/// Collects every notified transition, in notification order
///
/// Useful for auditing and for asserting on state traces in tests.
#[derive(Debug, Default)]
pub struct TransitionRecorder {
    transitions: Mutex<Vec<Transition>>,
}

impl TransitionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.lock().clone()
    }

    /// State trace: the first `from`, then every `to`.
    ///
    /// Empty if nothing has been recorded.
    pub fn states(&self) -> Vec<State> {
        let transitions = self.lock();
        let mut states = Vec::with_capacity(transitions.len() + 1);
        if let Some(first) = transitions.first() {
            states.push(first.from);
        }
        states.extend(transitions.iter().map(|t| t.to));
        states
    }

    /// Number of transitions into each state.
    pub fn counts(&self) -> HashMap<State, usize> {
        let mut counts = HashMap::new();
        for transition in self.lock().iter() {
            *counts.entry(transition.to).or_insert(0) += 1;
        }
        counts
    }

    /// Transitions into `state`.
    pub fn count(&self, state: State) -> usize {
        self.lock().iter().filter(|t| t.to == state).count()
    }

    pub fn final_state(&self) -> Option<State> {
        self.lock().last().map(|t| t.to)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Transition>> {
        self.transitions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TransitionListener for TransitionRecorder {
    fn on_transition(&self, transition: Transition) {
        self.lock().push(transition);
    }
}
