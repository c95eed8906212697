//! Transition engine
//!
//! The engine owns the [`StateCell`] and is the only code that swaps it. It
//! implements the two transition primitives every policy builds on:
//!
//! - [`TransitionEngine::try_transition`]: optimistic, from a snapshot the
//!   caller read earlier. Losing a race returns `Ok(false)`; a request whose
//!   target is already current returns `Ok(true)` without a swap.
//! - [`TransitionEngine::force_transition`]: administrative, retries until
//!   the cell holds the target, ignoring the legal graph.
//!
//! Every accepted, non-redundant transition is reported to the registered
//! listeners exactly once, after the swap commits and before the call
//! returns.

use std::fmt;
use std::sync::Arc;

use circuitry_domain::{
    is_valid_transition, CircuitError, CircuitResult, State, StateSnapshot, Transition,
};
use tracing::{debug, warn};

use super::cell::StateCell;
use super::listener::TransitionListener;

/// Validates and performs state transitions on one circuit
pub struct TransitionEngine {
    name: String,
    cell: StateCell,
    strict: bool,
    listeners: Vec<Arc<dyn TransitionListener>>,
}

impl TransitionEngine {
    /// Non-strict engine with no listeners.
    pub fn new(name: impl Into<String>) -> Self {
        Self::builder().name(name).build()
    }

    pub fn builder() -> TransitionEngineBuilder {
        TransitionEngineBuilder::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `try_transition` rejects illegal edges.
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Lock-free read of `{state, generation}`.
    #[inline]
    pub fn snapshot(&self) -> StateSnapshot {
        self.cell.load()
    }

    #[inline]
    pub fn state(&self) -> State {
        self.cell.state()
    }

    /// Move from `expected` to `desired`.
    ///
    /// Returns `Ok(true)` if this call swapped the cell, or if the cell
    /// already holds `desired` (the request was redundant). Returns
    /// `Ok(false)` when the cell moved on to some other state since
    /// `expected` was read. The redundant case does not re-check the edge
    /// the caller originally meant to take.
    ///
    /// # Errors
    /// In strict mode, [`CircuitError::InvalidTransition`] when
    /// `expected.state() -> desired` is not an edge of the state graph.
    pub fn try_transition(&self, expected: StateSnapshot, desired: State) -> CircuitResult<bool> {
        let from = expected.state();
        if self.strict && !is_valid_transition(from, desired) {
            return Err(CircuitError::InvalidTransition { from, to: desired });
        }

        // Self-edge: nothing to swap.
        if from == desired {
            return Ok(self.state() == desired);
        }

        let next = expected.advance(desired);
        match self.cell.compare_exchange(expected, next) {
            Ok(_) => {
                self.notify(from, desired, next.generation());
                Ok(true)
            }
            Err(actual) => {
                let redundant = actual.state() == desired;
                debug!(
                    circuit = %self.name,
                    expected = %expected,
                    actual = %actual,
                    %desired,
                    redundant,
                    "lost transition race"
                );
                Ok(redundant)
            }
        }
    }

    /// Move to `desired` regardless of the current state or the graph.
    ///
    /// Returns whether this call changed the state. `false` means the cell
    /// already held `desired` (possibly because a racing call got there
    /// first).
    pub fn force_transition(&self, desired: State) -> bool {
        let mut current = self.snapshot();
        loop {
            if current.state() == desired {
                return false;
            }
            let next = current.advance(desired);
            match self.cell.compare_exchange(current, next) {
                Ok(_) => {
                    warn!(
                        circuit = %self.name,
                        from = %current.state(),
                        to = %desired,
                        generation = next.generation(),
                        "forced circuit transition"
                    );
                    self.notify(current.state(), desired, next.generation());
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn notify(&self, from: State, to: State, generation: u64) {
        let transition = Transition { from, to, generation };
        for listener in &self.listeners {
            listener.on_transition(transition);
        }
    }
}

impl fmt::Debug for TransitionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionEngine")
            .field("name", &self.name)
            .field("snapshot", &self.snapshot())
            .field("strict", &self.strict)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Builder for [`TransitionEngine`]
#[derive(Default)]
pub struct TransitionEngineBuilder {
    name: Option<String>,
    strict: bool,
    listeners: Vec<Arc<dyn TransitionListener>>,
}

impl TransitionEngineBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Add a listener. Listeners are called in registration order.
    pub fn listener(mut self, listener: Arc<dyn TransitionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn build(self) -> TransitionEngine {
        TransitionEngine {
            name: self.name.unwrap_or_else(|| "circuit".to_string()),
            cell: StateCell::new(),
            strict: self.strict,
            listeners: self.listeners,
        }
    }
}
