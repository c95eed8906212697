//! Error types used throughout the circuit breaker

use thiserror::Error;

use crate::types::State;

/// Main error type for Circuitry
///
/// Every variant is a precondition violation or an environment failure. Losing
/// a transition race is never an error: `try_transition` reports it as
/// `Ok(false)`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CircuitError {
    /// A transition edge outside the legal graph was requested.
    #[error("Can't transition from {from} to {to}")]
    InvalidTransition { from: State, to: State },

    /// A state name or raw state value was not recognized.
    #[error("Unrecognized state: {0}")]
    UnknownState(String),

    /// Policy thresholds failed validation at construction.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The policy has already been bound to an engine.
    #[error("Policy is already bound to a circuit")]
    AlreadyBound,

    /// The background scheduler could not start a recurring task.
    #[error("Scheduler error: {0}")]
    Scheduler(String),
}

impl CircuitError {
    /// Shorthand for [`CircuitError::InvalidConfig`].
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}

/// Result type alias for Circuitry operations
pub type CircuitResult<T> = std::result::Result<T, CircuitError>;
