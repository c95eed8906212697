//! # Circuitry Core
//!
//! Lock-free circuit breaker state machine and its transition policies.
//!
//! This crate contains:
//! - The [`StateCell`] and the [`TransitionEngine`] that guards it
//! - The [`TransitionPolicy`] trait and its counted, timed-ratio and inert
//!   implementations
//! - The caller-facing [`CircuitBreaker`]
//! - Configuration loading from files and the environment
//!
//! ## Architecture Principles
//! - No operation on the pulse or query path takes a lock
//! - Every shared mutable value is one atomic word
//! - Losing a race is an ordinary outcome, never an error
//!
//! ## Usage
//!
//! ```rust
//! use circuitry_core::{CircuitBreaker, CountedTransitionPolicy};
//! use circuitry_domain::{CountedPolicyConfig, State};
//!
//! let policy = CountedTransitionPolicy::new(CountedPolicyConfig::new(2, 1, 1, 0)).unwrap();
//! let breaker = CircuitBreaker::new("inventory", policy).unwrap();
//!
//! if breaker.should_try_normal_path() {
//!     // ... do the real work, then report the outcome
//!     breaker.on_bad_pulse(None).unwrap();
//!     breaker.on_bad_pulse(None).unwrap();
//! }
//! assert_eq!(breaker.state(), State::Open);
//! ```

pub mod breaker;
pub mod circuit;
pub mod config;
pub mod policy;

// Re-export specific items to avoid ambiguity
pub use breaker::CircuitBreaker;
pub use circuit::{
    LoggingListener, StateCell, TransitionEngine, TransitionEngineBuilder, TransitionListener,
    TransitionRecorder,
};
pub use config::loader;
pub use policy::{
    CountedPolicyStats, CountedTransitionPolicy, InertTransitionPolicy, TimedRatioPolicy,
    TimedRatioStats, TransitionPolicy,
};
