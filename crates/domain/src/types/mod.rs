//! Domain types and models

pub mod state;

pub use state::{is_valid_transition, State, StateSnapshot, Transition};
