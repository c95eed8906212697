//! The circuit itself: one atomic state word and the engine that moves it
//!
//! - **[`cell`]**: the composite `{state, generation}` word
//! - **[`engine`]**: validated and forced transitions plus notification
//! - **[`listener`]**: transition observers

pub mod cell;
pub mod engine;
pub mod listener;

pub use cell::StateCell;
pub use engine::{TransitionEngine, TransitionEngineBuilder};
pub use listener::{LoggingListener, TransitionListener, TransitionRecorder};
