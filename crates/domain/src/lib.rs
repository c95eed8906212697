//! # Circuitry Domain
//!
//! Pure circuit breaker domain types for Circuitry.
//!
//! This crate contains:
//! - The circuit [`State`] and its composite [`StateSnapshot`] encoding
//! - The legal transition graph
//! - Domain error types and Result definitions
//! - Policy configuration structures
//!
//! ## Architecture
//! - No dependencies on other Circuitry crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
