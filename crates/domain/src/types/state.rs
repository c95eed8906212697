//! Circuit states and the composite snapshot word
//!
//! A circuit is always in exactly one [`State`]. The engine stores the state
//! together with a generation counter in one machine word, so a single atomic
//! load tells a reader both *what* the state is and *whether anything changed*
//! since its previous read.
//!
//! ```text
//!    CLOSED    --bad pulses-->   OPEN
//!    OPEN      --reset due-->    RESETTING
//!    RESETTING --good pulses-->  CLOSED
//!    RESETTING --bad pulses-->   OPEN
//!    RESETTING --enough bad-->   FAILED
//!    FAILED    --manual reset--> RESETTING
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{GENERATION_INCREMENT, STATE_MASK};
use crate::errors::{CircuitError, CircuitResult};

/// Condition of the workflow protected by a circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum State {
    /// Normal workflow is active; the system is healthy.
    Closed = 0,
    /// Tripped by some kind of problem; the alternate workflow should be used.
    Open = 1,
    /// Probation after `Open` or `Failed`, hoping to see health again.
    Resetting = 2,
    /// Permanent failure. Only a manual reset leaves this state.
    Failed = 3,
}

impl State {
    /// All states in raw-value order.
    pub const ALL: [State; 4] = [State::Closed, State::Open, State::Resetting, State::Failed];

    /// Canonical upper-case name.
    pub const fn as_str(self) -> &'static str {
        match self {
            State::Closed => "CLOSED",
            State::Open => "OPEN",
            State::Resetting => "RESETTING",
            State::Failed => "FAILED",
        }
    }

    /// Raw two-bit encoding used inside a [`StateSnapshot`].
    pub const fn bits(self) -> u8 {
        self as u8
    }

    /// Whether callers in this state should attempt the normal path without
    /// consulting the policy.
    pub const fn allows_normal_path(self) -> bool {
        matches!(self, State::Closed | State::Resetting)
    }

    // Masked to two bits, so every value maps to a state.
    const fn from_masked(bits: u64) -> Self {
        match bits & STATE_MASK {
            0 => State::Closed,
            1 => State::Open,
            2 => State::Resetting,
            _ => State::Failed,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = CircuitError;

    /// Case-insensitive parse of the canonical names.
    fn from_str(s: &str) -> CircuitResult<Self> {
        State::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CircuitError::UnknownState(s.to_string()))
    }
}

impl TryFrom<u8> for State {
    type Error = CircuitError;

    fn try_from(value: u8) -> CircuitResult<Self> {
        match value {
            0 => Ok(State::Closed),
            1 => Ok(State::Open),
            2 => Ok(State::Resetting),
            3 => Ok(State::Failed),
            other => Err(CircuitError::UnknownState(other.to_string())),
        }
    }
}

impl From<State> for u8 {
    fn from(state: State) -> Self {
        state.bits()
    }
}

/// Whether `from -> to` is an edge of the circuit state machine.
///
/// Self-edges are always legal; they are no-ops.
pub const fn is_valid_transition(from: State, to: State) -> bool {
    matches!(
        (from, to),
        (State::Closed, State::Closed | State::Open)
            | (State::Open, State::Open | State::Resetting)
            | (State::Resetting, _)
            | (State::Failed, State::Failed | State::Resetting)
    )
}

/// Opaque composite word: `(generation << 2) | state`
///
/// Equality of two snapshots means no accepted transition happened between
/// the two reads. Generations wrap; only exact equality is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateSnapshot(u64);

impl StateSnapshot {
    /// Snapshot of a freshly created circuit: `Closed`, generation zero.
    pub const INITIAL: StateSnapshot = StateSnapshot(State::Closed as u64);

    /// Rebuild a snapshot from its raw word.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw word, as stored in the state cell.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// State encoded in the low bits.
    pub const fn state(self) -> State {
        State::from_masked(self.0)
    }

    /// Number of accepted transitions so far (modulo wrap).
    pub const fn generation(self) -> u64 {
        self.0 >> crate::constants::STATE_BITS
    }

    /// Snapshot one generation later, holding `desired`.
    pub const fn advance(self, desired: State) -> Self {
        Self((self.0 & !STATE_MASK).wrapping_add(GENERATION_INCREMENT) | desired as u64)
    }
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.state(), self.generation())
    }
}

/// One accepted, non-redundant state change as reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: State,
    pub to: State,
    /// Generation of the snapshot that committed this change.
    pub generation: u64,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {} (generation {})", self.from, self.to, self.generation)
    }
}
