//! Atomic holder of the composite state word

use std::sync::atomic::{AtomicU64, Ordering};

use circuitry_domain::{State, StateSnapshot};

/// The single atomic word behind a circuit
///
/// Created at `Closed`, generation zero. All changes go through
/// [`compare_exchange`](Self::compare_exchange), so the generation counts
/// accepted transitions exactly.
#[derive(Debug)]
pub struct StateCell {
    word: AtomicU64,
}

impl StateCell {
    pub fn new() -> Self {
        Self { word: AtomicU64::new(StateSnapshot::INITIAL.raw()) }
    }

    /// Lock-free read of the current snapshot.
    #[inline]
    pub fn load(&self) -> StateSnapshot {
        StateSnapshot::from_raw(self.word.load(Ordering::Acquire))
    }

    #[inline]
    pub fn state(&self) -> State {
        self.load().state()
    }

    /// Replace `current` with `new` if the word still equals `current`.
    ///
    /// On failure returns the snapshot actually found.
    #[inline]
    pub fn compare_exchange(
        &self,
        current: StateSnapshot,
        new: StateSnapshot,
    ) -> Result<StateSnapshot, StateSnapshot> {
        self.word
            .compare_exchange(current.raw(), new.raw(), Ordering::AcqRel, Ordering::Acquire)
            .map(StateSnapshot::from_raw)
            .map_err(StateSnapshot::from_raw)
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cell_is_closed_generation_zero() {
        let cell = StateCell::new();
        assert_eq!(cell.load(), StateSnapshot::INITIAL);
        assert_eq!(cell.state(), State::Closed);
    }

    #[test]
    fn test_compare_exchange_requires_exact_snapshot() {
        let cell = StateCell::new();
        let s0 = cell.load();
        let s1 = s0.advance(State::Open);

        assert_eq!(cell.compare_exchange(s0, s1), Ok(s0));
        // Stale expectation fails and reports what was found
        assert_eq!(cell.compare_exchange(s0, s0.advance(State::Open)), Err(s1));
        assert_eq!(cell.load(), s1);
    }
}
