//! Shared test helpers for `circuitry-core` integration tests.
//!
//! These helpers build recorded engines and a deterministic runtime so that
//! the scenarios can focus on pulse sequences instead of wiring.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use circuitry_common::testing::{ManualScheduler, MockClock};
use circuitry_core::{TimedRatioPolicy, TransitionEngine, TransitionRecorder};
use circuitry_domain::{is_valid_transition, TimedRatioConfig, Transition};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Honours `RUST_LOG`; defaults to `warn` so forced transitions show up.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Engine wired to a fresh recorder.
pub fn recorded_engine(name: &str, strict: bool) -> (TransitionEngine, Arc<TransitionRecorder>) {
    let recorder = Arc::new(TransitionRecorder::new());
    let engine = TransitionEngine::builder()
        .name(name)
        .strict(strict)
        .listener(recorder.clone())
        .build();
    (engine, recorder)
}

/// Hand-cranked scheduler and clock for timed-ratio scenarios.
#[derive(Clone, Default)]
pub struct ManualRuntime {
    pub scheduler: ManualScheduler,
    pub clock: MockClock,
}

impl ManualRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timed-ratio policy driven by this runtime.
    pub fn timed_policy(&self, config: TimedRatioConfig) -> TimedRatioPolicy {
        TimedRatioPolicy::with_runtime(
            config,
            Arc::new(self.scheduler.clone()),
            Arc::new(self.clock.clone()),
        )
        .expect("valid timed-ratio config")
    }

    /// Let `millis` pass, then run every scheduled evaluator once.
    pub fn advance_and_tick(&self, millis: u64) -> usize {
        self.clock.advance_millis(millis);
        self.scheduler.tick_all()
    }
}

/// Order transitions by generation, which is the order the cell saw them.
pub fn by_generation(mut transitions: Vec<Transition>) -> Vec<Transition> {
    transitions.sort_by_key(|t| t.generation);
    transitions
}

/// Assert that `transitions` form one unbroken chain of legal, non-redundant
/// edges with consecutive generations.
pub fn assert_legal_chain(transitions: &[Transition]) {
    for t in transitions {
        assert_ne!(t.from, t.to, "redundant transition notified: {t}");
        assert!(is_valid_transition(t.from, t.to), "illegal transition notified: {t}");
    }
    for pair in transitions.windows(2) {
        assert_eq!(pair[0].to, pair[1].from, "broken chain: {} then {}", pair[0], pair[1]);
        assert_eq!(pair[0].generation + 1, pair[1].generation, "generation gap");
    }
}
