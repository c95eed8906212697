//! Integration tests for the circuit breaker with the counted policy
//!
//! Drives full pulse sequences through `CircuitBreaker` the way application
//! code does: ask `should_try_normal_path`, then report the outcome.

mod support;

use std::sync::Arc;

use circuitry_core::{
    CircuitBreaker, CountedTransitionPolicy, InertTransitionPolicy, LoggingListener,
    TransitionEngine, TransitionRecorder,
};
use circuitry_domain::{CircuitError, CountedPolicyConfig, State};

use support::{init_tracing, recorded_engine};

#[derive(Debug, Clone, Copy)]
enum Pulse {
    Good,
    Bad,
    Alt,
}

type CountedBreaker = CircuitBreaker<CountedTransitionPolicy>;

fn counted_breaker(config: CountedPolicyConfig) -> (CountedBreaker, Arc<TransitionRecorder>) {
    init_tracing();
    let (engine, recorder) = recorded_engine("counted", true);
    let policy = CountedTransitionPolicy::new(config).expect("valid config");
    let breaker = CircuitBreaker::with_engine(engine, policy).expect("bind");
    (breaker, recorder)
}

/// Play pulses as a caller would, consulting the breaker before each one.
fn play(breaker: &CountedBreaker, pulses: &[Pulse]) {
    for pulse in pulses {
        let _ = breaker.should_try_normal_path();
        match pulse {
            Pulse::Good => breaker.on_good_pulse(),
            Pulse::Bad => breaker.on_bad_pulse(None),
            Pulse::Alt => breaker.on_alt_pulse(),
        }
        .expect("pulse accepted");
    }
}

/// Validates the deterministic single-threaded counted scenario.
///
/// # Test Steps
/// 1. Configure thresholds (1 bad, 1 alt, 2 goods, 1 bad reset)
/// 2. Play good, bad, alt, good, good, bad, alt, bad
/// 3. Check the exact notified state trace
#[test]
fn test_counted_scenario_trace() {
    use Pulse::{Alt, Bad, Good};
    let (breaker, recorder) = counted_breaker(CountedPolicyConfig::new(1, 1, 2, 1));

    play(&breaker, &[Good, Bad, Alt, Good, Good, Bad, Alt, Bad]);

    assert_eq!(
        recorder.states(),
        vec![
            State::Closed,
            State::Open,
            State::Resetting,
            State::Closed,
            State::Open,
            State::Resetting,
            State::Failed,
        ]
    );
    assert_eq!(breaker.state(), State::Failed);
    assert_eq!(breaker.snapshot().generation(), 6);
}

/// Validates that `Failed` is only left through a direct transition.
///
/// Assertions:
/// - No pulse sequence notifies anything once failed
/// - The normal path stays closed off
#[test]
fn test_failed_is_sticky() {
    use Pulse::{Alt, Bad, Good};
    let (breaker, recorder) = counted_breaker(CountedPolicyConfig::new(1, 1, 1, 1));

    play(&breaker, &[Bad, Alt, Bad]);
    assert_eq!(breaker.state(), State::Failed);
    let notified = recorder.len();

    let mut storm = Vec::new();
    for i in 0..300 {
        storm.push(match i % 3 {
            0 => Good,
            1 => Bad,
            _ => Alt,
        });
    }
    storm.extend([Alt; 50]);
    storm.extend([Good; 50]);
    play(&breaker, &storm);

    assert_eq!(breaker.state(), State::Failed);
    assert_eq!(recorder.len(), notified);
    assert!(!breaker.should_try_normal_path());
}

/// Validates that a manual reset zeroes the consecutive bad-reset memory.
///
/// # Test Steps
/// 1. Fail the circuit after two bad resets
/// 2. Force it back to `Closed`
/// 3. One bad reset must reopen, not fail
/// 4. The second fresh bad reset fails again
#[test]
fn test_manual_reset_clears_bad_reset_memory() {
    use Pulse::{Alt, Bad};
    let (breaker, recorder) = counted_breaker(CountedPolicyConfig::new(1, 1, 1, 2));

    play(&breaker, &[Bad, Alt, Bad, Alt, Bad]);
    assert_eq!(breaker.state(), State::Failed);
    assert_eq!(breaker.policy().consecutive_bad_resets(), 2);

    assert_eq!(breaker.direct_transition(State::Closed, true), Ok(true));
    assert_eq!(breaker.policy().consecutive_bad_resets(), 0);

    play(&breaker, &[Bad, Alt, Bad]);
    assert_eq!(breaker.state(), State::Open, "one bad reset must not fail");
    assert_eq!(breaker.policy().consecutive_bad_resets(), 1);

    play(&breaker, &[Alt, Bad]);
    assert_eq!(breaker.state(), State::Failed);
    assert_eq!(recorder.count(State::Failed), 2);
}

/// Validates the two-step manual recovery `Failed -> Resetting -> Closed`.
#[test]
fn test_manual_recovery_through_resetting() {
    use Pulse::{Alt, Bad, Good};
    let (breaker, _recorder) = counted_breaker(CountedPolicyConfig::new(1, 1, 1, 1));
    play(&breaker, &[Bad, Alt, Bad]);
    assert_eq!(breaker.state(), State::Failed);

    assert_eq!(breaker.direct_transition(State::Resetting, false), Ok(true));
    assert_eq!(breaker.policy().consecutive_bad_resets(), 0);
    assert!(breaker.should_try_normal_path());

    play(&breaker, &[Good]);
    assert_eq!(breaker.state(), State::Closed);
}

/// Validates that a stale request for the current state is redundant.
///
/// Assertions:
/// - Repeating a request with a stale snapshot returns `Ok(true)`
/// - The literal edge is not re-checked on a lenient engine
/// - No second notification fires
#[test]
fn test_stale_request_for_current_state_is_idempotent() {
    let (engine, recorder) = recorded_engine("idempotent", true);
    let stale = engine.snapshot();

    assert_eq!(engine.try_transition(stale, State::Open), Ok(true));
    assert_eq!(engine.try_transition(stale, State::Open), Ok(true));
    assert_eq!(recorder.count(State::Open), 1);

    let (lenient, lenient_recorder) = recorded_engine("idempotent-lenient", false);
    let stale = lenient.snapshot();
    assert!(lenient.try_transition(stale, State::Open).unwrap());
    assert!(lenient.try_transition(lenient.snapshot(), State::Resetting).unwrap());

    // Closed -> Resetting is not an edge, but Resetting is already current.
    assert_eq!(lenient.try_transition(stale, State::Resetting), Ok(true));
    assert_eq!(lenient_recorder.count(State::Resetting), 1);
    assert_eq!(lenient_recorder.len(), 2);
}

/// Validates strict mode error reporting through the breaker.
#[test]
fn test_direct_transition_rejects_illegal_edge() {
    let breaker = CircuitBreaker::new("strict", InertTransitionPolicy).expect("bind");
    assert_eq!(breaker.direct_transition(State::Closed, false), Ok(true), "self-edge is legal");

    let err = breaker.direct_transition(State::Resetting, false).unwrap_err();
    assert!(matches!(
        err,
        CircuitError::InvalidTransition { from: State::Closed, to: State::Resetting }
    ));
    assert_eq!(err.to_string(), "Can't transition from CLOSED to RESETTING");
}

/// Validates closure and logging listeners on a shared engine.
#[test]
fn test_listeners_observe_transitions_in_order() {
    init_tracing();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let engine = TransitionEngine::builder()
        .name("listeners")
        .listener(Arc::new(LoggingListener::new("listeners")))
        .listener(Arc::new(move |t: circuitry_domain::Transition| {
            sink.lock().unwrap().push(t.to);
        }))
        .build();
    let breaker = CircuitBreaker::with_engine(engine, InertTransitionPolicy).expect("bind");

    breaker.direct_transition(State::Open, false).unwrap();
    breaker.direct_transition(State::Resetting, false).unwrap();
    breaker.direct_transition(State::Closed, false).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![State::Open, State::Resetting, State::Closed]);
}
