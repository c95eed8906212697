//! Integration tests for the timed-ratio policy
//!
//! Most scenarios run on a `ManualRuntime` so slices are cut exactly when the
//! test says; one smoke test per real scheduler checks the wiring.

mod support;

use std::sync::Arc;
use std::time::{Duration, Instant};

use circuitry_common::time::{SystemClock, ThreadScheduler, TokioScheduler};
use circuitry_core::{CircuitBreaker, TimedRatioPolicy};
use circuitry_domain::{State, TimedRatioConfig};

use support::{assert_legal_chain, by_generation, init_tracing, recorded_engine, ManualRuntime};

fn pulse_slice(breaker: &CircuitBreaker<TimedRatioPolicy>, good: usize, bad: usize) {
    for _ in 0..good {
        breaker.on_good_pulse().expect("good pulse");
    }
    for _ in 0..bad {
        breaker.on_bad_pulse(None).expect("bad pulse");
    }
}

fn manual_breaker(
    runtime: &ManualRuntime,
    config: TimedRatioConfig,
) -> (CircuitBreaker<TimedRatioPolicy>, Arc<circuitry_core::TransitionRecorder>) {
    init_tracing();
    let (engine, recorder) = recorded_engine("timed", true);
    let breaker =
        CircuitBreaker::with_engine(engine, runtime.timed_policy(config)).expect("bind");
    (breaker, recorder)
}

/// Validates convergence back to `Closed` under sustained good traffic.
///
/// # Test Steps
/// 1. Start the circuit `Open` with thresholds (0.5, 0.75)
/// 2. Feed all-good slices and tick once per period
/// 3. Expect exactly one `Open -> Resetting` and one `Resetting -> Closed`
/// 4. Expect no `Failed` transition at any point
#[test]
fn test_good_traffic_converges_to_closed() {
    let runtime = ManualRuntime::new();
    let config = TimedRatioConfig::with_ratios(0.5, 0.75);
    let (breaker, recorder) = manual_breaker(&runtime, config);

    breaker.direct_transition(State::Open, false).expect("open");
    recorder.clear();

    for _ in 0..10 {
        pulse_slice(&breaker, 25, 0);
        assert_eq!(runtime.advance_and_tick(config.eval_every_n_millis), 1);
    }

    assert_eq!(recorder.states(), vec![State::Open, State::Resetting, State::Closed]);
    assert_eq!(recorder.count(State::Failed), 0);
    assert_eq!(breaker.state(), State::Closed);
}

/// Validates the full degrade-and-fail cycle driven by slice ratios.
///
/// Assertions:
/// - A bad slice opens the circuit
/// - Each failed probation reopens until the limit, then fails
/// - Failed stays put under any further traffic
#[test]
fn test_bad_traffic_exhausts_resets_and_fails() {
    let runtime = ManualRuntime::new();
    let config = TimedRatioConfig::builder()
        .open_at_good_ratio(0.5)
        .close_at_good_ratio(0.75)
        .min_slice_count(10)
        .eval_every_n_millis(100)
        .reset_after_n_millis(250)
        .fail_after_n_bad_resets(2)
        .build()
        .expect("valid config");
    let (breaker, recorder) = manual_breaker(&runtime, config);

    pulse_slice(&breaker, 2, 18);
    runtime.advance_and_tick(100);
    assert_eq!(breaker.state(), State::Open);

    // Open for 250ms before the first probation
    for _ in 0..3 {
        pulse_slice(&breaker, 0, 20);
        runtime.advance_and_tick(100);
    }
    assert_eq!(breaker.state(), State::Resetting);

    pulse_slice(&breaker, 5, 15);
    runtime.advance_and_tick(100);
    assert_eq!(breaker.state(), State::Open);
    assert_eq!(breaker.policy().stats().consecutive_bad_resets, 1);

    for _ in 0..3 {
        runtime.advance_and_tick(100);
    }
    assert_eq!(breaker.state(), State::Resetting);
    pulse_slice(&breaker, 5, 15);
    runtime.advance_and_tick(100);
    assert_eq!(breaker.state(), State::Failed);

    for _ in 0..20 {
        pulse_slice(&breaker, 30, 0);
        runtime.advance_and_tick(100);
    }
    assert_eq!(breaker.state(), State::Failed);
    assert_eq!(recorder.final_state(), Some(State::Failed));
    assert_legal_chain(&by_generation(recorder.transitions()));
}

/// Validates that a manual move from `Failed` back to `Resetting` grants a
/// fresh run of reset attempts.
///
/// # Test Steps
/// 1. Exhaust two bad resets so the circuit fails
/// 2. Force `Failed -> Resetting`
/// 3. One bad slice must reopen the circuit, not fail it
/// 4. A second fresh bad reset fails it again
#[test]
fn test_manual_resetting_clears_bad_reset_memory() {
    let runtime = ManualRuntime::new();
    let config = TimedRatioConfig::builder().fail_after_n_bad_resets(2).build().expect("valid config");
    let (breaker, recorder) = manual_breaker(&runtime, config);
    let period = config.eval_every_n_millis;

    pulse_slice(&breaker, 0, 20);
    runtime.advance_and_tick(period); // Closed -> Open
    runtime.advance_and_tick(period); // Open -> Resetting
    pulse_slice(&breaker, 1, 19);
    runtime.advance_and_tick(period); // Resetting -> Open
    runtime.advance_and_tick(period); // Open -> Resetting
    pulse_slice(&breaker, 1, 19);
    runtime.advance_and_tick(period); // Resetting -> Failed
    assert_eq!(breaker.state(), State::Failed);
    assert_eq!(breaker.policy().stats().consecutive_bad_resets, 2);

    assert_eq!(breaker.direct_transition(State::Resetting, true), Ok(true));
    assert_eq!(breaker.policy().stats().consecutive_bad_resets, 0);

    pulse_slice(&breaker, 1, 19);
    runtime.advance_and_tick(period);
    assert_eq!(breaker.state(), State::Open, "one fresh bad reset must not fail");
    assert_eq!(breaker.policy().stats().consecutive_bad_resets, 1);

    runtime.advance_and_tick(period);
    pulse_slice(&breaker, 1, 19);
    runtime.advance_and_tick(period);
    assert_eq!(breaker.state(), State::Failed);
    assert_eq!(recorder.count(State::Failed), 2);
}

/// Validates that small slices accumulate instead of being judged alone.
#[test]
fn test_small_slices_accumulate() {
    let runtime = ManualRuntime::new();
    let config = TimedRatioConfig::default();
    let (breaker, _recorder) = manual_breaker(&runtime, config);

    pulse_slice(&breaker, 0, 4);
    runtime.advance_and_tick(config.eval_every_n_millis);
    pulse_slice(&breaker, 0, 4);
    runtime.advance_and_tick(config.eval_every_n_millis);
    assert_eq!(breaker.state(), State::Closed);
    assert_eq!(breaker.policy().stats().pending_bad, 8);

    pulse_slice(&breaker, 1, 2);
    runtime.advance_and_tick(config.eval_every_n_millis);
    assert_eq!(breaker.state(), State::Open);
    assert_eq!(breaker.policy().stats().pending_bad, 0);
}

/// Validates that dropping the breaker cancels the evaluator.
#[test]
fn test_dropping_breaker_cancels_evaluator() {
    let runtime = ManualRuntime::new();
    let (breaker, _recorder) = manual_breaker(&runtime, TimedRatioConfig::default());
    assert_eq!(runtime.scheduler.active_tasks(), 1);
    assert!(breaker.policy().is_evaluating());

    breaker.policy().stop();
    assert!(!breaker.policy().is_evaluating());
    assert_eq!(runtime.advance_and_tick(100), 0);

    let (breaker, _recorder) = manual_breaker(&runtime, TimedRatioConfig::default());
    assert_eq!(runtime.scheduler.active_tasks(), 1);
    drop(breaker);
    assert_eq!(runtime.scheduler.active_tasks(), 0);
}

fn wait_for_state(breaker: &CircuitBreaker<TimedRatioPolicy>, state: State, limit: Duration) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if breaker.state() == state {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    breaker.state() == state
}

fn fast_config() -> TimedRatioConfig {
    TimedRatioConfig::builder()
        .min_slice_count(1)
        .eval_every_n_millis(10)
        .reset_after_n_millis(10)
        .build()
        .expect("valid config")
}

/// Validates the evaluator on a dedicated OS thread with the system clock.
#[test]
fn test_thread_scheduler_opens_circuit() {
    init_tracing();
    let policy = TimedRatioPolicy::with_runtime(
        fast_config(),
        Arc::new(ThreadScheduler::new("timed-ratio-test")),
        Arc::new(SystemClock),
    )
    .expect("valid config");
    let breaker = CircuitBreaker::new("thread", policy).expect("bind");

    pulse_slice(&breaker, 0, 50);
    assert!(wait_for_state(&breaker, State::Open, Duration::from_secs(5)));
    breaker.policy().stop();
}

/// Validates the evaluator as a tokio task.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tokio_scheduler_recovers_circuit() {
    init_tracing();
    let scheduler = TokioScheduler::try_current().expect("inside a runtime");
    let policy =
        TimedRatioPolicy::with_runtime(fast_config(), Arc::new(scheduler), Arc::new(SystemClock))
            .expect("valid config");
    let breaker = Arc::new(CircuitBreaker::new("tokio", policy).expect("bind"));
    breaker.direct_transition(State::Open, false).expect("open");

    let feeder = {
        let breaker = Arc::clone(&breaker);
        tokio::spawn(async move {
            for _ in 0..200 {
                if breaker.state() == State::Closed {
                    break;
                }
                breaker.on_good_pulse().expect("good pulse");
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
    };
    feeder.await.expect("feeder task");

    assert_eq!(breaker.state(), State::Closed);
}
