//! Policy and breaker configuration
//!
//! All structures deserialize from TOML or JSON (see the core crate's loader)
//! and fill omitted fields from the defaults in [`crate::constants`].
//! Thresholds are checked by `validate()`; policies call it at construction.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::{CircuitError, CircuitResult};

/// Thresholds for the consecutive-pulse counting policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CountedPolicyConfig {
    /// Consecutive bad pulses that open a closed circuit.
    pub open_after_n_bads: u64,
    /// Consecutive alternate pulses before an automatic reset is attempted.
    /// `0` disables automatic reset.
    pub try_reset_after_n_alts: u64,
    /// Consecutive good pulses that close a resetting circuit.
    pub accept_reset_after_n_goods: u64,
    /// Consecutive failed resets before the circuit fails permanently.
    /// `0` disables permanent failure.
    pub fail_after_n_bad_resets: u64,
}

impl Default for CountedPolicyConfig {
    fn default() -> Self {
        Self {
            open_after_n_bads: DEFAULT_OPEN_AFTER_N_BADS,
            try_reset_after_n_alts: DEFAULT_TRY_RESET_AFTER_N_ALTS,
            accept_reset_after_n_goods: DEFAULT_ACCEPT_RESET_AFTER_N_GOODS,
            fail_after_n_bad_resets: DEFAULT_FAIL_AFTER_N_BAD_RESETS,
        }
    }
}

impl CountedPolicyConfig {
    /// Positional constructor, in the same order as the fields.
    pub const fn new(
        open_after_n_bads: u64,
        try_reset_after_n_alts: u64,
        accept_reset_after_n_goods: u64,
        fail_after_n_bad_resets: u64,
    ) -> Self {
        Self {
            open_after_n_bads,
            try_reset_after_n_alts,
            accept_reset_after_n_goods,
            fail_after_n_bad_resets,
        }
    }

    pub fn builder() -> CountedPolicyConfigBuilder {
        CountedPolicyConfigBuilder::default()
    }

    pub fn validate(&self) -> CircuitResult<()> {
        if self.open_after_n_bads == 0 {
            return Err(CircuitError::invalid_config("open_after_n_bads must be greater than 0"));
        }
        if self.accept_reset_after_n_goods == 0 {
            return Err(CircuitError::invalid_config(
                "accept_reset_after_n_goods must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Builder for [`CountedPolicyConfig`]
#[derive(Debug, Default)]
pub struct CountedPolicyConfigBuilder {
    config: CountedPolicyConfig,
}

impl CountedPolicyConfigBuilder {
    pub fn open_after_n_bads(mut self, n: u64) -> Self {
        self.config.open_after_n_bads = n;
        self
    }

    pub fn try_reset_after_n_alts(mut self, n: u64) -> Self {
        self.config.try_reset_after_n_alts = n;
        self
    }

    pub fn accept_reset_after_n_goods(mut self, n: u64) -> Self {
        self.config.accept_reset_after_n_goods = n;
        self
    }

    pub fn fail_after_n_bad_resets(mut self, n: u64) -> Self {
        self.config.fail_after_n_bad_resets = n;
        self
    }

    pub fn build(self) -> CircuitResult<CountedPolicyConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Thresholds for the time-sliced good-ratio policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimedRatioConfig {
    /// A closed circuit opens when a slice's good ratio falls below this.
    pub open_at_good_ratio: f64,
    /// A resetting circuit closes when a slice's good ratio reaches this.
    pub close_at_good_ratio: f64,
    /// Slices with fewer pulses are carried into the next slice.
    pub min_slice_count: u64,
    /// Evaluation period.
    pub eval_every_n_millis: u64,
    /// Minimum time an open circuit waits before resetting.
    pub reset_after_n_millis: u64,
    /// `0` disables permanent failure.
    pub fail_after_n_bad_resets: u64,
}

impl Default for TimedRatioConfig {
    fn default() -> Self {
        Self {
            open_at_good_ratio: DEFAULT_OPEN_AT_GOOD_RATIO,
            close_at_good_ratio: DEFAULT_CLOSE_AT_GOOD_RATIO,
            min_slice_count: DEFAULT_MIN_SLICE_COUNT,
            eval_every_n_millis: DEFAULT_EVAL_EVERY_N_MILLIS,
            reset_after_n_millis: DEFAULT_RESET_AFTER_N_MILLIS,
            fail_after_n_bad_resets: DEFAULT_FAIL_AFTER_N_BAD_RESETS,
        }
    }
}

impl TimedRatioConfig {
    /// Config with the given ratios and every other field at its default.
    pub fn with_ratios(open_at_good_ratio: f64, close_at_good_ratio: f64) -> Self {
        Self { open_at_good_ratio, close_at_good_ratio, ..Self::default() }
    }

    pub fn builder() -> TimedRatioConfigBuilder {
        TimedRatioConfigBuilder::default()
    }

    pub fn validate(&self) -> CircuitResult<()> {
        check_ratio("open_at_good_ratio", self.open_at_good_ratio)?;
        check_ratio("close_at_good_ratio", self.close_at_good_ratio)?;
        if self.min_slice_count == 0 {
            return Err(CircuitError::invalid_config("min_slice_count must be greater than 0"));
        }
        if self.eval_every_n_millis == 0 {
            return Err(CircuitError::invalid_config("eval_every_n_millis must be greater than 0"));
        }
        if self.reset_after_n_millis == 0 {
            return Err(CircuitError::invalid_config(
                "reset_after_n_millis must be greater than 0",
            ));
        }
        Ok(())
    }
}

fn check_ratio(name: &str, value: f64) -> CircuitResult<()> {
    // NaN fails the range check too.
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(CircuitError::InvalidConfig(format!("{name} must be within [0, 1], got {value}")))
    }
}

/// Builder for [`TimedRatioConfig`]
#[derive(Debug, Default)]
pub struct TimedRatioConfigBuilder {
    config: TimedRatioConfig,
}

impl TimedRatioConfigBuilder {
    pub fn open_at_good_ratio(mut self, ratio: f64) -> Self {
        self.config.open_at_good_ratio = ratio;
        self
    }

    pub fn close_at_good_ratio(mut self, ratio: f64) -> Self {
        self.config.close_at_good_ratio = ratio;
        self
    }

    pub fn min_slice_count(mut self, n: u64) -> Self {
        self.config.min_slice_count = n;
        self
    }

    pub fn eval_every_n_millis(mut self, millis: u64) -> Self {
        self.config.eval_every_n_millis = millis;
        self
    }

    pub fn reset_after_n_millis(mut self, millis: u64) -> Self {
        self.config.reset_after_n_millis = millis;
        self
    }

    pub fn fail_after_n_bad_resets(mut self, n: u64) -> Self {
        self.config.fail_after_n_bad_resets = n;
        self
    }

    pub fn build(self) -> CircuitResult<TimedRatioConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Which decision policy drives a breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    Counted(CountedPolicyConfig),
    TimedRatio(TimedRatioConfig),
    /// Pulses are ignored; only direct transitions move the circuit.
    Inert,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self::Counted(CountedPolicyConfig::default())
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> CircuitResult<()> {
        match self {
            PolicyConfig::Counted(config) => config.validate(),
            PolicyConfig::TimedRatio(config) => config.validate(),
            PolicyConfig::Inert => Ok(()),
        }
    }
}

/// Top-level breaker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Label used in log events.
    pub name: String,
    /// Reject illegal edges in `try_transition` instead of attempting them.
    pub strict_validation: bool,
    pub policy: PolicyConfig,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { name: "circuit".to_string(), strict_validation: false, policy: PolicyConfig::default() }
    }
}

impl BreakerConfig {
    pub fn validate(&self) -> CircuitResult<()> {
        if self.name.trim().is_empty() {
            return Err(CircuitError::invalid_config("name must not be empty"));
        }
        self.policy.validate()
    }
}
