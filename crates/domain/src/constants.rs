//! Domain constants
//!
//! Bit layouts for the packed atomic words and the default policy thresholds.

// State snapshot layout: two low bits of state, generation above.
pub const STATE_BITS: u32 = 2;
pub const STATE_MASK: u64 = 0b11;
pub const GENERATION_INCREMENT: u64 = 1 << STATE_BITS;

// Timed-ratio slice counter: good in the low half, bad in the high half.
pub const SLICE_HALF_BITS: u32 = 32;
pub const SLICE_COUNT_MAX: u64 = 0x7FFF_FFFF;

// Counted policy defaults
pub const DEFAULT_OPEN_AFTER_N_BADS: u64 = 5;
pub const DEFAULT_TRY_RESET_AFTER_N_ALTS: u64 = 10;
pub const DEFAULT_ACCEPT_RESET_AFTER_N_GOODS: u64 = 3;
pub const DEFAULT_FAIL_AFTER_N_BAD_RESETS: u64 = 0;

// Timed-ratio policy defaults
pub const DEFAULT_OPEN_AT_GOOD_RATIO: f64 = 0.5;
pub const DEFAULT_CLOSE_AT_GOOD_RATIO: f64 = 0.75;
pub const DEFAULT_MIN_SLICE_COUNT: u64 = 10;
pub const DEFAULT_EVAL_EVERY_N_MILLIS: u64 = 100;
// One less than the eval period: periodic ticks can land a few microseconds early.
pub const DEFAULT_RESET_AFTER_N_MILLIS: u64 = 99;
