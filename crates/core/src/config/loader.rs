//! Configuration loader
//!
//! Loads breaker configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. If `{PREFIX}_POLICY` is set, build the configuration from the
//!    environment
//! 2. Otherwise load the given file
//! 3. Supports JSON and TOML formats (detected by extension)
//!
//! ## Environment Variables
//! With prefix `CIRCUITRY`:
//! - `CIRCUITRY_NAME`: Circuit name used in log events
//! - `CIRCUITRY_STRICT`: Reject illegal edges (true/false)
//! - `CIRCUITRY_POLICY`: `counted`, `timed_ratio` or `inert`
//! - `CIRCUITRY_OPEN_AFTER_N_BADS`, `CIRCUITRY_TRY_RESET_AFTER_N_ALTS`,
//!   `CIRCUITRY_ACCEPT_RESET_AFTER_N_GOODS`: counted thresholds
//! - `CIRCUITRY_OPEN_AT_GOOD_RATIO`, `CIRCUITRY_CLOSE_AT_GOOD_RATIO`,
//!   `CIRCUITRY_MIN_SLICE_COUNT`, `CIRCUITRY_EVAL_EVERY_N_MILLIS`,
//!   `CIRCUITRY_RESET_AFTER_N_MILLIS`: timed-ratio thresholds
//! - `CIRCUITRY_FAIL_AFTER_N_BAD_RESETS`: shared by both policies
//!
//! Unset thresholds keep their defaults.

use std::path::Path;
use std::str::FromStr;

use circuitry_domain::{
    BreakerConfig, CircuitError, CircuitResult, CountedPolicyConfig, PolicyConfig,
    TimedRatioConfig,
};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "CIRCUITRY";

/// Load configuration with automatic fallback strategy
///
/// Uses the environment when `{prefix}_POLICY` is set, otherwise `path`.
///
/// # Errors
/// Returns `CircuitError::Config` if neither source yields a configuration,
/// or `CircuitError::InvalidConfig` if it fails validation.
pub fn load(prefix: &str, path: impl AsRef<Path>) -> CircuitResult<BreakerConfig> {
    if std::env::var_os(env_key(prefix, "POLICY")).is_some() {
        tracing::info!(prefix, "Configuration loaded from environment variables");
        load_from_env_with_prefix(prefix)
    } else {
        tracing::debug!(prefix, "No policy in environment, trying file");
        load_from_file(path)
    }
}

/// Load configuration from environment variables under `prefix`
///
/// # Errors
/// Returns `CircuitError::Config` for unknown policy kinds or unparsable
/// values, `CircuitError::InvalidConfig` if validation fails.
pub fn load_from_env_with_prefix(prefix: &str) -> CircuitResult<BreakerConfig> {
    let defaults = BreakerConfig::default();
    let name = std::env::var(env_key(prefix, "NAME")).unwrap_or(defaults.name);
    let strict_validation = env_bool(&env_key(prefix, "STRICT"), defaults.strict_validation);

    let kind = std::env::var(env_key(prefix, "POLICY")).unwrap_or_else(|_| "counted".to_string());
    let policy = match kind.trim().to_ascii_lowercase().as_str() {
        "counted" => {
            let d = CountedPolicyConfig::default();
            PolicyConfig::Counted(CountedPolicyConfig {
                open_after_n_bads: env_parse(prefix, "OPEN_AFTER_N_BADS", d.open_after_n_bads)?,
                try_reset_after_n_alts: env_parse(
                    prefix,
                    "TRY_RESET_AFTER_N_ALTS",
                    d.try_reset_after_n_alts,
                )?,
                accept_reset_after_n_goods: env_parse(
                    prefix,
                    "ACCEPT_RESET_AFTER_N_GOODS",
                    d.accept_reset_after_n_goods,
                )?,
                fail_after_n_bad_resets: env_parse(
                    prefix,
                    "FAIL_AFTER_N_BAD_RESETS",
                    d.fail_after_n_bad_resets,
                )?,
            })
        }
        "timed_ratio" | "timed-ratio" => {
            let d = TimedRatioConfig::default();
            PolicyConfig::TimedRatio(TimedRatioConfig {
                open_at_good_ratio: env_parse(prefix, "OPEN_AT_GOOD_RATIO", d.open_at_good_ratio)?,
                close_at_good_ratio: env_parse(
                    prefix,
                    "CLOSE_AT_GOOD_RATIO",
                    d.close_at_good_ratio,
                )?,
                min_slice_count: env_parse(prefix, "MIN_SLICE_COUNT", d.min_slice_count)?,
                eval_every_n_millis: env_parse(
                    prefix,
                    "EVAL_EVERY_N_MILLIS",
                    d.eval_every_n_millis,
                )?,
                reset_after_n_millis: env_parse(
                    prefix,
                    "RESET_AFTER_N_MILLIS",
                    d.reset_after_n_millis,
                )?,
                fail_after_n_bad_resets: env_parse(
                    prefix,
                    "FAIL_AFTER_N_BAD_RESETS",
                    d.fail_after_n_bad_resets,
                )?,
            })
        }
        "inert" => PolicyConfig::Inert,
        other => {
            return Err(CircuitError::Config(format!("Unknown policy kind: {other}")));
        }
    };

    let config = BreakerConfig { name, strict_validation, policy };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// # Errors
/// Returns `CircuitError::Config` if the file is missing, unreadable or
/// malformed; `CircuitError::InvalidConfig` if it fails validation.
pub fn load_from_file(path: impl AsRef<Path>) -> CircuitResult<BreakerConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(CircuitError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| CircuitError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`); files
/// without an extension are read as JSON.
///
/// # Errors
/// Returns `CircuitError::Config` if format is invalid or parsing fails.
pub fn parse_config(contents: &str, path: &Path) -> CircuitResult<BreakerConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CircuitError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CircuitError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CircuitError::Config(format!("Unsupported config format: {extension}"))),
    }
}

fn env_key(prefix: &str, suffix: &str) -> String {
    format!("{prefix}_{suffix}")
}

/// Parse an optional environment variable, falling back to `default`.
fn env_parse<T>(prefix: &str, suffix: &str, default: T) -> CircuitResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let key = env_key(prefix, suffix);
    match std::env::var(&key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| CircuitError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
