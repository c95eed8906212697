//! Configuration management
//!
//! The configuration types live in `circuitry-domain`; this module loads
//! them from files and the environment.

pub mod loader;

pub use loader::{
    load, load_from_env_with_prefix, load_from_file, parse_config, DEFAULT_ENV_PREFIX,
};
