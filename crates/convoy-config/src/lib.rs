//! Configuration system for Convoy.
//!
//! Holds the movement-sync tuning knobs, simulated link conditions and
//! simulator settings. Persists to disk as RON, supports CLI overrides via
//! clap, hot-reload detection, and forward/backward compatible
//! serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{Config, DebugConfig, LinkConfig, SimConfig, SyncConfig, default_config_dir};
pub use error::ConfigError;
