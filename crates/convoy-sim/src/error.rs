//! Simulator errors.

use convoy_config::ConfigError;

/// Errors that stop a simulation run.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// A setting is outside the range the simulator can run with.
    #[error("invalid simulator config: {0}")]
    InvalidConfig(String),

    /// The config directory could not be resolved or written.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}
