//! Configuration error types.

use std::path::PathBuf;

/// Errors raised while locating, reading or writing `config.ron`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a valid Convoy config.
    #[error("invalid config in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },

    #[error("cannot encode config: {0}")]
    Serialize(#[source] ron::Error),

    /// The platform reports no config directory and none was given.
    #[error("no config directory available, pass --config")]
    NoConfigDir,
}
