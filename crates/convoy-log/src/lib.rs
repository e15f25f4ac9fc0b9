//! Structured logging for Convoy.
//!
//! Span-based, filterable logging via the `tracing` ecosystem. Console output
//! carries uptime timestamps and module paths; debug runs can additionally
//! write JSON lines to a file for post-run analysis of dropped snapshots and
//! teleports.

use std::path::Path;

use convoy_config::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config names a level.
pub const DEFAULT_FILTER: &str = "info";

/// Name of the JSON log file written inside `log_dir`.
pub const LOG_FILE_NAME: &str = "convoy.log";

/// Initialize the global tracing subscriber.
///
/// - Console output with uptime timestamps, module paths, and levels
/// - JSON file logging when `debug_build` is set and `log_dir` is usable
/// - `RUST_LOG` wins over `config.debug.log_level`, which wins over
///   [`DEFAULT_FILTER`]
///
/// # Examples
///
/// ```no_run
/// use convoy_config::Config;
/// use convoy_log::init_logging;
///
/// let config = Config::default();
/// init_logging(None, false, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_string(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// Resolves the filter directive from the config, falling back to
/// [`DEFAULT_FILTER`] when the config is absent or its level is empty.
pub fn filter_string(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// `EnvFilter` built from [`DEFAULT_FILTER`].
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
