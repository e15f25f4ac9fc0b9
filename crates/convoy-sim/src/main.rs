//! Headless convoy sync simulator.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p convoy-sim -- --loss 0.2 --jitter-ms 80` to stress the
//! reorder queue.

use std::path::PathBuf;

use clap::Parser;
use convoy_config::{CliArgs, Config, default_config_dir};
use convoy_sim::{SimError, Simulation};
use tracing::error;

fn main() {
    let args = CliArgs::parse();

    let config_dir = match resolve_config_dir(&args) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Load or create config, then apply CLI overrides
    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    convoy_log::init_logging(
        Some(&log_dir),
        cfg!(debug_assertions) || config.debug.json_log,
        Some(&config),
    );

    if let Err(e) = run(&config) {
        error!("simulation failed: {e}");
        std::process::exit(1);
    }
}

fn resolve_config_dir(args: &CliArgs) -> Result<PathBuf, SimError> {
    match &args.config {
        Some(dir) => Ok(dir.clone()),
        None => Ok(default_config_dir()?),
    }
}

fn run(config: &Config) -> Result<(), SimError> {
    let report = Simulation::new(config)?.run();
    report.log_summary();
    Ok(())
}
