//! Command-line argument parsing for the Convoy simulator.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Convoy command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug)]
#[command(name = "convoy-sim", about = "Headless vehicle movement sync simulator")]
pub struct CliArgs {
    /// Simulated run length in seconds.
    #[arg(long)]
    pub duration: Option<f64>,

    /// Number of observing peers.
    #[arg(long)]
    pub observers: Option<u32>,

    /// Unreliable packet loss probability (0.0 - 1.0).
    #[arg(long)]
    pub loss: Option<f64>,

    /// One-way link latency in milliseconds.
    #[arg(long)]
    pub latency_ms: Option<f64>,

    /// Maximum extra random delay in milliseconds.
    #[arg(long)]
    pub jitter_ms: Option<f64>,

    /// Unreliable packet duplication probability (0.0 - 1.0).
    #[arg(long)]
    pub duplicate: Option<f64>,

    /// RNG seed for the simulated link.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(duration) = args.duration {
            self.sim.duration_s = duration;
        }
        if let Some(observers) = args.observers {
            self.sim.observers = observers;
        }
        if let Some(loss) = args.loss {
            self.link.loss = loss;
        }
        if let Some(latency) = args.latency_ms {
            self.link.latency_ms = latency;
        }
        if let Some(jitter) = args.jitter_ms {
            self.link.jitter_ms = jitter;
        }
        if let Some(duplicate) = args.duplicate {
            self.link.duplicate = duplicate;
        }
        if let Some(seed) = args.seed {
            self.link.seed = seed;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> CliArgs {
        CliArgs {
            duration: None,
            observers: None,
            loss: None,
            latency_ms: None,
            jitter_ms: None,
            duplicate: None,
            seed: None,
            log_level: None,
            config: None,
        }
    }

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            loss: Some(0.3),
            seed: Some(9),
            ..empty_args()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.link.loss, 0.3);
        assert_eq!(config.link.seed, 9);
        // Non-overridden fields retain defaults
        assert_eq!(config.link.latency_ms, 60.0);
        assert_eq!(config.sim.observers, 2);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&empty_args());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args =
            CliArgs::try_parse_from(["convoy-sim", "--observers", "4", "--jitter-ms", "80"])
                .unwrap();
        assert_eq!(args.observers, Some(4));
        assert_eq!(args.jitter_ms, Some(80.0));
        assert!(args.config.is_none());
    }
}
