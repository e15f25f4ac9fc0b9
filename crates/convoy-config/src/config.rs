//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Movement replication settings.
    pub sync: SyncConfig,
    /// Simulated network link conditions.
    pub link: LinkConfig,
    /// Headless simulator settings.
    pub sim: SimConfig,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Movement replication tuning for a synchronized body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Master enable for movement replication.
    pub replicate_movement: bool,
    /// Seconds between state sends from the owning peer (0.05 = 20 Hz).
    pub send_rate: f64,
    /// Playback delay added to every received snapshot, in seconds.
    pub time_behind: f64,
    /// How long before a snapshot's playback time the approach may begin.
    pub lerp_start_margin: f64,
    /// Per-axis distance under which a queued snapshot is skipped.
    pub position_tolerance: f32,
    /// Exponential approach rate used when presenting a target pose.
    pub smoothing_factor: f32,
    /// Runtime override for temporarily suspending sync (cutscenes etc.).
    /// Independent of `replicate_movement`.
    pub should_sync_with_server: bool,
}

/// Conditions of a simulated one-way link.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LinkConfig {
    /// Probability (0.0 - 1.0) that an unreliable message is lost.
    pub loss: f64,
    /// Base one-way latency in milliseconds.
    pub latency_ms: f64,
    /// Extra random delay in milliseconds added to unreliable messages.
    pub jitter_ms: f64,
    /// Probability (0.0 - 1.0) that an unreliable message is delivered twice.
    pub duplicate: f64,
    /// RNG seed so runs are reproducible.
    pub seed: u64,
}

/// Headless simulator settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Simulated run length in seconds.
    pub duration_s: f64,
    /// Number of observing peers.
    pub observers: u32,
    /// Frame rate of the fixed-timestep loop (Hz).
    pub frame_rate: u32,
    /// Hand possession to observer 0 halfway through the run.
    pub possession_handoff: bool,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
    /// Also write JSON logs to the log directory.
    pub json_log: bool,
}

// --- Default implementations ---

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            replicate_movement: true,
            send_rate: 0.05,
            time_behind: 0.15,
            lerp_start_margin: 0.35,
            position_tolerance: 0.1,
            smoothing_factor: 10.0,
            should_sync_with_server: true,
        }
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            loss: 0.05,
            latency_ms: 60.0,
            jitter_ms: 40.0,
            duplicate: 0.01,
            seed: 47,
        }
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            duration_s: 30.0,
            observers: 2,
            frame_rate: 60,
            possession_handoff: true,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_log: false,
        }
    }
}

/// Returns the platform config directory for Convoy (e.g.
/// `~/.config/convoy` on Linux).
pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("convoy"))
        .ok_or(ConfigError::NoConfigDir)
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let config = read_config(&config_path)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(|source| ConfigError::Write {
            path: config_dir.to_path_buf(),
            source,
        })?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized =
            ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::Serialize)?;

        std::fs::write(&config_path, serialized).map_err(|source| ConfigError::Write {
            path: config_path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let new_config = read_config(&config_path)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }
}

fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ron::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
