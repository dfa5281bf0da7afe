//! Configuration loading and config file resolution
//!
//! Settings come from a single TOML file. Every field has a built-in default,
//! so a missing file (or a file that only sets a few keys) is never fatal.
//!
//! # Config File Resolution Priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `DISCPLAY_CONFIG` environment variable
//! 3. Per-user config directory (`~/.config/discplay/config.toml` on Linux)
//! 4. System-wide `/etc/discplay/config.toml` (Linux only)
//! 5. Built-in defaults

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "DISCPLAY_CONFIG";

/// Audio sample rate of disc audio (Hz)
pub const DISC_SAMPLE_RATE: usize = 44_100;

/// Top-level configuration file layout
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Playback pipeline tuning
    pub player: PlayerSettings,

    /// Disc source
    pub disc: DiscConfig,

    /// Audio output
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// How the ring buffer gets refilled from the disc
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderMode {
    /// Dedicated reader thread, woken when the ring buffer runs low
    #[default]
    Background,

    /// The periodic drive step reads from the disc itself
    Inline,
}

/// Playback pipeline tuning. All sizes are in stereo samples.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    /// Frames kept in each track's frame cache (2250 = 30s)
    pub cache_frames: usize,

    /// Initial ring buffer capacity; grows on demand (44100 = 1s)
    pub ring_initial_capacity: usize,

    /// Refill starts when the ring buffer drops below this (661500 = 15s)
    pub low_watermark: usize,

    /// Refill stops once the ring buffer reaches this (5292000 = 2min)
    pub high_watermark: usize,

    /// Samples pulled from the disc per refill burst
    pub fill_quantum: usize,

    /// The sink is left alone while it holds more than this many samples
    pub sink_sufficient: usize,

    /// Samples handed to the sink per drive step
    pub sink_quantum: usize,

    /// Pause between refill bursts, keeps the drive from spinning up needlessly
    pub reader_throttle_ms: u64,

    /// Background thread or inline refill
    pub reader_mode: ReaderMode,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            cache_frames: 30 * 75,
            ring_initial_capacity: DISC_SAMPLE_RATE,
            low_watermark: DISC_SAMPLE_RATE * 15,
            high_watermark: DISC_SAMPLE_RATE * 60 * 2,
            fill_quantum: DISC_SAMPLE_RATE,
            sink_sufficient: DISC_SAMPLE_RATE,
            sink_quantum: DISC_SAMPLE_RATE,
            reader_throttle_ms: 100,
            reader_mode: ReaderMode::Background,
        }
    }
}

impl PlayerSettings {
    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cache_frames == 0 {
            return Err(Error::Config("cache_frames must be greater than 0".to_string()));
        }
        if self.ring_initial_capacity == 0 {
            return Err(Error::Config("ring_initial_capacity must be greater than 0".to_string()));
        }
        if self.fill_quantum == 0 || self.sink_quantum == 0 {
            return Err(Error::Config("fill_quantum and sink_quantum must be greater than 0".to_string()));
        }
        if self.low_watermark > self.high_watermark {
            return Err(Error::Config(format!(
                "low_watermark ({}) must not exceed high_watermark ({})",
                self.low_watermark, self.high_watermark
            )));
        }
        Ok(())
    }
}

/// Disc source configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiscConfig {
    /// Cue sheet describing a raw BIN disc image
    pub cue_path: Option<PathBuf>,
}

/// Audio output configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output device name (None = system default)
    pub device: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Config file resolution following the priority order in the module docs
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3/4: Platform config locations
    default_config_file()
}

/// First existing config file in the platform config locations
fn default_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("discplay").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/discplay/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse configuration from TOML text
pub fn parse_config(text: &str) -> Result<TomlConfig> {
    let config: TomlConfig =
        toml::from_str(text).map_err(|e| Error::Config(format!("Invalid config file: {}", e)))?;
    config.player.validate()?;
    Ok(config)
}

/// Load configuration from `path`.
///
/// A missing file (or no path at all) yields the built-in defaults with a
/// warning; a file that exists but cannot be parsed is an error.
pub fn load_config(path: Option<&Path>) -> Result<TomlConfig> {
    let Some(path) = path else {
        info!("No config file found, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!("Config file {} not found, using built-in defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let text = std::fs::read_to_string(path)?;
    let config = parse_config(&text)?;
    debug!("Loaded config from {}: {:?}", path.display(), config);
    Ok(config)
}
