//! Configuration loading
//!
//! Layers, lowest priority first:
//! 1. Built-in defaults
//! 2. Config file (`<config dir>/autotask/config.toml` or an explicit path)
//! 3. Environment variables (`AUTOTASK_STORE_DIR`, `AUTOTASK_SPEED`)
//! 4. CLI flags, applied by the caller

use crate::recorder::RecorderConfig;
use crate::replay::PlayerConfig;
use autotask_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file content
pub const DEFAULT_CONFIG: &str = r#"# autotask configuration

[recorder]
# Record pointer moves (clicks and scrolls always carry their position)
record_pointer_moves = false
# Minimum distance in pixels between two recorded moves
move_threshold = 5.0
# Key that pauses / resumes capture. It is never recorded.
pause_toggle_key = "1"
# Key that ends a recording from the keyboard
stop_key = "f10"

[player]
speed = 1.0
repeat_count = 1
# Preparation window before every repeat
lead_in_ms = 3000
repeat_pause_ms = 2000
# Pause after every N events so a manual copy/paste does not race the replay (0 = off)
batch_size = 25
batch_pause_ms = 1500
# Pause / cancel latency
slice_ms = 50
user_input_pause_ms = 2000
copy_paste_pause_ms = 5000

[storage]
# Directory holding saved automations (default: <data dir>/automations)
# dir = "/home/me/automations"
"#;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub recorder: RecorderConfig,
    pub player: PlayerConfig,
    pub storage: StorageConfig,
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "autotask")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn data_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "autotask")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Where automations are stored
    pub fn storage_dir(&self) -> PathBuf {
        self.storage
            .dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("automations"))
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = var("AUTOTASK_STORE_DIR") {
            self.storage.dir = Some(PathBuf::from(dir));
        }
        if let Some(speed) = var("AUTOTASK_SPEED") {
            self.player.speed = speed.trim().parse().map_err(|_| {
                Error::invalid_configuration(format!("AUTOTASK_SPEED is not a number: {}", speed))
            })?;
        }
        Ok(())
    }
}

/// Load configuration from `path`, or the default location when `None`
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = Config::default();

    let config_path = path.map(PathBuf::from).or_else(Config::default_path);
    if let Some(ref path) = config_path {
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            let contents = std::fs::read_to_string(path)
                .map_err(|e| Error::invalid_configuration(format!("Failed to read config: {}", e)))?;
            config = toml::from_str(&contents)
                .map_err(|e| Error::invalid_configuration(format!("Invalid config: {}", e)))?;
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
        }
    }

    config.apply_env(|name| std::env::var(name).ok())?;
    config.player.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            Error::invalid_configuration(format!("Failed to create config dir: {}", e))
        })?;
    }
    let contents = toml::to_string_pretty(config)
        .map_err(|e| Error::invalid_configuration(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, contents)
        .map_err(|e| Error::invalid_configuration(format!("Failed to write config: {}", e)))?;
    Ok(())
}
