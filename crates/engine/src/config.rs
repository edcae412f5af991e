//! Engine configuration.
//!
//! Stored as JSON:
//! - Linux: `~/.config/filedeck/config.json`
//! - Windows: `%APPDATA%/filedeck/config.json`
//!
//! Every field has a default, so partial files load and a missing file
//! yields the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use filedeck_browser::ListingSettings;
use filedeck_store::StoreConfig;
use filedeck_transfer::{QuotaLimits, TransferSettings};
use serde::{Deserialize, Serialize};

/// Errors loading or saving the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Duplicate-submission guard settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardSettings {
    pub window_ms: u64,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self { window_ms: 5000 }
    }
}

impl GuardSettings {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub api: StoreConfig,
    pub limits: QuotaLimits,
    pub transfer: TransferSettings,
    pub guard: GuardSettings,
    pub listing: ListingSettings,
}

impl EngineConfig {
    /// Loads from the platform config path.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_path())
    }

    /// Loads from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Saves to the platform config path.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_path())
    }

    /// Writes pretty JSON to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("filedeck").join("config.json")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("filedeck")
            .join("config.json")
    }
}
