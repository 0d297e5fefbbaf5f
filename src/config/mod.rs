//! Configuration module
//!
//! This module handles configuration for the recorder and the headless demo:
//! - Recorder settings (sample limit, playback speed)
//! - Demo settings (recording length, look-around rate)
//! - Log filter used when no `RUST_LOG` is set
//!
//! # Config Location
//!
//! The config file is stored in the platform-appropriate location:
//! - **Linux**: `~/.local/share/dev.hxyulin.viewstate-recorder/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.viewstate-recorder/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.viewstate-recorder\`
//!
//! # Example
//!
//! ```ignore
//! use viewstate_recorder::config::{config_path, AppConfig};
//!
//! let config = AppConfig::load_or_default(config_path().unwrap());
//! config.save("my_config.json")?;
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{RecorderError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for data directories
pub const APP_ID: &str = "dev.hxyulin.viewstate-recorder";

/// Config filename
pub const CONFIG_FILE: &str = "config.json";

/// Log filter used when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str = "info,viewstate_recorder=debug";

// ==================== App Data Directory ====================

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Ensure the app data directory exists
pub fn ensure_app_data_dir() -> Result<PathBuf> {
    let dir = app_data_dir().ok_or_else(|| {
        RecorderError::Config("Could not determine app data directory".to_string())
    })?;

    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| {
            RecorderError::Config(format!("Failed to create app data directory: {}", e))
        })?;
    }

    Ok(dir)
}

/// Get the path to the default config file
pub fn config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Config format version
    pub version: u32,

    /// Recorder settings
    pub recorder: RecorderSettings,

    /// Demo settings
    pub demo: DemoSettings,

    /// `tracing` filter directive, overridden by `RUST_LOG`
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            recorder: RecorderSettings::default(),
            demo: DemoSettings::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RecorderError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| {
            RecorderError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, returning defaults if it is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save config file to disk as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RecorderError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| RecorderError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            RecorderError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.recorder
            .validate()
            .and_then(|_| self.demo.validate())
            .map_err(RecorderError::Config)
    }
}
