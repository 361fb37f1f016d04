//! Configuration loading, validation, and persistence for Taskloom.
//!
//! Loads configuration from `~/.taskloom/config.toml` with environment
//! variable overrides. The file's `[settings]` table holds flat
//! key→value overrides that the controller merges over mode defaults.

pub mod settings;
pub mod store;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use settings::{SettingValue, Settings};
pub use store::{ConfigStore, FileConfigStore, MemoryConfigStore};

/// The root configuration structure.
///
/// Maps directly to `~/.taskloom/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the reasoning backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Mode used when none is given on the command line
    #[serde(default = "default_mode")]
    pub default_mode: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// HTTP timeout for one reasoning call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Where named configurations are saved (defaults to `~/.taskloom/configs`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,

    /// Flat overrides applied to every agent/flow construction
    #[serde(default)]
    pub settings: Settings,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_mode() -> String {
    "standard".into()
}
fn default_temperature() -> f32 {
    0.0
}
fn default_request_timeout_secs() -> u64 {
    120
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field(
                "api_key",
                &self.api_key.as_ref().map(|_| "[REDACTED]").unwrap_or("None"),
            )
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .field("default_mode", &self.default_mode)
            .field("default_temperature", &self.default_temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("store_dir", &self.store_dir)
            .field("settings", &self.settings)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default location, with env var overrides.
    ///
    /// Priority (highest first):
    /// 1. `TASKLOOM_*` environment variables
    /// 2. `~/.taskloom/config.toml`
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(key) = ["TASKLOOM_API_KEY", "OPENAI_API_KEY"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        {
            self.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("TASKLOOM_API_URL") {
            self.api_url = url;
        }
        if let Ok(model) = std::env::var("TASKLOOM_MODEL") {
            self.default_model = model;
        }
        if let Ok(mode) = std::env::var("TASKLOOM_MODE") {
            self.default_mode = mode;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".taskloom")
    }

    /// Directory for named configurations.
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("configs"))
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.default_model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "default_model must not be empty".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Settings derived from the top-level fields, under the file's
    /// `[settings]` table.
    pub fn base_settings(&self) -> Settings {
        let derived = Settings::new()
            .with("model", self.default_model.as_str())
            .with("temperature", f64::from(self.default_temperature));
        self.settings.merged_over(&derived)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            default_model: default_model(),
            default_mode: default_mode(),
            default_temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
            store_dir: None,
            settings: Settings::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to write config at {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Invalid value for '{key}' ({value}): {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
