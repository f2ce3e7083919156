//! Configuration resolution for pcsetup.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/pcsetup/settings.json)
//! 3. Environment variables
//! 4. CLI arguments (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

/// Complete pcsetup configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Backend API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// API root every operation path is appended to.
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Credential handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// An access token this close to expiry is refreshed before use.
    pub expiry_buffer_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_buffer_secs: 60,
        }
    }
}

/// Status polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    pub interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_secs: 5 }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Load configuration with hierarchical resolution.
pub fn load_config() -> Result<Config> {
    let mut config = match global_config_path() {
        Some(path) if path.exists() => {
            debug!(path = %path.display(), "loading global config");
            load_config_file(&path)?
        }
        _ => Config::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .ok()
            .map(|h| PathBuf::from(h).join(".pcsetup").join("settings.json"))
    }
    #[cfg(target_os = "macos")]
    {
        std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library/Application Support/pcsetup/settings.json"))
    }
    #[cfg(target_os = "linux")]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")))
            .map(|p| p.join("pcsetup").join("settings.json"))
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

/// Read one config file; sections missing from the file keep their defaults.
pub fn load_config_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(val) = std::env::var("PCSETUP_API_URL") {
        config.api.base_url = val;
    }
    if let Ok(val) = std::env::var("PCSETUP_REQUEST_TIMEOUT_SECS") {
        if let Ok(n) = val.parse() {
            config.api.request_timeout_secs = n;
        }
    }
    if let Ok(val) = std::env::var("PCSETUP_POLL_INTERVAL_SECS") {
        if let Ok(n) = val.parse() {
            config.poll.interval_secs = n;
        }
    }
    if let Ok(val) = std::env::var("PCSETUP_LOG_LEVEL") {
        config.log_level = Some(val);
    }
}
