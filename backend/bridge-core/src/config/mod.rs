use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "bridge.toml";
const CONFIG_DIR_NAME: &str = "bridge";
const CONFIG_VERSION: u32 = 1;
const MAX_DEDUP_WINDOW: usize = 65_536;

/// Method name of the one-time readiness handshake.
pub const DEFAULT_READY_METHOD: &str = "bridge.ready";

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Number of recent command ids remembered for idempotency.
    #[serde(default = "default_dedup_window")]
    pub dedup_window: usize,
    #[serde(default = "default_ready_method")]
    pub ready_method: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            dedup_window: default_dedup_window(),
            ready_method: default_ready_method(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushConfig {
    /// Capacity of the queue between watchers and the push ledger.
    #[serde(default = "default_ledger_queue")]
    pub ledger_queue: usize,
    /// Consecutive transport failures before the connection counts as lost.
    #[serde(default = "default_health_failure_threshold")]
    pub health_failure_threshold: u32,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            ledger_queue: default_ledger_queue(),
            health_failure_threshold: default_health_failure_threshold(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub push: PushConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            router: RouterConfig::default(),
            server: ServerConfig::default(),
            push: PushConfig::default(),
        }
    }
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_dedup_window() -> usize {
    256
}

fn default_ready_method() -> String {
    DEFAULT_READY_METHOD.to_string()
}

fn default_port() -> u16 {
    19876
}

fn default_ledger_queue() -> usize {
    256
}

fn default_health_failure_threshold() -> u32 {
    3
}

// ============================================
// IMPLEMENTATION
// ============================================

impl BridgeConfig {
    /// Platform config directory for the bridge (`<config_dir>/bridge`).
    pub fn default_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME))
            .ok_or_else(|| ConfigError::DirectoryNotFound {
                location: ErrorLocation::from(Location::caller()),
            })
    }

    /// Load config from `{config_dir}/bridge.toml`.
    ///
    /// A missing file yields defaults. A file that exists but cannot be read,
    /// parsed or validated is an error.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            info!(
                "Config file not found at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path).map_err(|e| {
            warn!("Failed to read config file: {}", e);
            ConfigError::ReadError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                source: e,
            }
        })?;

        let config: BridgeConfig = toml::from_str(&contents).map_err(|e| {
            warn!("Failed to parse config TOML: {}", e);
            ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: config_path.clone(),
                reason: e.to_string(),
            }
        })?;

        config.validate()?;

        info!("Config loaded from {}", config_path.display());
        Ok(config)
    }

    /// Save config to `{config_dir}/bridge.toml` via temp file + rename.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        std::fs::create_dir_all(config_dir).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_dir.to_path_buf(),
            source: e,
        })?;

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let temp_path = config_dir.join(format!("{}.tmp", CONFIG_FILE_NAME));

        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError {
            location: ErrorLocation::from(Location::caller()),
            reason: e.to_string(),
        })?;

        std::fs::write(&temp_path, contents).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &config_path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: config_path.clone(),
            source: e,
        })?;

        info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Validate config values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 || self.version > CONFIG_VERSION {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid version: {} (expected 1-{})",
                    self.version, CONFIG_VERSION
                ),
            });
        }

        if self.router.dedup_window == 0 || self.router.dedup_window > MAX_DEDUP_WINDOW {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: format!(
                    "Invalid dedup window: {} (must be 1-{})",
                    self.router.dedup_window, MAX_DEDUP_WINDOW
                ),
            });
        }

        if self.router.ready_method.trim().is_empty() {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "ready_method cannot be empty".to_string(),
            });
        }

        if self.push.ledger_queue == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "ledger_queue must be at least 1".to_string(),
            });
        }

        if self.push.health_failure_threshold == 0 {
            return Err(ConfigError::ValidationError {
                location: ErrorLocation::from(Location::caller()),
                reason: "health_failure_threshold must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}
