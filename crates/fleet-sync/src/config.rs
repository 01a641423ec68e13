//! # Sync Configuration
//!
//! Configuration management for the sync engine.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     FLEET_API_URL=https://fleet.example.com                            │
//! │     FLEET_PUSH_URL=wss://fleet.example.com                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/fleet-dashboard/fleet.toml (Linux)                       │
//! │     ~/Library/Application Support/com.fleet.dashboard/fleet.toml       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # fleet.toml
//! [api]
//! base_url = "https://case-study-26cf.onrender.com"
//! request_timeout_secs = 30
//!
//! [push]
//! url = "wss://case-study-26cf.onrender.com"
//! enabled = true
//! reconnect_delay_secs = 5
//!
//! [clock]
//! tick_interval_ms = 1000
//!
//! [engine]
//! update_queue_capacity = 256
//! statistics_refresh_secs = 0
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// API Settings
// =============================================================================

/// REST endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL; endpoint paths (`/api/vehicles`, ...) are appended.
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// Per-request timeout (seconds). A timeout is a transport failure.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://case-study-26cf.onrender.com".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_api_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// =============================================================================
// Push Settings
// =============================================================================

/// Push channel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSettings {
    /// WebSocket URL of the push channel.
    #[serde(default = "default_push_url")]
    pub url: String,

    /// Disable to run on REST polling only.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Fixed delay before each reconnection attempt (seconds).
    /// There is no retry cap.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,

    /// Connection timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Keepalive ping interval (seconds).
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,
}

fn default_push_url() -> String {
    "wss://case-study-26cf.onrender.com".to_string()
}

fn default_true() -> bool {
    true
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_ping_interval() -> u64 {
    30
}

impl Default for PushSettings {
    fn default() -> Self {
        PushSettings {
            url: default_push_url(),
            enabled: true,
            reconnect_delay_secs: default_reconnect_delay(),
            connect_timeout_secs: default_connect_timeout(),
            ping_interval_secs: default_ping_interval(),
        }
    }
}

// =============================================================================
// Clock Settings
// =============================================================================

/// Freshness ticker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockSettings {
    /// Label recompute cadence (milliseconds).
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

fn default_tick_interval() -> u64 {
    1000
}

impl Default for ClockSettings {
    fn default() -> Self {
        ClockSettings {
            tick_interval_ms: default_tick_interval(),
        }
    }
}

// =============================================================================
// Engine Settings
// =============================================================================

/// Sync engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Capacity of the serialized state update queue.
    #[serde(default = "default_queue_capacity")]
    pub update_queue_capacity: usize,

    /// Periodic authoritative statistics refresh (seconds). 0 disables it.
    #[serde(default)]
    pub statistics_refresh_secs: u64,
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            update_queue_capacity: default_queue_capacity(),
            statistics_refresh_secs: 0,
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete sync configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub push: PushSettings,

    #[serde(default)]
    pub clock: ClockSettings,

    #[serde(default)]
    pub engine: EngineSettings,
}

impl FleetConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (fleet.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading fleet config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load fleet config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> SyncResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| SyncError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Fleet config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        let api = url::Url::parse(&self.api.base_url)?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.push.enabled {
            let push = url::Url::parse(&self.push.url)?;
            if !matches!(push.scheme(), "ws" | "wss") {
                return Err(SyncError::InvalidUrl(format!(
                    "Push URL must start with ws:// or wss://, got: {}",
                    self.push.url
                )));
            }
        }

        if self.clock.tick_interval_ms == 0 {
            return Err(SyncError::InvalidConfig(
                "tick_interval_ms must be greater than 0".into(),
            ));
        }

        if self.engine.update_queue_capacity == 0 {
            return Err(SyncError::InvalidConfig(
                "update_queue_capacity must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("FLEET_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Ok(url) = std::env::var("FLEET_PUSH_URL") {
            debug!(url = %url, "Overriding push URL from environment");
            self.push.url = url;
        }

        if let Ok(enabled) = std::env::var("FLEET_PUSH_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.push.enabled = true,
                "0" | "false" | "no" | "off" => self.push.enabled = false,
                _ => warn!(value = %enabled, "Unknown FLEET_PUSH_ENABLED value"),
            }
        }

        if let Ok(delay) = std::env::var("FLEET_RECONNECT_DELAY_SECS") {
            if let Ok(d) = delay.parse::<u64>() {
                self.push.reconnect_delay_secs = d;
            }
        }

        if let Ok(timeout) = std::env::var("FLEET_REQUEST_TIMEOUT_SECS") {
            if let Ok(t) = timeout.parse::<u64>() {
                self.api.request_timeout_secs = t;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "fleet", "dashboard")
            .map(|dirs| dirs.config_dir().join("fleet.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.push.reconnect_delay_secs)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.clock.tick_interval_ms)
    }

    /// `None` when periodic statistics refresh is disabled.
    pub fn statistics_refresh(&self) -> Option<Duration> {
        match self.engine.statistics_refresh_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FleetConfig::default();
        assert_eq!(config.push.reconnect_delay_secs, 5);
        assert_eq!(config.clock.tick_interval_ms, 1000);
        assert!(config.push.enabled);
        assert_eq!(config.statistics_refresh(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = FleetConfig::default();

        config.api.base_url = "ftp://fleet".to_string();
        assert!(config.validate().is_err());

        config.api.base_url = "http://localhost:8080".to_string();
        config.push.url = "http://localhost:8080".to_string();
        assert!(config.validate().is_err());

        // A disabled push channel is not validated
        config.push.enabled = false;
        assert!(config.validate().is_ok());

        config.push.enabled = true;
        config.push.url = "ws://localhost:8080".to_string();
        assert!(config.validate().is_ok());

        config.clock.tick_interval_ms = 0;
        assert!(config.validate().is_err_and(|e| e.is_config_error()));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: FleetConfig = toml::from_str(
            r#"
            [api]
            base_url = "http://10.0.0.5:3000"

            [push]
            reconnect_delay_secs = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.api.base_url, "http://10.0.0.5:3000");
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.reconnect_delay(), Duration::from_secs(2));
        assert_eq!(config.push.url, "wss://case-study-26cf.onrender.com");
    }

    #[test]
    fn test_toml_serialization() {
        let config = FleetConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[api]"));
        assert!(toml_str.contains("[push]"));
        assert!(toml_str.contains("[engine]"));
    }
}
