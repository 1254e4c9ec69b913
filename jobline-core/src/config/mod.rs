//! Configuration management for jobline
//!
//! Environment-based configuration with defaults, file loading, and
//! validation. Everything the chat core touches at runtime is configured
//! here: the REST backend, the realtime relay, and conversation behavior.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// REST backend (directory + history) configuration
    pub api: ApiConfig,

    /// Realtime relay configuration
    pub relay: RelayConfig,

    /// Conversation behavior
    pub chat: ChatConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// REST backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the job-board API (directory and message history)
    pub base_url: String,

    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

/// Realtime relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// WebSocket URL of the messaging relay
    pub url: String,

    /// Initial reconnect backoff after a connection loss
    #[serde(with = "humantime_serde")]
    pub reconnect_initial_backoff: Duration,

    /// Reconnect backoff cap
    #[serde(with = "humantime_serde")]
    pub reconnect_max_backoff: Duration,
}

/// Conversation behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Quiet period after which the typing indicator self-clears
    #[serde(with = "humantime_serde")]
    pub typing_quiet_period: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            relay: RelayConfig::default(),
            chat: ChatConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3000/ws".to_string(),
            reconnect_initial_backoff: Duration::from_millis(500),
            reconnect_max_backoff: Duration::from_secs(30),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            typing_quiet_period: Duration::from_secs(2),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: JOBLINE_<SECTION>_<KEY>
    /// Example: JOBLINE_API_BASE_URL=https://api.example.com
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = env::var("JOBLINE_API_BASE_URL") {
            config.api.base_url = url;
        }
        if let Ok(url) = env::var("JOBLINE_RELAY_URL") {
            config.relay.url = url;
        }

        if let Ok(level) = env::var("JOBLINE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = env::var("JOBLINE_LOG_JSON") {
            config.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid JSON flag: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.base_url.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "api.base_url must not be empty".to_string(),
            ));
        }
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(ConfigError::ValidationFailed(format!(
                "api.base_url must be an http(s) URL: {}",
                self.api.base_url
            )));
        }

        if !self.relay.url.starts_with("ws://") && !self.relay.url.starts_with("wss://") {
            return Err(ConfigError::ValidationFailed(format!(
                "relay.url must be a ws(s) URL: {}",
                self.relay.url
            )));
        }
        if self.relay.reconnect_initial_backoff > self.relay.reconnect_max_backoff {
            return Err(ConfigError::ValidationFailed(
                "relay reconnect initial backoff exceeds the cap".to_string(),
            ));
        }

        if self.chat.typing_quiet_period.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "chat.typing_quiet_period must be greater than 0".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chat.typing_quiet_period, Duration::from_secs(2));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.api.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.relay.url = "http://not-a-socket".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.chat.typing_quiet_period = Duration::ZERO;
        assert!(config.validate().is_err());

        config = Config::default();
        config.relay.reconnect_initial_backoff = Duration::from_secs(60);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = Config::default();

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobline.toml");

        let mut config = Config::default();
        config.api.base_url = "https://jobs.example.com".to_string();
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.api.base_url, "https://jobs.example.com");
        assert_eq!(
            loaded.relay.reconnect_max_backoff,
            config.relay.reconnect_max_backoff
        );
    }
}
