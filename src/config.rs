//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// API gateway connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_push_path")]
    pub push_path: String,

    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_push_path() -> String {
    "/ws-notifications".to_string()
}

fn default_topic() -> String {
    "/topic/notifications".to_string()
}

fn default_request_timeout() -> u64 {
    10_000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            push_path: default_push_path(),
            topic: default_topic(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

/// Session token storage settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionConfig {
    /// Token store file. Defaults to the user data directory.
    pub token_store: Option<String>,
}

impl SessionConfig {
    /// Resolved path of the token store file
    pub fn token_store_path(&self) -> PathBuf {
        match &self.token_store {
            Some(path) => PathBuf::from(path),
            None => dirs::data_local_dir()
                .map(|p| p.join("energy-portal").join("session.json"))
                .unwrap_or_else(|| PathBuf::from("./energy_portal_session.json")),
        }
    }
}

/// Live alert feed settings
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_active_cap")]
    pub active_cap: usize,

    #[serde(default = "default_expiry")]
    pub expiry_ms: u64,

    /// Optional cap for the history view; unbounded when absent
    #[serde(default)]
    pub history_cap: Option<usize>,

    #[serde(default = "default_fallback_label")]
    pub fallback_label: String,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_active_cap() -> usize {
    3
}

fn default_expiry() -> u64 {
    8000 // 8 seconds
}

fn default_fallback_label() -> String {
    "Unknown property".to_string()
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            active_cap: default_active_cap(),
            expiry_ms: default_expiry(),
            history_cap: None,
            fallback_label: default_fallback_label(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl FeedConfig {
    pub fn expiry(&self) -> Duration {
        Duration::from_millis(self.expiry_ms)
    }
}

/// Dashboard settings
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_property_id")]
    pub property_id: String,

    #[serde(default = "default_refetch_delay")]
    pub refetch_delay_ms: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_high_usage")]
    pub high_usage_kwh: f64,
}

fn default_property_id() -> String {
    "METER-CBEAA6CF".to_string()
}

fn default_refetch_delay() -> u64 {
    1500 // gives the backend time to process the reading
}

fn default_poll_interval() -> u64 {
    30
}

fn default_high_usage() -> f64 {
    50.0
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            property_id: default_property_id(),
            refetch_delay_ms: default_refetch_delay(),
            poll_interval_secs: default_poll_interval(),
            high_usage_kwh: default_high_usage(),
        }
    }
}

impl DashboardConfig {
    pub fn refetch_delay(&self) -> Duration {
        Duration::from_millis(self.refetch_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from an explicit path, or from default locations or environment
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_with_env(path),
            None => Ok(Self::load_default()),
        }
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("energy-portal").join("config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("ENERGY_PORTAL_GATEWAY_URL") {
            self.gateway.base_url = url;
        }
        if let Ok(timeout) = std::env::var("ENERGY_PORTAL_REQUEST_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.gateway.request_timeout_ms = ms;
            }
        }

        if let Ok(path) = std::env::var("ENERGY_PORTAL_TOKEN_STORE") {
            self.session.token_store = Some(path);
        }

        if let Ok(property_id) = std::env::var("ENERGY_PORTAL_PROPERTY_ID") {
            self.dashboard.property_id = property_id;
        }

        if let Ok(level) = std::env::var("ENERGY_PORTAL_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("ENERGY_PORTAL_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Energy Portal Configuration
#
# Environment variables override these settings:
# - ENERGY_PORTAL_GATEWAY_URL
# - ENERGY_PORTAL_REQUEST_TIMEOUT_MS
# - ENERGY_PORTAL_TOKEN_STORE
# - ENERGY_PORTAL_PROPERTY_ID
# - ENERGY_PORTAL_LOG_LEVEL
# - ENERGY_PORTAL_LOG_FORMAT

[gateway]
# API gateway base URL
base_url = "http://localhost:8080"

# WebSocket path of the push channel
push_path = "/ws-notifications"

# Notification topic to subscribe to
topic = "/topic/notifications"

# Request timeout in milliseconds
request_timeout_ms = 10000

[session]
# Where the session token is kept (default: user data directory)
# token_store = "~/.local/share/energy-portal/session.json"

[feed]
# Maximum number of alerts shown as toasts at once
active_cap = 3

# How long a toast stays visible (ms)
expiry_ms = 8000

# Optional cap on the alert history (unbounded when absent)
# history_cap = 500

# Label used when an alert's property is not in the directory
fallback_label = "Unknown property"

[dashboard]
# Property shown on the dashboard
property_id = "METER-CBEAA6CF"

# Delay before re-fetching the report after logging a reading (ms)
refetch_delay_ms = 1500

# Report polling interval in watch mode (seconds)
poll_interval_secs = 30

# Readings above this value are highlighted (kWh)
high_usage_kwh = 50.0

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
