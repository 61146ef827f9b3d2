//! Configuration for the simple-iot core.
//!
//! Supports YAML file and environment variable overrides, with
//! environment variables taking precedence.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Core server configuration: `dataDir`, `server`, `authToken`,
/// `reportMetricsPeriod`, `scheduleTick`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filesystem path for the persistent KV store.
    pub data_dir: String,
    /// Broker connection string. The in-process bus ignores this field
    /// today; it is carried for config-surface parity and as the seam a
    /// networked bus implementation would read.
    pub server: String,
    /// Shared secret for privileged subjects. Empty disables the check.
    pub auth_token: String,
    /// Metrics reporting period, seconds.
    pub report_metrics_period_secs: u64,
    /// Schedule sweeper tick period, seconds.
    pub schedule_tick_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            server: "memory".to_string(),
            auth_token: String::new(),
            report_metrics_period_secs: 60,
            schedule_tick_secs: 5,
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file (`SIMPLE_IOT_CONFIG`, default `config.yaml`)
    /// 3. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("SIMPLE_IOT_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("SIMPLE_IOT_DATA_DIR") {
            self.data_dir = dir;
        }
        if let Ok(token) = std::env::var("SIMPLE_IOT_AUTH_TOKEN") {
            self.auth_token = token;
        }
        if let Ok(server) = std::env::var("SIMPLE_IOT_SERVER") {
            self.server = server;
        }
        if let Ok(secs) = std::env::var("SIMPLE_IOT_REPORT_METRICS_PERIOD_SECS") {
            if let Ok(v) = secs.parse() {
                self.report_metrics_period_secs = v;
            }
        }
        if let Ok(secs) = std::env::var("SIMPLE_IOT_SCHEDULE_TICK_SECS") {
            if let Ok(v) = secs.parse() {
                self.schedule_tick_secs = v;
            }
        }
    }

    pub fn report_metrics_period(&self) -> Duration {
        Duration::from_secs(self.report_metrics_period_secs)
    }

    pub fn schedule_tick(&self) -> Duration {
        Duration::from_secs(self.schedule_tick_secs)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    FileRead(String, String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
