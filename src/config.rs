//! Configuration module for feedrelay.

use serde::Deserialize;
use std::path::Path;

use crate::{RelayError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/feedrelay.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedrelay.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Feed polling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedsConfig {
    /// Delay between the end of one pass and the start of the next.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Maximum number of subscriptions a group may hold.
    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions_per_group: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// User agent sent with feed requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_poll_interval() -> u64 {
    10
}

fn default_max_subscriptions() -> usize {
    10
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_user_agent() -> String {
    "feedrelay/0.1 (feed notifier)".to_string()
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_subscriptions_per_group: default_max_subscriptions(),
            max_feed_size_bytes: default_max_feed_size(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
        }
    }
}

/// Webhook delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Display name used for posted messages.
    #[serde(default = "default_delivery_username")]
    pub username: String,
    /// Request timeout in seconds for a single delivery.
    #[serde(default = "default_delivery_timeout")]
    pub timeout_secs: u64,
}

fn default_delivery_username() -> String {
    "feedrelay".to_string()
}

fn default_delivery_timeout() -> u64 {
    15
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            username: default_delivery_username(),
            timeout_secs: default_delivery_timeout(),
        }
    }
}

/// A chat channel reachable through a webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelRoute {
    /// Owning group ID.
    pub group_id: i64,
    /// Channel ID within the group.
    pub channel_id: i64,
    /// Human readable channel name.
    #[serde(default)]
    pub name: String,
    /// Webhook URL messages are posted to.
    pub webhook_url: String,
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Feed polling configuration.
    #[serde(default)]
    pub feeds: FeedsConfig,
    /// Delivery configuration.
    #[serde(default)]
    pub delivery: DeliveryConfig,
    /// Known channels.
    #[serde(default)]
    pub channels: Vec<ChannelRoute>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RelayError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RelayError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FEEDRELAY_DATABASE_PATH`: Override the database path
    /// - `FEEDRELAY_LOG_LEVEL`: Override the log level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("FEEDRELAY_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }
        if let Ok(level) = std::env::var("FEEDRELAY_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.feeds.poll_interval_secs == 0 {
            return Err(RelayError::Config(
                "feeds.poll_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.feeds.max_subscriptions_per_group == 0 {
            return Err(RelayError::Config(
                "feeds.max_subscriptions_per_group must be greater than 0".to_string(),
            ));
        }
        for route in &self.channels {
            if url::Url::parse(&route.webhook_url).is_err() {
                return Err(RelayError::Config(format!(
                    "invalid webhook_url for channel {}/{}: {}",
                    route.group_id, route.channel_id, route.webhook_url
                )));
            }
        }
        Ok(())
    }
}
