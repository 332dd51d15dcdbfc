use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::backoff::RetryPolicy;
use crate::scheduler::SchedulerConfig;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub rpc: RpcConfig,
    pub quotes: QuotesConfig,
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// WebSocket endpoint for the portal trade stream
    pub ws_url: String,
    /// Token symbols to subscribe to (empty = all token trades)
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl FeedConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    /// Chain RPC endpoint used for health checks
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotesConfig {
    /// REST API endpoint for token quotes
    pub rest_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSection {
    /// Seconds between maintenance ticks
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Hours to keep settled trades before eviction
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
}

fn default_interval_secs() -> u64 {
    60
}

fn default_retention_hours() -> u64 {
    24
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            retention_hours: default_retention_hours(),
        }
    }
}

impl SchedulerSection {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.interval_secs),
            retention: Duration::from_secs(self.retention_hours * 3600),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Maximum attempts for an outbound call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff delay in seconds; doubles per attempt
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,
    /// Cap on the backoff delay in seconds
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_secs() -> u64 {
    1
}

fn default_max_delay_secs() -> u64 {
    60
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

impl RetrySection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.base_delay_secs),
            Duration::from_secs(self.max_delay_secs),
        )
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("feed.connect_timeout_secs", 10)?
            .set_default("scheduler.interval_secs", 60)?
            .set_default("scheduler.retention_hours", 24)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("MINTDESK_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (MINTDESK_FEED__WS_URL, etc.)
            .add_source(
                Environment::with_prefix("MINTDESK")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}
