//! Configuration management for the Farm Operations backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides (FARMOPS__SECTION__KEY)

use std::time::Duration;

use config::{ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{LifecycleParams, SoilThresholds};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Log output format: "pretty" or "json"
    pub log_format: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Monitoring engine configuration
    pub monitoring: MonitoringConfig,

    /// System notification delivery
    pub notifier: NotifierConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; in-memory stores are used when unset
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitoringConfig {
    /// Timer interval driving the lifecycle monitor
    pub interval_secs: u64,

    /// Days after planting before a crop counts as growing
    pub early_growth_days: i64,

    /// Days before harvest at which the harvest reminder fires
    pub harvest_lookahead_days: i64,

    /// Low stock threshold for items without their own
    pub default_low_stock_threshold: Decimal,

    /// Window for task due-soon alerts
    pub task_due_soon_hours: i64,

    /// Cash-flow rule runs every N timer ticks
    pub cashflow_every_ticks: u64,

    pub irrigation_reminder_start_day: i64,

    pub irrigation_reminder_every_days: i64,

    /// Send pest control reminders in addition to showing them in schedules
    pub alert_pest_control: bool,

    /// Polling interval for stores without push change feeds
    pub poll_interval_secs: u64,

    /// Buffered events per live alert subscriber
    pub live_channel_capacity: usize,
}

impl MonitoringConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn task_due_soon_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.task_due_soon_hours)
    }

    pub fn lifecycle_params(&self) -> LifecycleParams {
        LifecycleParams {
            early_growth_days: self.early_growth_days,
            harvest_lookahead_days: self.harvest_lookahead_days,
            irrigation_start_day: self.irrigation_reminder_start_day,
            irrigation_every_days: self.irrigation_reminder_every_days,
            alert_pest_control: self.alert_pest_control,
        }
    }

    pub fn soil_thresholds(&self) -> SoilThresholds {
        SoilThresholds::default()
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            early_growth_days: 3,
            harvest_lookahead_days: 7,
            default_low_stock_threshold: Decimal::from(10),
            task_due_soon_hours: 24,
            cashflow_every_ticks: 1,
            irrigation_reminder_start_day: 7,
            irrigation_reminder_every_days: 3,
            alert_pest_control: false,
            poll_interval_secs: 60,
            live_channel_capacity: 256,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifierConfig {
    /// Deliver urgent alerts as LINE push messages
    pub enabled: bool,

    /// LINE Messaging API access token
    pub line_channel_token: Option<String>,

    /// LINE user or group id receiving the pushes
    pub line_recipient: Option<String>,

    /// Icon shown next to system notifications
    pub icon_url: Option<String>,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("FARMOPS_ENVIRONMENT").unwrap_or_else(|_| "development".into());
        let monitoring = MonitoringConfig::default();

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("log_format", "pretty")?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("monitoring.interval_secs", monitoring.interval_secs)?
            .set_default("monitoring.early_growth_days", monitoring.early_growth_days)?
            .set_default(
                "monitoring.harvest_lookahead_days",
                monitoring.harvest_lookahead_days,
            )?
            .set_default(
                "monitoring.default_low_stock_threshold",
                monitoring.default_low_stock_threshold.to_string(),
            )?
            .set_default("monitoring.task_due_soon_hours", monitoring.task_due_soon_hours)?
            .set_default("monitoring.cashflow_every_ticks", monitoring.cashflow_every_ticks)?
            .set_default(
                "monitoring.irrigation_reminder_start_day",
                monitoring.irrigation_reminder_start_day,
            )?
            .set_default(
                "monitoring.irrigation_reminder_every_days",
                monitoring.irrigation_reminder_every_days,
            )?
            .set_default("monitoring.alert_pest_control", monitoring.alert_pest_control)?
            .set_default("monitoring.poll_interval_secs", monitoring.poll_interval_secs)?
            .set_default(
                "monitoring.live_channel_capacity",
                monitoring.live_channel_capacity as u64,
            )?
            .set_default("notifier.enabled", false)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (FARMOPS_ prefix)
            .add_source(
                Environment::with_prefix("FARMOPS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Config {
    /// Development settings with in-memory stores and no notifier
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_format: "pretty".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            monitoring: MonitoringConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            min_connections: 2,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            line_channel_token: None,
            line_recipient: None,
            icon_url: None,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}
