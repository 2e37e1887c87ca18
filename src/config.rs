//! Runtime configuration loaded from the environment.
//!
//! Variables use the `STRATEGY_HEALTH` prefix with `__` between sections, e.g.
//! `STRATEGY_HEALTH__DATABASE__PATH=/var/lib/strategy/health.sqlite` or
//! `STRATEGY_HEALTH__REPORTING__TIMEZONE=Asia/Shanghai`. A `.env` file is read
//! first when present. Every section has defaults, so an empty environment
//! yields a usable configuration.

use std::path::PathBuf;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::services::collector_registry::DEFAULT_COLLECTION_TIMEOUT_MS;

pub const ENV_PREFIX: &str = "STRATEGY_HEALTH";
const MAX_COLLECTION_TIMEOUT_MS: u64 = 120_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives; `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub directives: Option<String>,
    /// Daily-rolling log files are written here when set.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectionConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportingConfig {
    /// IANA name; decides which calendar day a snapshot falls on.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("strategy-health.sqlite")
}

fn default_timeout_ms() -> u64 {
    DEFAULT_COLLECTION_TIMEOUT_MS
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl AppConfig {
    pub fn load() -> AppResult<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.database.path.as_os_str().is_empty() {
            return Err(AppError::config("database.path 不能为空"));
        }
        if !(1..=MAX_COLLECTION_TIMEOUT_MS).contains(&self.collection.timeout_ms) {
            return Err(AppError::config(format!(
                "collection.timeout_ms 必须在 1..={MAX_COLLECTION_TIMEOUT_MS} 之间: {}",
                self.collection.timeout_ms
            )));
        }
        self.reporting.tz()?;
        Ok(())
    }
}

impl ReportingConfig {
    pub fn tz(&self) -> AppResult<Tz> {
        self.timezone
            .trim()
            .parse::<Tz>()
            .map_err(|_| AppError::config(format!("无效的时区: {}", self.timezone)))
    }
}
