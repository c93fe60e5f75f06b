//! Configuration loading and representation.
//!
//! Every field has a default, so an empty (or absent) TOML file yields a
//! working configuration. A handful of deployment-specific values can be
//! overridden from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crm_core::DomainError;
use crm_inventory::RestockPolicy;

use crate::scheduler::cron::CronSchedule;

/// Longest look-back window, in days, accepted for reminders and cleanup.
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Root configuration for the CRM jobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrmConfig {
    pub remote: RemoteConfig,
    pub restock: RestockConfig,
    pub reminders: RemindersConfig,
    pub cleanup: CleanupConfig,
    pub logs: LogsConfig,
    pub schedule: ScheduleConfig,
    pub database: DatabaseConfig,
    pub observability: ObservabilityConfig,
}

/// Remote GraphQL endpoint used on the remote-first path of each job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/graphql/".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestockConfig {
    pub low_stock_threshold: i64,
    pub restock_amount: i64,
}

impl Default for RestockConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: RestockPolicy::DEFAULT_THRESHOLD,
            restock_amount: RestockPolicy::DEFAULT_RESTOCK_AMOUNT,
        }
    }
}

impl RestockConfig {
    pub fn policy(&self) -> Result<RestockPolicy, DomainError> {
        RestockPolicy::new(self.low_stock_threshold, self.restock_amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemindersConfig {
    pub order_reminder_days: i64,
}

impl Default for RemindersConfig {
    fn default() -> Self {
        Self {
            order_reminder_days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub inactive_customer_days: i64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            inactive_customer_days: 365,
        }
    }
}

/// Primary and fallback location of one job's log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPaths {
    pub primary: PathBuf,
    pub fallback: Option<PathBuf>,
}

impl LogPaths {
    /// `/tmp/<file>` with `/var/log/<file>` as fallback.
    pub fn standard(file_name: &str) -> Self {
        Self {
            primary: Path::new("/tmp").join(file_name),
            fallback: Some(Path::new("/var/log").join(file_name)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsConfig {
    pub heartbeat: LogPaths,
    pub low_stock: LogPaths,
    pub customer_cleanup: LogPaths,
    pub order_reminders: LogPaths,
    pub report: LogPaths,
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            heartbeat: LogPaths::standard("crm_heartbeat_log.txt"),
            low_stock: LogPaths::standard("low_stock_updates_log.txt"),
            customer_cleanup: LogPaths::standard("customer_cleanup_log.txt"),
            order_reminders: LogPaths::standard("order_reminders_log.txt"),
            report: LogPaths::standard("crm_report_log.txt"),
        }
    }
}

/// Cron expressions (`MIN HOUR DOM MON DOW`) for the in-process scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub heartbeat: String,
    pub low_stock: String,
    pub customer_cleanup: String,
    pub order_reminders: String,
    pub report: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            heartbeat: "*/5 * * * *".into(),
            low_stock: "0 */12 * * *".into(),
            customer_cleanup: "0 2 * * 0".into(),
            order_reminders: "0 8 * * *".into(),
            report: "0 6 * * 1".into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Postgres connection string. When unset, an in-memory store is used.
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { json: true }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl CrmConfig {
    /// Load from `path` (or defaults), apply environment overrides, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file without environment overrides or validation.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `CRM_*` overrides looked up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("CRM_GRAPHQL_URL") {
            self.remote.endpoint = url;
        }
        if let Some(url) = lookup("CRM_DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(v) = lookup("CRM_LOW_STOCK_THRESHOLD") {
            self.restock.low_stock_threshold = parse_int("CRM_LOW_STOCK_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("CRM_RESTOCK_AMOUNT") {
            self.restock.restock_amount = parse_int("CRM_RESTOCK_AMOUNT", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.restock
            .policy()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.remote.timeout_secs == 0 {
            return Err(ConfigError::Invalid("remote.timeout_secs must be > 0".into()));
        }
        for (key, days) in [
            ("reminders.order_reminder_days", self.reminders.order_reminder_days),
            ("cleanup.inactive_customer_days", self.cleanup.inactive_customer_days),
        ] {
            if !(0..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be between 0 and {MAX_WINDOW_DAYS}, got {days}"
                )));
            }
        }

        let s = &self.schedule;
        for expr in [
            &s.heartbeat,
            &s.low_stock,
            &s.customer_cleanup,
            &s.order_reminders,
            &s.report,
        ] {
            CronSchedule::parse(expr).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        }
        Ok(())
    }
}

fn parse_int(key: &str, value: &str) -> Result<i64, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid(format!("{key} must be an integer, got {value:?}")))
}
