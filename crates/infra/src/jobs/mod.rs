//! Scheduled CRM jobs.
//!
//! ## Jobs
//!
//! - `heartbeat`: liveness line plus a `hello` probe
//! - `low-stock`: restock products below the threshold (remote first)
//! - `customer-cleanup`: delete long-inactive customers (store only)
//! - `order-reminders`: list recent orders (remote first)
//! - `report`: customer/order/revenue totals (remote first)
//!
//! Each run is a single unit of work that always appends to its own log and
//! never propagates an error: the outcome says how it went.

pub mod cleanup;
pub mod heartbeat;
pub mod reminders;
pub mod replenishment;
pub mod report;

#[cfg(test)]
pub(crate) mod testing;

pub use cleanup::{CleanupOutcome, CustomerCleanup};
pub use heartbeat::{Heartbeat, HeartbeatOutcome};
pub use reminders::{OrderReminders, Reminder, RemindersOutcome};
pub use replenishment::{
    ReplenishmentError, ReplenishmentOutcome, Replenisher, UpdatedProduct,
};
pub use report::{ReportOutcome, ReportStats, Reporter};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crm_inventory::RestockPolicy;

use crate::config::{ConfigError, CrmConfig, LogPaths};
use crate::log_sink::LogSink;
use crate::remote::CrmRemote;
use crate::store::CrmStore;

/// Job kind, as named on the command line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    Heartbeat,
    LowStock,
    CustomerCleanup,
    OrderReminders,
    Report,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        JobKind::Heartbeat,
        JobKind::LowStock,
        JobKind::CustomerCleanup,
        JobKind::OrderReminders,
        JobKind::Report,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            JobKind::Heartbeat => "heartbeat",
            JobKind::LowStock => "low-stock",
            JobKind::CustomerCleanup => "customer-cleanup",
            JobKind::OrderReminders => "order-reminders",
            JobKind::Report => "report",
        }
    }

    /// Configured cron expression for this job.
    pub fn schedule<'a>(&self, config: &'a CrmConfig) -> &'a str {
        let s = &config.schedule;
        match self {
            JobKind::Heartbeat => &s.heartbeat,
            JobKind::LowStock => &s.low_stock,
            JobKind::CustomerCleanup => &s.customer_cleanup,
            JobKind::OrderReminders => &s.order_reminders,
            JobKind::Report => &s.report,
        }
    }

    /// Configured log locations for this job.
    pub fn log_paths<'a>(&self, config: &'a CrmConfig) -> &'a LogPaths {
        let l = &config.logs;
        match self {
            JobKind::Heartbeat => &l.heartbeat,
            JobKind::LowStock => &l.low_stock,
            JobKind::CustomerCleanup => &l.customer_cleanup,
            JobKind::OrderReminders => &l.order_reminders,
            JobKind::Report => &l.report,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = JobKind::ALL.iter().map(JobKind::name).collect();
                format!("unknown job {s:?} (expected one of: {})", known.join(", "))
            })
    }
}

/// Start of a look-back window of `days` ending at `now`. Windows reaching
/// past the earliest representable instant start there.
pub(crate) fn window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Human-facing result of one job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobReport {
    pub kind: JobKind,
    pub succeeded: bool,
    pub summary: String,
}

/// Runs any job against a shared store and remote.
#[derive(Clone)]
pub struct CrmJobs {
    config: Arc<CrmConfig>,
    store: Arc<dyn CrmStore>,
    remote: Arc<dyn CrmRemote>,
    policy: RestockPolicy,
}

impl CrmJobs {
    /// Fails only if the restock policy in `config` is invalid.
    pub fn new(
        config: CrmConfig,
        store: Arc<dyn CrmStore>,
        remote: Arc<dyn CrmRemote>,
    ) -> Result<Self, ConfigError> {
        let policy = config
            .restock
            .policy()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(Self {
            config: Arc::new(config),
            store,
            remote,
            policy,
        })
    }

    pub fn config(&self) -> &CrmConfig {
        &self.config
    }

    fn sink(&self, kind: JobKind) -> LogSink {
        LogSink::from_paths(kind.log_paths(&self.config))
    }

    pub fn replenisher(&self) -> Replenisher<dyn CrmStore> {
        Replenisher::new(
            Arc::clone(&self.store),
            Arc::clone(&self.remote),
            self.policy,
            self.sink(JobKind::LowStock),
        )
    }

    pub fn reporter(&self) -> Reporter<dyn CrmStore> {
        Reporter::new(
            Arc::clone(&self.store),
            Arc::clone(&self.remote),
            self.sink(JobKind::Report),
        )
    }

    pub fn order_reminders(&self) -> OrderReminders<dyn CrmStore> {
        OrderReminders::new(
            Arc::clone(&self.store),
            Arc::clone(&self.remote),
            self.sink(JobKind::OrderReminders),
            self.config.reminders.order_reminder_days,
        )
    }

    pub fn customer_cleanup(&self) -> CustomerCleanup<dyn CrmStore> {
        CustomerCleanup::new(
            Arc::clone(&self.store),
            self.sink(JobKind::CustomerCleanup),
            self.config.cleanup.inactive_customer_days,
        )
    }

    pub fn heartbeat(&self) -> Heartbeat {
        Heartbeat::new(Arc::clone(&self.remote), self.sink(JobKind::Heartbeat))
    }

    #[tracing::instrument(skip(self), fields(job = %kind))]
    pub async fn run(&self, kind: JobKind) -> JobReport {
        let (succeeded, summary) = match kind {
            JobKind::Heartbeat => {
                let outcome = self.heartbeat().run().await;
                (true, outcome.summary)
            }
            JobKind::LowStock => {
                let outcome = self.replenisher().run().await;
                (outcome.succeeded(), outcome.summary)
            }
            JobKind::CustomerCleanup => {
                let outcome = self.customer_cleanup().run().await;
                (outcome.succeeded(), outcome.summary)
            }
            JobKind::OrderReminders => {
                let outcome = self.order_reminders().run().await;
                (outcome.succeeded(), outcome.summary)
            }
            JobKind::Report => {
                let outcome = self.reporter().run().await;
                (outcome.succeeded(), outcome.summary)
            }
        };
        JobReport {
            kind,
            succeeded,
            summary,
        }
    }
}
