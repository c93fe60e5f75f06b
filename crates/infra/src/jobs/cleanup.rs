//! Weekly removal of inactive customers. Local store only.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::log_sink::LogSink;
use crate::store::SalesStore;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupOutcome {
    pub timestamp: DateTime<Utc>,
    pub cutoff: DateTime<Utc>,
    pub deleted: Option<u64>,
    pub summary: String,
}

impl CleanupOutcome {
    pub fn succeeded(&self) -> bool {
        self.deleted.is_some()
    }
}

pub struct CustomerCleanup<S: ?Sized> {
    store: Arc<S>,
    sink: LogSink,
    inactive_days: i64,
}

impl<S: SalesStore + ?Sized> CustomerCleanup<S> {
    pub fn new(store: Arc<S>, sink: LogSink, inactive_days: i64) -> Self {
        Self {
            store,
            sink,
            inactive_days,
        }
    }

    /// Delete customers created before the cutoff that have not ordered since.
    pub async fn run(&self) -> CleanupOutcome {
        let timestamp = Utc::now();
        let cutoff = super::window_start(timestamp, self.inactive_days);
        let ts = timestamp.format(TIMESTAMP_FORMAT).to_string();

        let (deleted, summary) = match self.store.delete_inactive_customers(cutoff).await {
            Ok(count) => (Some(count), format!("Deleted {count} inactive customers")),
            Err(e) => {
                tracing::error!(job = "customer-cleanup", error = %e, "customer cleanup failed");
                (None, format!("Customer cleanup failed: {e}"))
            }
        };
        self.sink.append(&format!("{ts} {summary}"));
        tracing::info!(job = "customer-cleanup", ?deleted, "{summary}");

        CleanupOutcome {
            timestamp,
            cutoff,
            deleted,
            summary,
        }
    }
}
