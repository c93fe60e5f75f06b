//! Liveness heartbeat.

use std::sync::Arc;

use chrono::Utc;

use crate::log_sink::LogSink;
use crate::remote::CrmRemote;

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y-%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatOutcome {
    /// `hello` answer, or the probe failure.
    pub probe: Result<String, String>,
    pub summary: String,
}

pub struct Heartbeat {
    remote: Arc<dyn CrmRemote>,
    sink: LogSink,
}

impl Heartbeat {
    pub fn new(remote: Arc<dyn CrmRemote>, sink: LogSink) -> Self {
        Self { remote, sink }
    }

    /// Log "CRM is alive", then probe the remote endpoint. A failed probe is
    /// logged but does not fail the heartbeat.
    pub async fn run(&self) -> HeartbeatOutcome {
        let ts = Utc::now().format(TIMESTAMP_FORMAT).to_string();

        let probe = self.remote.hello().await.map_err(|e| e.to_string());
        let probe_line = match &probe {
            Ok(hello) => format!("{ts} GraphQL endpoint responsive: {hello}"),
            Err(e) => {
                tracing::warn!(job = "heartbeat", error = %e, "GraphQL endpoint check failed");
                format!("{ts} GraphQL endpoint check failed: {e}")
            }
        };
        self.sink.append(&format!("{ts} CRM is alive\n{probe_line}"));

        let summary = match &probe {
            Ok(_) => "CRM is alive; GraphQL endpoint responsive".to_string(),
            Err(_) => "CRM is alive; GraphQL endpoint unreachable".to_string(),
        };
        tracing::info!(job = "heartbeat", "{summary}");
        HeartbeatOutcome { probe, summary }
    }
}
