//! Weekly CRM report: customer count, order count and revenue.

use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crm_core::Money;

use crate::fallback::{remote_first_logged, Method, Resolution};
use crate::log_sink::LogSink;
use crate::remote::{CrmRemote, RemoteError};
use crate::store::{SalesStore, StoreError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    pub customers: u64,
    pub orders: u64,
    pub revenue: Money,
}

impl ReportStats {
    pub fn average_order_value(&self) -> Option<Money> {
        (self.orders > 0).then(|| self.revenue.average(self.orders))
    }

    pub fn headline(&self) -> String {
        format!(
            "Report: {} customers, {} orders, ${} revenue",
            self.customers, self.orders, self.revenue
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportOutcome {
    pub method: Method,
    pub timestamp: DateTime<Utc>,
    pub stats: Option<ReportStats>,
    /// `hello` answer, whenever the endpoint gave one, even if the data
    /// query after it failed.
    pub probe: Option<String>,
    pub summary: String,
}

impl ReportOutcome {
    pub fn succeeded(&self) -> bool {
        self.method != Method::Failed
    }
}

pub struct Reporter<S: ?Sized> {
    store: Arc<S>,
    remote: Arc<dyn CrmRemote>,
    sink: LogSink,
}

impl<S: SalesStore + ?Sized> Reporter<S> {
    pub fn new(store: Arc<S>, remote: Arc<dyn CrmRemote>, sink: LogSink) -> Self {
        Self {
            store,
            remote,
            sink,
        }
    }

    pub async fn run(&self) -> ReportOutcome {
        let timestamp = Utc::now();
        let probe = OnceLock::new();
        let (resolution, _) = remote_first_logged(
            "report",
            &self.sink,
            || self.remote_stats(&probe),
            || self.local_stats(),
            |r| render(timestamp, probe.get().map(String::as_str), r),
        )
        .await;

        let method = resolution.method();
        let (stats, summary) = match resolution {
            Resolution::Remote(stats) | Resolution::Local { value: stats, .. } => {
                let summary = stats.headline();
                (Some(stats), summary)
            }
            Resolution::Failed {
                remote_error,
                local_error,
            } => (
                None,
                format!("Report failed: remote: {remote_error}; local: {local_error}"),
            ),
        };
        tracing::info!(job = "report", %method, "{summary}");

        ReportOutcome {
            method,
            timestamp,
            stats,
            probe: probe.into_inner(),
            summary,
        }
    }

    /// Probe `hello` first; only a responsive endpoint is asked for data.
    async fn remote_stats(&self, probe: &OnceLock<String>) -> Result<ReportStats, RemoteError> {
        let hello = self.remote.hello().await?;
        let _ = probe.set(hello);
        let data = self.remote.report_data().await?;
        Ok(ReportStats {
            customers: data.customers.len() as u64,
            orders: data.orders.len() as u64,
            revenue: data.revenue()?,
        })
    }

    async fn local_stats(&self) -> Result<ReportStats, StoreError> {
        Ok(ReportStats {
            customers: self.store.count_customers().await?,
            orders: self.store.count_orders().await?,
            revenue: self.store.total_revenue().await?,
        })
    }
}

fn render(
    timestamp: DateTime<Utc>,
    probe: Option<&str>,
    resolution: &Resolution<ReportStats, StoreError>,
) -> String {
    let ts = timestamp.format(TIMESTAMP_FORMAT);
    let mut out = String::new();

    if let Some(hello) = probe {
        let _ = writeln!(out, "{ts} GraphQL endpoint responsive: {hello}");
    }
    if let Some(remote_error) = resolution.remote_error() {
        let _ = writeln!(out, "{ts} [FALLBACK] GraphQL report failed: {remote_error}");
    }

    match resolution {
        Resolution::Failed { local_error, .. } => {
            let _ = writeln!(out, "{ts} Report generation failed: {local_error}");
        }
        Resolution::Remote(stats) | Resolution::Local { value: stats, .. } => {
            let _ = writeln!(out, "{ts} - {}", stats.headline());
            if let Some(avg) = stats.average_order_value() {
                let _ = writeln!(out, "{ts} Average order value: ${avg}");
            }
            let via = match resolution.method() {
                Method::Remote => "CRM report generated successfully via GraphQL",
                _ => "[FALLBACK] CRM report generated via database",
            };
            let _ = writeln!(out, "{ts} {via}");
        }
    }

    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::testing::{product, FakeRemote, FlakyStore};
    use crate::remote::{ReportData, TransportError};
    use crate::store::{InMemoryCrmStore, InventoryStore};
    use crm_parties::Customer;
    use crm_sales::Order;

    fn report_data(json: &str) -> ReportData {
        serde_json::from_str(json).unwrap()
    }

    async fn store_with_two_orders() -> Arc<InMemoryCrmStore> {
        let store = Arc::new(InMemoryCrmStore::new());
        let phone = product("Phone", 1);
        let customer = Customer::register("Alice", "alice@example.com", None, Utc::now()).unwrap();
        store.insert_product(&phone).await.unwrap();
        store.insert_customer(&customer).await.unwrap();
        for _ in 0..2 {
            let order =
                Order::place(customer.id_typed(), std::slice::from_ref(&phone), Utc::now()).unwrap();
            store.insert_order(&order).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn remote_report_counts_and_sums() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("report.txt");
        let remote = Arc::new(
            FakeRemote::default()
                .with_hello(Ok("Hello, GraphQL!".into()))
                .with_report(Ok(report_data(
                    r#"{"customers":[{"id":"1"},{"id":"2"},{"id":"3"}],
                        "orders":[{"id":"1","totalAmount":"500.00","orderDate":null},
                                  {"id":"2","totalAmount":"250.50","orderDate":null}]}"#,
                ))),
        );

        let outcome = Reporter::new(Arc::new(InMemoryCrmStore::new()), remote, LogSink::new(&log, None))
            .run()
            .await;

        assert_eq!(outcome.method, Method::Remote);
        assert_eq!(outcome.summary, "Report: 3 customers, 2 orders, $750.50 revenue");

        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("GraphQL endpoint responsive: Hello, GraphQL!"));
        assert!(content.contains(" - Report: 3 customers, 2 orders, $750.50 revenue"));
        assert!(content.contains("Average order value: $375.25"));
    }

    #[tokio::test]
    async fn failed_hello_falls_back_without_querying_data() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("report.txt");
        let remote = Arc::new(FakeRemote::default().with_hello(Err(TransportError::Timeout(30).into())));

        let outcome = Reporter::new(store_with_two_orders().await, remote.clone(), LogSink::new(&log, None))
            .run()
            .await;

        assert_eq!(outcome.method, Method::Local);
        assert_eq!(remote.calls(), 1);
        assert_eq!(outcome.summary, "Report: 1 customers, 2 orders, $20.00 revenue");
        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("[FALLBACK] GraphQL report failed: Request timed out after 30s"));
        assert!(content.contains("[FALLBACK] CRM report generated via database"));
    }

    #[tokio::test]
    async fn responsive_line_survives_failed_data_query() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("report.txt");
        let remote = Arc::new(
            FakeRemote::default()
                .with_hello(Ok("Hello, GraphQL!".into()))
                .with_report(Err(TransportError::Status {
                    status: 502,
                    body: "Bad Gateway".into(),
                }
                .into())),
        );

        let outcome = Reporter::new(store_with_two_orders().await, remote, LogSink::new(&log, None))
            .run()
            .await;

        assert_eq!(outcome.method, Method::Local);
        assert_eq!(outcome.probe.as_deref(), Some("Hello, GraphQL!"));
        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("GraphQL endpoint responsive: Hello, GraphQL!"));
        assert!(content.contains("[FALLBACK] GraphQL report failed: HTTP error 502: Bad Gateway"));
        assert!(content.contains(" - Report: 1 customers, 2 orders, $20.00 revenue"));
    }

    #[tokio::test]
    async fn overflowing_remote_revenue_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("report.txt");
        let remote = Arc::new(
            FakeRemote::default()
                .with_hello(Ok("Hello, GraphQL!".into()))
                .with_report(Ok(report_data(
                    r#"{"customers":[],
                        "orders":[{"id":"1","totalAmount":"100000000000000000","orderDate":null},
                                  {"id":"2","totalAmount":"100000000000000000","orderDate":null}]}"#,
                ))),
        );

        let outcome = Reporter::new(store_with_two_orders().await, remote, LogSink::new(&log, None))
            .run()
            .await;

        assert_eq!(outcome.method, Method::Local);
        assert_eq!(outcome.summary, "Report: 1 customers, 2 orders, $20.00 revenue");
        assert!(std::fs::read_to_string(&log)
            .unwrap()
            .contains("order revenue overflows"));
    }

    #[test]
    fn empty_store_has_no_average() {
        let stats = ReportStats {
            customers: 0,
            orders: 0,
            revenue: Money::ZERO,
        };
        assert_eq!(stats.average_order_value(), None);
    }

    #[tokio::test]
    async fn both_paths_failing_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("report.txt");
        let store = Arc::new(FlakyStore::new(Arc::new(InMemoryCrmStore::new())).failing_reads());

        let outcome = Reporter::new(store, Arc::new(FakeRemote::default()), LogSink::new(&log, None))
            .run()
            .await;

        assert!(!outcome.succeeded());
        assert!(outcome.stats.is_none());
        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("Report generation failed: storage failure: database is unavailable"));
    }
}
