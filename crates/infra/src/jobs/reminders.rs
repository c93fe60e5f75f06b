//! Daily reminders for orders placed in the last few days.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::fallback::{remote_first_logged, Method, Resolution};
use crate::log_sink::LogSink;
use crate::remote::{CrmRemote, RemoteError};
use crate::store::{SalesStore, StoreError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub order_id: String,
    pub customer_name: String,
    pub customer_email: String,
    /// Display form; kept verbatim when the remote amount does not parse.
    pub amount: String,
    pub order_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemindersOutcome {
    pub method: Method,
    pub timestamp: DateTime<Utc>,
    pub reminders: Vec<Reminder>,
    pub summary: String,
}

impl RemindersOutcome {
    pub fn succeeded(&self) -> bool {
        self.method != Method::Failed
    }
}

pub struct OrderReminders<S: ?Sized> {
    store: Arc<S>,
    remote: Arc<dyn CrmRemote>,
    sink: LogSink,
    window_days: i64,
}

impl<S: SalesStore + ?Sized> OrderReminders<S> {
    pub fn new(store: Arc<S>, remote: Arc<dyn CrmRemote>, sink: LogSink, window_days: i64) -> Self {
        Self {
            store,
            remote,
            sink,
            window_days,
        }
    }

    pub async fn run(&self) -> RemindersOutcome {
        let timestamp = Utc::now();
        let cutoff = super::window_start(timestamp, self.window_days);

        let (resolution, _) = remote_first_logged(
            "order-reminders",
            &self.sink,
            || self.remote_reminders(cutoff),
            || self.local_reminders(cutoff),
            |r| render(timestamp, r),
        )
        .await;

        let method = resolution.method();
        let (reminders, summary) = match resolution {
            Resolution::Remote(reminders) | Resolution::Local { value: reminders, .. } => {
                let summary = format!(
                    "Order reminders processed! Found {} recent orders.",
                    reminders.len()
                );
                (reminders, summary)
            }
            Resolution::Failed {
                remote_error,
                local_error,
            } => (
                Vec::new(),
                format!("Order reminders failed: remote: {remote_error}; local: {local_error}"),
            ),
        };
        tracing::info!(job = "order-reminders", %method, count = reminders.len(), "{summary}");

        RemindersOutcome {
            method,
            timestamp,
            reminders,
            summary,
        }
    }

    /// The remote schema has no date filter, so filtering happens here.
    /// Orders whose date does not parse are skipped.
    async fn remote_reminders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Reminder>, RemoteError> {
        let orders = self.remote.orders().await?;
        let mut reminders: Vec<Reminder> = orders
            .into_iter()
            .filter_map(|order| {
                let Some(order_date) = order.parsed_date() else {
                    tracing::debug!(order_id = %order.id, raw = %order.order_date, "skipping order with unparseable date");
                    return None;
                };
                (order_date >= cutoff).then(|| Reminder {
                    amount: order.total_amount.to_string(),
                    order_id: order.id.0,
                    customer_name: order.customer.name,
                    customer_email: order.customer.email,
                    order_date,
                })
            })
            .collect();
        reminders.sort_by_key(|r| r.order_date);
        Ok(reminders)
    }

    async fn local_reminders(&self, cutoff: DateTime<Utc>) -> Result<Vec<Reminder>, StoreError> {
        let recent = self.store.orders_since(cutoff).await?;
        Ok(recent
            .into_iter()
            .map(|r| Reminder {
                order_id: r.order.id_typed().to_string(),
                customer_name: r.customer_name,
                customer_email: r.customer_email,
                amount: r.order.total_amount().to_string(),
                order_date: r.order.order_date(),
            })
            .collect())
    }
}

fn render(timestamp: DateTime<Utc>, resolution: &Resolution<Vec<Reminder>, StoreError>) -> String {
    let ts = timestamp.format(TIMESTAMP_FORMAT);
    let mut out = String::new();

    let _ = writeln!(out, "[{ts}] Order reminders processing started");
    if let Some(remote_error) = resolution.remote_error() {
        let _ = writeln!(out, "[{ts}] [FALLBACK] GraphQL query failed: {remote_error}");
        let _ = writeln!(out, "[{ts}] [FALLBACK] Using direct database access");
    }

    match resolution {
        Resolution::Failed { local_error, .. } => {
            let _ = writeln!(out, "[{ts}] Error processing order reminders: {local_error}");
        }
        Resolution::Remote(reminders) | Resolution::Local { value: reminders, .. } => {
            if reminders.is_empty() {
                let _ = writeln!(out, "[{ts}] No recent orders found for reminders");
            } else {
                let _ = writeln!(out, "[{ts}] Found {} recent orders", reminders.len());
            }
            for r in reminders {
                let _ = writeln!(
                    out,
                    "[{ts}] Order Reminder - Order ID: {}, Customer: {} ({}), Amount: ${}, Date: {}",
                    r.order_id,
                    r.customer_name,
                    r.customer_email,
                    r.amount,
                    r.order_date.to_rfc3339()
                );
            }
            let _ = writeln!(out, "[{ts}] Order reminders processing completed");
        }
    }

    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crate::jobs::testing::{product, FakeRemote};
    use crate::remote::{RemoteAmount, RemoteCustomer, RemoteId, RemoteOrder};
    use crate::store::{InMemoryCrmStore, InventoryStore};
    use crm_parties::Customer;
    use crm_sales::Order;

    fn remote_order(id: &str, order_date: String, amount: RemoteAmount) -> RemoteOrder {
        RemoteOrder {
            id: RemoteId(id.into()),
            customer: RemoteCustomer {
                name: "Alice".into(),
                email: "alice@example.com".into(),
            },
            total_amount: amount,
            order_date,
        }
    }

    #[tokio::test]
    async fn remote_orders_are_filtered_by_window() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("reminders.txt");
        let now = Utc::now();
        let remote = Arc::new(FakeRemote::default().with_orders(Ok(vec![
            remote_order("1", (now - Duration::days(2)).to_rfc3339(), RemoteAmount::Text("500.00".into())),
            remote_order("2", (now - Duration::days(30)).to_rfc3339(), RemoteAmount::Number(10.0)),
            remote_order("3", "not a date".into(), RemoteAmount::Number(10.0)),
        ])));

        let outcome = OrderReminders::new(Arc::new(InMemoryCrmStore::new()), remote, LogSink::new(&log, None), 7)
            .run()
            .await;

        assert_eq!(outcome.method, Method::Remote);
        assert_eq!(outcome.reminders.len(), 1);
        assert_eq!(outcome.summary, "Order reminders processed! Found 1 recent orders.");

        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains(
            "Order Reminder - Order ID: 1, Customer: Alice (alice@example.com), Amount: $500.00, Date: "
        ));
        assert!(content.contains("Order reminders processing completed"));
    }

    #[tokio::test]
    async fn store_fallback_lists_recent_orders() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("reminders.txt");
        let now = Utc::now();
        let store = Arc::new(InMemoryCrmStore::new());
        let p = product("Phone", 3);
        let c = Customer::register("Bob", "bob@example.com", None, now).unwrap();
        store.insert_product(&p).await.unwrap();
        store.insert_customer(&c).await.unwrap();
        for days in [1, 10] {
            let order = Order::place(c.id_typed(), std::slice::from_ref(&p), now - Duration::days(days)).unwrap();
            store.insert_order(&order).await.unwrap();
        }

        let outcome = OrderReminders::new(store, Arc::new(FakeRemote::default()), LogSink::new(&log, None), 7)
            .run()
            .await;

        assert_eq!(outcome.method, Method::Local);
        assert_eq!(outcome.reminders.len(), 1);
        assert_eq!(outcome.reminders[0].amount, "10.00");

        let content = std::fs::read_to_string(&log).unwrap();
        assert!(content.contains("[FALLBACK] Using direct database access"));
        assert!(content.contains("Customer: Bob (bob@example.com), Amount: $10.00"));
    }

    #[tokio::test]
    async fn no_recent_orders_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("reminders.txt");
        let remote = Arc::new(FakeRemote::default().with_orders(Ok(vec![])));

        let outcome = OrderReminders::new(Arc::new(InMemoryCrmStore::new()), remote, LogSink::new(&log, None), 7)
            .run()
            .await;

        assert!(outcome.succeeded());
        assert!(std::fs::read_to_string(&log)
            .unwrap()
            .contains("No recent orders found for reminders"));
    }
}
