//! Test doubles shared by the job tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crm_core::{Money, ProductId};
use crm_parties::Customer;
use crm_products::Product;
use crm_sales::Order;

use crate::remote::{
    CrmRemote, LowStockUpdate, RemoteError, RemoteOrder, ReportData, TransportError,
};
use crate::store::{InMemoryCrmStore, InventoryStore, RecentOrder, SalesStore, StoreError};

pub fn product(name: &str, stock: i64) -> Product {
    Product::create(name, Money::from_cents(1000), stock).unwrap()
}

fn unreachable_endpoint() -> RemoteError {
    TransportError::Connect("connection refused".into()).into()
}

/// Scripted `CrmRemote`. Unscripted operations fail as if the endpoint
/// were down.
#[derive(Default)]
pub struct FakeRemote {
    low_stock: Option<Result<LowStockUpdate, RemoteError>>,
    hello: Option<Result<String, RemoteError>>,
    report: Option<Result<ReportData, RemoteError>>,
    orders: Option<Result<Vec<RemoteOrder>, RemoteError>>,
    calls: AtomicUsize,
}

impl FakeRemote {
    pub fn with_low_stock(mut self, result: Result<LowStockUpdate, RemoteError>) -> Self {
        self.low_stock = Some(result);
        self
    }

    pub fn with_hello(mut self, result: Result<String, RemoteError>) -> Self {
        self.hello = Some(result);
        self
    }

    pub fn with_report(mut self, result: Result<ReportData, RemoteError>) -> Self {
        self.report = Some(result);
        self
    }

    pub fn with_orders(mut self, result: Result<Vec<RemoteOrder>, RemoteError>) -> Self {
        self.orders = Some(result);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn answer<T: Clone>(&self, scripted: &Option<Result<T, RemoteError>>) -> Result<T, RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        scripted
            .clone()
            .unwrap_or_else(|| Err(unreachable_endpoint()))
    }
}

#[async_trait]
impl CrmRemote for FakeRemote {
    async fn update_low_stock_products(&self) -> Result<LowStockUpdate, RemoteError> {
        self.answer(&self.low_stock)
    }

    async fn hello(&self) -> Result<String, RemoteError> {
        self.answer(&self.hello)
    }

    async fn report_data(&self) -> Result<ReportData, RemoteError> {
        self.answer(&self.report)
    }

    async fn orders(&self) -> Result<Vec<RemoteOrder>, RemoteError> {
        self.answer(&self.orders)
    }
}

/// Wraps an in-memory store and injects storage failures.
pub struct FlakyStore {
    inner: Arc<InMemoryCrmStore>,
    failing_saves: HashSet<String>,
    fail_reads: bool,
    fail_writes: bool,
}

impl FlakyStore {
    pub fn new(inner: Arc<InMemoryCrmStore>) -> Self {
        Self {
            inner,
            failing_saves: HashSet::new(),
            fail_reads: false,
            fail_writes: false,
        }
    }

    /// `save_product` fails for products with this name.
    pub fn failing_saves_for(mut self, name: &str) -> Self {
        self.failing_saves.insert(name.to_string());
        self
    }

    /// Every query fails.
    pub fn failing_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    /// Every delete fails.
    pub fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    fn read_guard(&self) -> Result<(), StoreError> {
        if self.fail_reads {
            return Err(StoreError::Storage("database is unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for FlakyStore {
    async fn find_low_stock(&self, threshold: i64) -> Result<Vec<Product>, StoreError> {
        self.read_guard()?;
        self.inner.find_low_stock(threshold).await
    }

    async fn save_product(&self, product: &Product) -> Result<(), StoreError> {
        if self.failing_saves.contains(product.name()) {
            return Err(StoreError::Storage(format!("write to {} rejected", product.name())));
        }
        self.inner.save_product(product).await
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        self.inner.insert_product(product).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.read_guard()?;
        self.inner.get_product(id).await
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        self.read_guard()?;
        self.inner.list_products().await
    }
}

#[async_trait]
impl SalesStore for FlakyStore {
    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        self.inner.insert_customer(customer).await
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.inner.insert_order(order).await
    }

    async fn count_customers(&self) -> Result<u64, StoreError> {
        self.read_guard()?;
        self.inner.count_customers().await
    }

    async fn count_orders(&self) -> Result<u64, StoreError> {
        self.read_guard()?;
        self.inner.count_orders().await
    }

    async fn total_revenue(&self) -> Result<Money, StoreError> {
        self.read_guard()?;
        self.inner.total_revenue().await
    }

    async fn orders_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RecentOrder>, StoreError> {
        self.read_guard()?;
        self.inner.orders_since(cutoff).await
    }

    async fn delete_inactive_customers(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        if self.fail_writes {
            return Err(StoreError::Storage("database is read-only".into()));
        }
        self.inner.delete_inactive_customers(cutoff).await
    }
}
