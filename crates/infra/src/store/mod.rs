//! Persistence seams for the CRM jobs.
//!
//! The jobs only depend on the [`InventoryStore`] and [`SalesStore`] traits.
//! Two implementations are provided: an in-memory store for tests and local
//! runs, and a Postgres store.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryCrmStore;
pub use postgres::PostgresCrmStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crm_core::{DomainError, Money, ProductId};
use crm_parties::Customer;
use crm_products::Product;
use crm_sales::Order;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored row no longer satisfies the domain invariants.
    #[error("invalid stored data: {0}")]
    Domain(#[from] DomainError),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// An order together with the customer contact details a reminder needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentOrder {
    pub order: Order,
    pub customer_name: String,
    pub customer_email: String,
}

/// Product persistence used by the replenishment job.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Products with `stock < threshold`, in insertion order.
    async fn find_low_stock(&self, threshold: i64) -> Result<Vec<Product>, StoreError>;

    /// Point update of an existing product. `NotFound` if it does not exist.
    async fn save_product(&self, product: &Product) -> Result<(), StoreError>;

    /// `Conflict` if a product with the same id exists.
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;
}

/// Customer and order persistence used by reporting, reminders and cleanup.
#[async_trait]
pub trait SalesStore: Send + Sync {
    /// `Conflict` if the (normalized) email is already registered.
    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError>;

    /// `NotFound` if the customer or any of the products does not exist.
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError>;

    async fn count_customers(&self) -> Result<u64, StoreError>;

    async fn count_orders(&self) -> Result<u64, StoreError>;

    async fn total_revenue(&self) -> Result<Money, StoreError>;

    /// Orders dated on/after `cutoff`, oldest first.
    async fn orders_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RecentOrder>, StoreError>;

    /// Delete customers created before `cutoff` with no order on/after it.
    /// Their older orders go with them. Returns the number of customers deleted.
    async fn delete_inactive_customers(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Everything the job runner needs from a single backing store.
pub trait CrmStore: InventoryStore + SalesStore {}

impl<T: InventoryStore + SalesStore + ?Sized> CrmStore for T {}
