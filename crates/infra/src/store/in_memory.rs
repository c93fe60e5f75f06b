use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crm_core::{CustomerId, Entity, Money, ProductId};
use crm_parties::Customer;
use crm_products::Product;
use crm_sales::Order;

use super::{InventoryStore, RecentOrder, SalesStore, StoreError};

#[derive(Debug, Default)]
struct Tables {
    products: Vec<Product>,
    customers: Vec<Customer>,
    orders: Vec<Order>,
}

/// In-memory CRM store.
///
/// Intended for tests/dev. Rows are kept in insertion order, which is the
/// iteration order every query reports.
#[derive(Debug, Default)]
pub struct InMemoryCrmStore {
    tables: RwLock<Tables>,
}

impl InMemoryCrmStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Storage("in-memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Storage("in-memory store lock poisoned".into()))
    }
}

#[async_trait]
impl InventoryStore for InMemoryCrmStore {
    async fn find_low_stock(&self, threshold: i64) -> Result<Vec<Product>, StoreError> {
        let tables = self.read()?;
        Ok(tables
            .products
            .iter()
            .filter(|p| p.is_below(threshold))
            .cloned()
            .collect())
    }

    async fn save_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let slot = tables
            .products
            .iter_mut()
            .find(|p| p.id_typed() == product.id_typed())
            .ok_or_else(|| StoreError::NotFound(product.describe()))?;
        *slot = product.clone();
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.products.iter().any(|p| p.id_typed() == product.id_typed()) {
            return Err(StoreError::Conflict(format!("{} already exists", product.describe())));
        }
        tables.products.push(product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let tables = self.read()?;
        Ok(tables.products.iter().find(|p| p.id_typed() == id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.read()?.products.clone())
    }
}

#[async_trait]
impl SalesStore for InMemoryCrmStore {
    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if tables.customers.iter().any(|c| c.email() == customer.email()) {
            return Err(StoreError::Conflict(format!(
                "email already exists: {}",
                customer.email()
            )));
        }
        if tables.customers.iter().any(|c| c.id_typed() == customer.id_typed()) {
            return Err(StoreError::Conflict(format!("{} already exists", customer.describe())));
        }
        tables.customers.push(customer.clone());
        Ok(())
    }

    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        if !tables.customers.iter().any(|c| c.id_typed() == order.customer_id()) {
            return Err(StoreError::NotFound(format!(
                "customer {}",
                order.customer_id()
            )));
        }
        for product_id in order.product_ids() {
            if !tables.products.iter().any(|p| p.id_typed() == *product_id) {
                return Err(StoreError::NotFound(format!("product {product_id}")));
            }
        }
        if tables.orders.iter().any(|o| o.id_typed() == order.id_typed()) {
            return Err(StoreError::Conflict(format!("{} already exists", order.describe())));
        }
        tables.orders.push(order.clone());
        Ok(())
    }

    async fn count_customers(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.customers.len() as u64)
    }

    async fn count_orders(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.orders.len() as u64)
    }

    async fn total_revenue(&self) -> Result<Money, StoreError> {
        let tables = self.read()?;
        tables
            .orders
            .iter()
            .try_fold(Money::ZERO, |acc, o| acc.checked_add(o.total_amount()))
            .ok_or_else(|| StoreError::Storage("revenue overflow".into()))
    }

    async fn orders_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RecentOrder>, StoreError> {
        let tables = self.read()?;
        let mut recent = Vec::new();
        for order in tables.orders.iter().filter(|o| o.order_date() >= cutoff) {
            let customer = tables
                .customers
                .iter()
                .find(|c| c.id_typed() == order.customer_id())
                .ok_or_else(|| {
                    StoreError::Storage(format!(
                        "order {} references missing customer {}",
                        order.id_typed(),
                        order.customer_id()
                    ))
                })?;
            recent.push(RecentOrder {
                order: order.clone(),
                customer_name: customer.name().to_string(),
                customer_email: customer.email().to_string(),
            });
        }
        recent.sort_by_key(|r| r.order.order_date());
        Ok(recent)
    }

    async fn delete_inactive_customers(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tables = self.write()?;

        let active: HashSet<CustomerId> = tables
            .orders
            .iter()
            .filter(|o| o.order_date() >= cutoff)
            .map(|o| o.customer_id())
            .collect();
        let doomed: HashSet<CustomerId> = tables
            .customers
            .iter()
            .filter(|c| c.created_at() < cutoff && !active.contains(&c.id_typed()))
            .map(|c| c.id_typed())
            .collect();

        tables.customers.retain(|c| !doomed.contains(&c.id_typed()));
        tables.orders.retain(|o| !doomed.contains(&o.customer_id()));
        Ok(doomed.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn product(name: &str, stock: i64) -> Product {
        Product::create(name, Money::from_cents(1000), stock).unwrap()
    }

    fn customer(email: &str, created_at: DateTime<Utc>) -> Customer {
        Customer::register("Test", email, None, created_at).unwrap()
    }

    #[tokio::test]
    async fn low_stock_keeps_insertion_order() {
        let store = InMemoryCrmStore::new();
        for (name, stock) in [("A", 5), ("B", 12), ("C", 3)] {
            store.insert_product(&product(name, stock)).await.unwrap();
        }

        let low = store.find_low_stock(10).await.unwrap();
        let names: Vec<&str> = low.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn save_product_requires_existing_row() {
        let store = InMemoryCrmStore::new();
        let mut p = product("A", 5);
        assert!(matches!(
            store.save_product(&p).await,
            Err(StoreError::NotFound(_))
        ));

        store.insert_product(&p).await.unwrap();
        p.restock(10).unwrap();
        store.save_product(&p).await.unwrap();
        assert_eq!(
            store.get_product(p.id_typed()).await.unwrap().unwrap().stock(),
            15
        );
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let store = InMemoryCrmStore::new();
        store
            .insert_customer(&customer("a@example.com", Utc::now()))
            .await
            .unwrap();
        let err = store
            .insert_customer(&customer("A@Example.com", Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn order_requires_known_customer_and_products() {
        let store = InMemoryCrmStore::new();
        let p = product("A", 5);
        let c = customer("a@example.com", Utc::now());
        let order = Order::place(c.id_typed(), std::slice::from_ref(&p), Utc::now()).unwrap();

        assert!(matches!(
            store.insert_order(&order).await,
            Err(StoreError::NotFound(_))
        ));
        store.insert_customer(&c).await.unwrap();
        assert!(matches!(
            store.insert_order(&order).await,
            Err(StoreError::NotFound(_))
        ));
        store.insert_product(&p).await.unwrap();
        store.insert_order(&order).await.unwrap();

        assert_eq!(store.count_orders().await.unwrap(), 1);
        assert_eq!(store.total_revenue().await.unwrap().cents(), 1000);
    }

    #[tokio::test]
    async fn cleanup_deletes_only_old_customers_without_recent_orders() {
        let store = InMemoryCrmStore::new();
        let now = Utc::now();
        let cutoff = now - Duration::days(365);
        let p = product("A", 5);
        store.insert_product(&p).await.unwrap();

        let stale = customer("stale@example.com", now - Duration::days(400));
        let loyal = customer("loyal@example.com", now - Duration::days(400));
        let fresh = customer("fresh@example.com", now - Duration::days(10));
        for c in [&stale, &loyal, &fresh] {
            store.insert_customer(c).await.unwrap();
        }
        let old_order = Order::place(
            stale.id_typed(),
            std::slice::from_ref(&p),
            now - Duration::days(390),
        )
        .unwrap();
        let recent_order =
            Order::place(loyal.id_typed(), std::slice::from_ref(&p), now - Duration::days(3))
                .unwrap();
        store.insert_order(&old_order).await.unwrap();
        store.insert_order(&recent_order).await.unwrap();

        assert_eq!(store.delete_inactive_customers(cutoff).await.unwrap(), 1);
        assert_eq!(store.count_customers().await.unwrap(), 2);
        assert_eq!(store.count_orders().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn orders_since_joins_customer_and_sorts() {
        let store = InMemoryCrmStore::new();
        let now = Utc::now();
        let p = product("A", 5);
        let c = customer("a@example.com", now);
        store.insert_product(&p).await.unwrap();
        store.insert_customer(&c).await.unwrap();

        for days in [2, 30, 1] {
            let o = Order::place(
                c.id_typed(),
                std::slice::from_ref(&p),
                now - Duration::days(days),
            )
            .unwrap();
            store.insert_order(&o).await.unwrap();
        }

        let recent = store.orders_since(now - Duration::days(7)).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent[0].order.order_date() < recent[1].order.order_date());
        assert_eq!(recent[0].customer_email, "a@example.com");
    }
}
