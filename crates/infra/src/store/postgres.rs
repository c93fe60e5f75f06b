//! Postgres-backed CRM store.
//!
//! ## Schema
//!
//! ```sql
//! products       (id UUID PK, seq BIGSERIAL, name TEXT, price_cents BIGINT, stock BIGINT)
//! customers      (id UUID PK, name TEXT, email TEXT UNIQUE, phone TEXT NULL, created_at TIMESTAMPTZ)
//! orders         (id UUID PK, customer_id UUID -> customers ON DELETE CASCADE,
//!                 total_cents BIGINT, order_date TIMESTAMPTZ)
//! order_products (order_id UUID -> orders ON DELETE CASCADE, product_id UUID -> products,
//!                 position INT, PK (order_id, product_id))
//! ```
//!
//! `seq` preserves insertion order for product scans.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate email or id |
//! | Database (foreign key violation) | `23503` | `NotFound` | Order references an unknown customer/product |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed | N/A | `Storage` | Connection pool was closed |
//! | Other | N/A | `Storage` | Network errors, connection failures, etc. |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use crm_core::{CustomerId, Entity, Money, OrderId, ProductId};
use crm_parties::Customer;
use crm_products::Product;
use crm_sales::Order;

use super::{InventoryStore, RecentOrder, SalesStore, StoreError};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id          UUID PRIMARY KEY,
        seq         BIGSERIAL NOT NULL,
        name        TEXT NOT NULL,
        price_cents BIGINT NOT NULL CHECK (price_cents > 0),
        stock       BIGINT NOT NULL CHECK (stock >= 0)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS customers (
        id         UUID PRIMARY KEY,
        name       TEXT NOT NULL,
        email      TEXT NOT NULL UNIQUE,
        phone      TEXT,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id          UUID PRIMARY KEY,
        customer_id UUID NOT NULL REFERENCES customers (id) ON DELETE CASCADE,
        total_cents BIGINT NOT NULL CHECK (total_cents >= 0),
        order_date  TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS order_products (
        order_id   UUID NOT NULL REFERENCES orders (id) ON DELETE CASCADE,
        product_id UUID NOT NULL REFERENCES products (id),
        position   INT NOT NULL,
        PRIMARY KEY (order_id, product_id)
    )
    "#,
];

/// Postgres-backed store for products, customers and orders.
///
/// Uses the SQLx connection pool, which is `Send + Sync` and can be shared
/// across jobs.
#[derive(Debug, Clone)]
pub struct PostgresCrmStore {
    pool: Arc<PgPool>,
}

impl PostgresCrmStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect to `url` and make sure the schema exists.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for PostgresCrmStore {
    #[instrument(skip(self), err)]
    async fn find_low_stock(&self, threshold: i64) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, price_cents, stock
            FROM products
            WHERE stock < $1
            ORDER BY seq ASC
            "#,
        )
        .bind(threshold)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_low_stock", e))?;

        rows.iter().map(product_from_row).collect()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id_typed()), err)]
    async fn save_product(&self, product: &Product) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, price_cents = $3, stock = $4
            WHERE id = $1
            "#,
        )
        .bind(product.id_typed().as_uuid())
        .bind(product.name())
        .bind(cents_to_db(product.price())?)
        .bind(product.stock())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_product", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(product.describe()));
        }
        Ok(())
    }

    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(product.id_typed().as_uuid())
        .bind(product.name())
        .bind(cents_to_db(product.price())?)
        .bind(product.stock())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query("SELECT id, name, price_cents, stock FROM products WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query("SELECT id, name, price_cents, stock FROM products ORDER BY seq ASC")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;

        rows.iter().map(product_from_row).collect()
    }
}

#[async_trait]
impl SalesStore for PostgresCrmStore {
    async fn insert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, name, email, phone, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(customer.id_typed().as_uuid())
        .bind(customer.name())
        .bind(customer.email())
        .bind(customer.phone())
        .bind(customer.created_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_customer", e))?;
        Ok(())
    }

    #[instrument(skip(self, order), fields(order_id = %order.id_typed()), err)]
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, customer_id, total_cents, order_date)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order.id_typed().as_uuid())
        .bind(order.customer_id().as_uuid())
        .bind(cents_to_db(order.total_amount())?)
        .bind(order.order_date())
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_order", e))?;

        for (position, product_id) in order.product_ids().iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_products (order_id, product_id, position)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(order.id_typed().as_uuid())
            .bind(product_id.as_uuid())
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("insert_order", e))
    }

    async fn count_customers(&self) -> Result<u64, StoreError> {
        self.count("SELECT COUNT(*) AS total FROM customers", "count_customers")
            .await
    }

    async fn count_orders(&self) -> Result<u64, StoreError> {
        self.count("SELECT COUNT(*) AS total FROM orders", "count_orders")
            .await
    }

    async fn total_revenue(&self) -> Result<Money, StoreError> {
        let row = sqlx::query("SELECT COALESCE(SUM(total_cents), 0)::BIGINT AS total FROM orders")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("total_revenue", e))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| map_sqlx_error("total_revenue", e))?;
        cents_from_db(total)
    }

    async fn orders_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<RecentOrder>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                o.id,
                o.customer_id,
                o.total_cents,
                o.order_date,
                c.name AS customer_name,
                c.email AS customer_email,
                ARRAY_AGG(op.product_id ORDER BY op.position) AS product_ids
            FROM orders o
            JOIN customers c ON c.id = o.customer_id
            JOIN order_products op ON op.order_id = o.id
            WHERE o.order_date >= $1
            GROUP BY o.id, c.name, c.email
            ORDER BY o.order_date ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("orders_since", e))?;

        rows.iter().map(recent_order_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn delete_inactive_customers(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM customers c
            WHERE c.created_at < $1
              AND NOT EXISTS (
                  SELECT 1 FROM orders o
                  WHERE o.customer_id = c.id AND o.order_date >= $1
              )
            "#,
        )
        .bind(cutoff)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("delete_inactive_customers", e))?;

        Ok(result.rows_affected())
    }
}

impl PostgresCrmStore {
    async fn count(&self, sql: &str, operation: &str) -> Result<u64, StoreError> {
        let row = sqlx::query(sql)
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        let total: i64 = row
            .try_get("total")
            .map_err(|e| map_sqlx_error(operation, e))?;
        u64::try_from(total).map_err(|_| StoreError::Storage(format!("negative count in {operation}")))
    }
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let id: Uuid = row.try_get("id").map_err(|e| map_sqlx_error("decode product", e))?;
    let name: String = row
        .try_get("name")
        .map_err(|e| map_sqlx_error("decode product", e))?;
    let price_cents: i64 = row
        .try_get("price_cents")
        .map_err(|e| map_sqlx_error("decode product", e))?;
    let stock: i64 = row
        .try_get("stock")
        .map_err(|e| map_sqlx_error("decode product", e))?;

    Ok(Product::restore(
        ProductId::from_uuid(id),
        name,
        cents_from_db(price_cents)?,
        stock,
    )?)
}

fn recent_order_from_row(row: &PgRow) -> Result<RecentOrder, StoreError> {
    let decode = |e| map_sqlx_error("decode order", e);

    let id: Uuid = row.try_get("id").map_err(decode)?;
    let customer_id: Uuid = row.try_get("customer_id").map_err(decode)?;
    let total_cents: i64 = row.try_get("total_cents").map_err(decode)?;
    let order_date: DateTime<Utc> = row.try_get("order_date").map_err(decode)?;
    let customer_name: String = row.try_get("customer_name").map_err(decode)?;
    let customer_email: String = row.try_get("customer_email").map_err(decode)?;
    let product_ids: Vec<Uuid> = row.try_get("product_ids").map_err(decode)?;

    let order = Order::restore(
        OrderId::from_uuid(id),
        CustomerId::from_uuid(customer_id),
        product_ids.into_iter().map(ProductId::from_uuid).collect(),
        cents_from_db(total_cents)?,
        order_date,
    )?;

    Ok(RecentOrder {
        order,
        customer_name,
        customer_email,
    })
}

fn cents_to_db(money: Money) -> Result<i64, StoreError> {
    i64::try_from(money.cents())
        .map_err(|_| StoreError::Storage(format!("amount {money} exceeds BIGINT range")))
}

fn cents_from_db(cents: i64) -> Result<Money, StoreError> {
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| StoreError::Storage(format!("negative amount in database: {cents}")))
}

/// Map SQLx errors to StoreError (see the module docs for the table).
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                Some("23503") => StoreError::NotFound(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
