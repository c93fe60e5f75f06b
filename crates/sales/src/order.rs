use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crm_core::{CustomerId, DomainError, DomainResult, Entity, Money, OrderId, ProductId};
use crm_products::Product;

/// Entity: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    product_ids: Vec<ProductId>,
    total_amount: Money,
    order_date: DateTime<Utc>,
}

impl Order {
    /// Place an order for `products`; the total is the sum of their prices.
    pub fn place(
        customer_id: CustomerId,
        products: &[Product],
        order_date: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if products.is_empty() {
            return Err(DomainError::validation("at least one product is required"));
        }

        let product_ids: Vec<ProductId> = products.iter().map(Product::id_typed).collect();
        let total_amount = products
            .iter()
            .try_fold(Money::ZERO, |acc, p| acc.checked_add(p.price()))
            .ok_or_else(|| DomainError::invariant("order total overflow"))?;

        let unique: HashSet<ProductId> = product_ids.iter().copied().collect();
        if unique.len() != product_ids.len() {
            return Err(DomainError::validation("duplicate product in order"));
        }

        Ok(Self {
            id: OrderId::new(),
            customer_id,
            product_ids,
            total_amount,
            order_date,
        })
    }

    /// Rebuild an order from stored fields.
    pub fn restore(
        id: OrderId,
        customer_id: CustomerId,
        product_ids: Vec<ProductId>,
        total_amount: Money,
        order_date: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if product_ids.is_empty() {
            return Err(DomainError::invariant("order without products"));
        }
        Ok(Self {
            id,
            customer_id,
            product_ids,
            total_amount,
            order_date,
        })
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn product_ids(&self) -> &[ProductId] {
        &self.product_ids
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn order_date(&self) -> DateTime<Utc> {
        self.order_date
    }
}

impl Entity for Order {
    const KIND: &'static str = "order";

    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, cents: u64) -> Product {
        Product::create(name, Money::from_cents(cents), 1).unwrap()
    }

    #[test]
    fn total_is_sum_of_prices() {
        let products = vec![product("Phone", 50000), product("Tablet", 80000)];
        let order = Order::place(CustomerId::new(), &products, Utc::now()).unwrap();
        assert_eq!(order.total_amount().cents(), 130000);
        assert_eq!(order.product_ids().len(), 2);
    }

    #[test]
    fn rejects_empty_order() {
        let err = Order::place(CustomerId::new(), &[], Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_duplicate_products() {
        let p = product("Phone", 50000);
        let err = Order::place(CustomerId::new(), &[p.clone(), p], Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("duplicate product in order"));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: total equals the sum of the product prices, whatever the order.
            #[test]
            fn total_matches_prices(prices in proptest::collection::vec(1u64..1_000_000, 1..20)) {
                let products: Vec<Product> = prices.iter().map(|c| product("P", *c)).collect();
                let order = Order::place(CustomerId::new(), &products, Utc::now()).unwrap();
                prop_assert_eq!(order.total_amount().cents(), prices.iter().sum::<u64>());
            }
        }
    }
}
