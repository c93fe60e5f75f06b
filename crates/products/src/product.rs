use crm_core::{DomainError, DomainResult, Entity, Money, ProductId};

/// Entity: Product.
///
/// Invariants (checked on every construction and mutation):
/// - `name` is non-empty after trimming
/// - `price > 0`
/// - `stock >= 0`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    name: String,
    price: Money,
    stock: i64,
}

impl Product {
    /// Create a new product with a freshly assigned id.
    pub fn create(name: impl Into<String>, price: Money, stock: i64) -> DomainResult<Self> {
        Self::restore(ProductId::new(), name, price, stock)
    }

    /// Rebuild a product from stored fields, re-validating invariants.
    pub fn restore(
        id: ProductId,
        name: impl Into<String>,
        price: Money,
        stock: i64,
    ) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if !price.is_positive() {
            return Err(DomainError::validation("price must be positive"));
        }
        if stock < 0 {
            return Err(DomainError::validation("stock cannot be negative"));
        }
        Ok(Self {
            id,
            name,
            price,
            stock,
        })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock(&self) -> i64 {
        self.stock
    }

    /// True when stock is strictly below `threshold`.
    pub fn is_below(&self, threshold: i64) -> bool {
        self.stock < threshold
    }

    /// Add `amount` units to stock and return the new stock level.
    pub fn restock(&mut self, amount: i64) -> DomainResult<i64> {
        if amount < 0 {
            return Err(DomainError::validation("restock amount cannot be negative"));
        }
        let new_stock = self
            .stock
            .checked_add(amount)
            .ok_or_else(|| DomainError::invariant("stock overflow"))?;
        self.stock = new_stock;
        Ok(new_stock)
    }

    /// Overwrite the stock level (e.g. after a physical count).
    pub fn set_stock(&mut self, stock: i64) -> DomainResult<()> {
        if stock < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }
        self.stock = stock;
        Ok(())
    }
}

impl Entity for Product {
    const KIND: &'static str = "product";

    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
