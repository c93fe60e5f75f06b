use serde::{Deserialize, Serialize};

use crm_core::{DomainError, DomainResult, ProductId};
use crm_products::Product;

/// A product that fell below the threshold, with its computed new stock.
///
/// Transient: lives for one replenishment run and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockCandidate {
    pub product_id: ProductId,
    pub name: String,
    pub old_stock: i64,
    pub new_stock: i64,
}

/// Restock policy: `stock < threshold` selects, `old + amount` replenishes.
///
/// The increment is additive and unconditional: a product at 9 and one at 0
/// both receive `restock_amount`. There is no upper bound on stock.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockPolicy {
    threshold: i64,
    restock_amount: i64,
}

impl Default for RestockPolicy {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
            restock_amount: Self::DEFAULT_RESTOCK_AMOUNT,
        }
    }
}

impl RestockPolicy {
    pub const DEFAULT_THRESHOLD: i64 = 10;
    pub const DEFAULT_RESTOCK_AMOUNT: i64 = 10;

    /// Build a policy, rejecting a negative threshold or amount.
    pub fn new(threshold: i64, restock_amount: i64) -> DomainResult<Self> {
        if threshold < 0 {
            return Err(DomainError::validation(format!(
                "low-stock threshold must be >= 0, got {threshold}"
            )));
        }
        if restock_amount < 0 {
            return Err(DomainError::validation(format!(
                "restock amount must be >= 0, got {restock_amount}"
            )));
        }
        Ok(Self {
            threshold,
            restock_amount,
        })
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    pub fn restock_amount(&self) -> i64 {
        self.restock_amount
    }

    pub fn qualifies(&self, product: &Product) -> bool {
        product.is_below(self.threshold)
    }

    /// Select restock candidates, preserving the input (store iteration) order.
    pub fn select_candidates<'a, I>(&self, products: I) -> Vec<RestockCandidate>
    where
        I: IntoIterator<Item = &'a Product>,
    {
        products
            .into_iter()
            .filter(|p| self.qualifies(p))
            .map(|p| RestockCandidate {
                product_id: p.id_typed(),
                name: p.name().to_string(),
                old_stock: p.stock(),
                new_stock: self.restocked_stock(p.stock()),
            })
            .collect()
    }

    /// New stock level for a candidate.
    pub fn apply(&self, candidate: &RestockCandidate) -> i64 {
        self.restocked_stock(candidate.old_stock)
    }

    /// `old_stock + restock_amount`, saturating instead of overflowing.
    pub fn restocked_stock(&self, old_stock: i64) -> i64 {
        old_stock.saturating_add(self.restock_amount)
    }
}
