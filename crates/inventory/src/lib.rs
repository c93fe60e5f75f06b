//! Inventory domain module.
//!
//! Restock policy: decides which products are low on stock and what their
//! replenished stock level should be. Pure computation (no IO, no storage);
//! persisting the result is the caller's job.

pub mod restock;

pub use restock::{RestockCandidate, RestockPolicy};
