//! Products domain module.
//!
//! Catalog entries with a price and an on-hand stock count, implemented as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;

pub use product::Product;
