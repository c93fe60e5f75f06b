//! `crm-core`: domain building blocks shared by the CRM crates.
//!
//! This crate contains **pure domain** primitives shared by the CRM entity
//! crates (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod money;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CustomerId, OrderId, ProductId};
pub use money::Money;
