//! Parties domain module (customers).
//!
//! Customer records with the field validation the CRM applies on creation,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod customer;

pub use customer::Customer;
