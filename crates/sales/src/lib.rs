//! Sales domain module.
//!
//! Orders placed by customers for one or more products. The order total is
//! fixed at placement time from the product prices.

pub mod order;

pub use order::Order;
