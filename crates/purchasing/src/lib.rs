//! Purchasing domain module (supplier deliveries).
//!
//! This crate turns supplier deliveries into ledger operations, implemented
//! purely as deterministic domain logic (no IO, no storage).

pub mod supply;

pub use supply::{Supplier, SupplyBatch, SupplyLine};
