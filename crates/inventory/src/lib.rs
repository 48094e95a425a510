//! Inventory ledger domain.
//!
//! Business rules for per-branch stock and its movement log, implemented purely
//! as deterministic domain logic (no IO, no storage).

pub mod catalog;
pub mod movement;
pub mod operation;
pub mod stock;

pub use catalog::{Branch, Product};
pub use movement::{MovementAction, MovementEntry, PendingMovement, StockOutReason};
pub use operation::{
    MarkDamaged, Posting, ReceiptLine, Receive, StockOperation, StockOut, Transfer,
};
pub use stock::{StockDelta, StockKey, StockRecord, StockViolation};
