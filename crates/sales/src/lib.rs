//! Sales-side returns domain module.
//!
//! Order lines as the returns flow sees them, return settlement and the store
//! credit lifecycle, implemented purely as deterministic domain logic
//! (no IO, no storage).

pub mod credit;
pub mod order_line;
pub mod returns;

pub use credit::{CreditStatus, StoreCredit};
pub use order_line::{OrderLine, OrderLineStatus};
pub use returns::{
    settle, ReturnLineRequest, ReturnNote, ReturnOutcome, ReturnRequest, ReturnSettlement,
};
