//! Application services: the operations the back-office exposes to its callers.
//!
//! The services compose storage traits only. Which backend sits behind them
//! (in-memory for tests/dev, Postgres in production) is chosen by whoever
//! builds the [`Backoffice`].

mod backoffice;
mod checks;
mod error;
mod returns;
mod stock_coordinator;
mod supply_intake;

pub use backoffice::{
    Backoffice, InMemoryBackoffice, MarkDamagedRequest, PostgresBackoffice, StockOutRequest,
    TransferRequest,
};
pub use error::ServiceError;
pub use returns::ReturnsReconciler;
pub use stock_coordinator::StockCoordinator;
pub use supply_intake::SupplyIntakeProcessor;
