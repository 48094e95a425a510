//! Infrastructure layer: storage backends, application services, config.

pub mod config;
pub mod error;
pub mod ledger_store;
pub mod postgres;
pub mod reference;
pub mod returns_store;
pub mod services;

pub use config::{BackofficeConfig, DatabaseConfig};
pub use error::{PostingError, SettlementError, StoreError, WriteError};
pub use ledger_store::{InMemoryStockLedger, PostgresStockLedger, PostingReceipt, StockLedger};
pub use reference::{InMemoryReferenceData, PostgresReferenceData, ReferenceData};
pub use returns_store::{InMemoryReturnsStore, PostgresReturnsStore, ReturnsStore};
pub use services::{
    Backoffice, InMemoryBackoffice, MarkDamagedRequest, PostgresBackoffice, ReturnsReconciler,
    ServiceError, StockCoordinator, StockOutRequest, SupplyIntakeProcessor, TransferRequest,
};
