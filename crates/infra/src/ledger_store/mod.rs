//! Stock ledger persistence.
//!
//! The ledger holds one [`StockRecord`] per (product, branch) pair and the
//! append-only movement log. A [`Posting`] is the unit of write: its deltas
//! and movements are committed together or not at all, and the stock rules
//! are checked (via [`Posting::apply_to`]) while the affected records are held.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryStockLedger;
pub use postgres::PostgresStockLedger;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use backoffice_core::{BatchId, BranchId, ProductId};
use backoffice_inventory::{MovementEntry, Posting, StockKey, StockRecord};

use crate::error::{PostingError, StoreError};

/// What a committed posting wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingReceipt {
    pub batch_id: BatchId,
    /// Touched records after the posting, in key order.
    pub records: Vec<StockRecord>,
    /// Appended movements, in log order.
    pub movements: Vec<MovementEntry>,
}

#[async_trait::async_trait]
pub trait StockLedger: Send + Sync {
    /// Current record for `key`, if one has ever been written.
    async fn get(&self, key: StockKey) -> Result<Option<StockRecord>, StoreError>;

    /// All records of a product, ordered by branch.
    async fn records_for_product(&self, product_id: ProductId) -> Result<Vec<StockRecord>, StoreError>;

    /// All records held at a branch, ordered by product.
    async fn records_for_branch(&self, branch_id: BranchId) -> Result<Vec<StockRecord>, StoreError>;

    /// Atomically apply a posting.
    ///
    /// Rejections leave every record and the movement log unchanged.
    async fn post(&self, posting: Posting) -> Result<PostingReceipt, PostingError>;

    /// Movements written under `batch_id`, in log order.
    async fn batch_movements(&self, batch_id: BatchId) -> Result<Vec<MovementEntry>, StoreError>;

    /// Movements that touched `key` (as source or destination), in log order.
    async fn movement_history(&self, key: StockKey) -> Result<Vec<MovementEntry>, StoreError>;
}

#[async_trait::async_trait]
impl<S> StockLedger for Arc<S>
where
    S: StockLedger + ?Sized,
{
    async fn get(&self, key: StockKey) -> Result<Option<StockRecord>, StoreError> {
        (**self).get(key).await
    }

    async fn records_for_product(&self, product_id: ProductId) -> Result<Vec<StockRecord>, StoreError> {
        (**self).records_for_product(product_id).await
    }

    async fn records_for_branch(&self, branch_id: BranchId) -> Result<Vec<StockRecord>, StoreError> {
        (**self).records_for_branch(branch_id).await
    }

    async fn post(&self, posting: Posting) -> Result<PostingReceipt, PostingError> {
        (**self).post(posting).await
    }

    async fn batch_movements(&self, batch_id: BatchId) -> Result<Vec<MovementEntry>, StoreError> {
        (**self).batch_movements(batch_id).await
    }

    async fn movement_history(&self, key: StockKey) -> Result<Vec<MovementEntry>, StoreError> {
        (**self).movement_history(key).await
    }
}
