use std::collections::BTreeMap;
use std::sync::Mutex;

use backoffice_core::{BatchId, BranchId, ProductId};
use backoffice_inventory::{MovementEntry, Posting, StockKey, StockRecord};

use super::{PostingReceipt, StockLedger};
use crate::error::{PostingError, StoreError, WriteError};

#[derive(Debug, Default)]
struct LedgerState {
    records: BTreeMap<StockKey, StockRecord>,
    log: Vec<MovementEntry>,
}

/// In-memory stock ledger.
///
/// Intended for tests/dev. One mutex guards records and log together, so
/// postings are serialized and the check-then-write in `post` is race-free.
#[derive(Debug, Default)]
pub struct InMemoryStockLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryStockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LedgerState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::poisoned())
    }
}

#[async_trait::async_trait]
impl StockLedger for InMemoryStockLedger {
    async fn get(&self, key: StockKey) -> Result<Option<StockRecord>, StoreError> {
        Ok(self.lock()?.records.get(&key).cloned())
    }

    async fn records_for_product(&self, product_id: ProductId) -> Result<Vec<StockRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .records
            .values()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn records_for_branch(&self, branch_id: BranchId) -> Result<Vec<StockRecord>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .records
            .values()
            .filter(|r| r.branch_id == branch_id)
            .cloned()
            .collect())
    }

    async fn post(&self, posting: Posting) -> Result<PostingReceipt, PostingError> {
        let mut state = self.lock()?;
        let records = posting
            .apply_to(&mut state.records)
            .map_err(WriteError::Rejected)?;

        let mut next = state.log.last().map(|m| m.sequence).unwrap_or(0) + 1;
        let mut movements = Vec::with_capacity(posting.movements.len());
        for pending in posting.movements {
            let entry = pending.commit(next);
            next += 1;
            state.log.push(entry.clone());
            movements.push(entry);
        }

        Ok(PostingReceipt {
            batch_id: posting.batch_id,
            records,
            movements,
        })
    }

    async fn batch_movements(&self, batch_id: BatchId) -> Result<Vec<MovementEntry>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .log
            .iter()
            .filter(|m| m.batch_id == batch_id)
            .cloned()
            .collect())
    }

    async fn movement_history(&self, key: StockKey) -> Result<Vec<MovementEntry>, StoreError> {
        let state = self.lock()?;
        Ok(state.log.iter().filter(|m| m.touches(&key)).cloned().collect())
    }
}
