use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use backoffice_core::{BatchId, BranchId, CreditId, EmployeeId, Money, OrderId, ProductId};
use backoffice_inventory::{
    MarkDamaged, MovementEntry, StockKey, StockOperation, StockOut, StockOutReason, StockRecord,
    Transfer,
};
use backoffice_purchasing::SupplyBatch;
use backoffice_sales::{OrderLine, ReturnNote, ReturnOutcome, ReturnRequest, StoreCredit};

use super::{ReturnsReconciler, ServiceError, StockCoordinator, SupplyIntakeProcessor};
use crate::ledger_store::{InMemoryStockLedger, PostgresStockLedger, PostingReceipt, StockLedger};
use crate::reference::{InMemoryReferenceData, PostgresReferenceData, ReferenceData};
use crate::returns_store::{InMemoryReturnsStore, PostgresReturnsStore, ReturnsStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockOutRequest {
    pub product_id: ProductId,
    pub branch_id: BranchId,
    pub quantity: i64,
    pub employee_id: EmployeeId,
    /// `Sold`, `Lost`, `Damaged` or any other non-blank text.
    pub reason: String,
    /// Generated when absent.
    pub batch_id: Option<BatchId>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub product_id: ProductId,
    pub source_branch_id: BranchId,
    pub destination_branch_id: BranchId,
    pub quantity: i64,
    pub batch_id: Option<BatchId>,
    pub employee_id: Option<EmployeeId>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkDamagedRequest {
    pub product_id: ProductId,
    pub branch_id: BranchId,
    pub quantity: i64,
    pub batch_id: Option<BatchId>,
    pub employee_id: Option<EmployeeId>,
    pub note: Option<String>,
}

/// Entry point for collaborators (HTTP/CLI/UI layers).
pub struct Backoffice<L, S, R> {
    ledger: Arc<L>,
    supply: SupplyIntakeProcessor<Arc<L>, Arc<R>>,
    stock: StockCoordinator<Arc<L>, Arc<R>>,
    returns: ReturnsReconciler<Arc<S>>,
}

pub type InMemoryBackoffice = Backoffice<InMemoryStockLedger, InMemoryReturnsStore, InMemoryReferenceData>;
pub type PostgresBackoffice = Backoffice<PostgresStockLedger, PostgresReturnsStore, PostgresReferenceData>;

impl InMemoryBackoffice {
    /// Wire a backoffice over in-memory stores (tests/dev).
    pub fn in_memory(
        ledger: Arc<InMemoryStockLedger>,
        returns: Arc<InMemoryReturnsStore>,
        reference: Arc<InMemoryReferenceData>,
    ) -> Self {
        Self::from_parts(ledger, returns, reference)
    }
}

impl PostgresBackoffice {
    pub fn postgres(pool: PgPool) -> Self {
        Self::from_parts(
            Arc::new(PostgresStockLedger::new(pool.clone())),
            Arc::new(PostgresReturnsStore::new(pool.clone())),
            Arc::new(PostgresReferenceData::new(pool)),
        )
    }
}

impl<L, S, R> Backoffice<L, S, R>
where
    L: StockLedger + 'static,
    S: ReturnsStore + 'static,
    R: ReferenceData + 'static,
{
    pub fn new(ledger: L, returns: S, reference: R) -> Self {
        Self::from_parts(Arc::new(ledger), Arc::new(returns), Arc::new(reference))
    }

    pub fn from_parts(ledger: Arc<L>, returns: Arc<S>, reference: Arc<R>) -> Self {
        Self {
            supply: SupplyIntakeProcessor::new(Arc::clone(&ledger), Arc::clone(&reference)),
            stock: StockCoordinator::new(Arc::clone(&ledger), reference),
            returns: ReturnsReconciler::new(returns),
            ledger,
        }
    }

    /// Book a supplier delivery. Returns the batch id shared by its movements.
    pub async fn receive_supply(&self, batch: SupplyBatch) -> Result<BatchId, ServiceError> {
        Ok(self.supply.receive(batch).await?.batch_id)
    }

    pub async fn stock_out(&self, request: StockOutRequest) -> Result<PostingReceipt, ServiceError> {
        let reason = StockOutReason::parse(&request.reason)?;
        self.execute(StockOperation::StockOut(StockOut {
            batch_id: request.batch_id.unwrap_or_default(),
            product_id: request.product_id,
            branch_id: request.branch_id,
            quantity: request.quantity,
            employee_id: request.employee_id,
            reason,
            note: request.note,
            occurred_at: Utc::now(),
        }))
        .await
    }

    pub async fn transfer_stock(&self, request: TransferRequest) -> Result<PostingReceipt, ServiceError> {
        self.execute(StockOperation::Transfer(Transfer {
            batch_id: request.batch_id.unwrap_or_default(),
            product_id: request.product_id,
            source_branch_id: request.source_branch_id,
            destination_branch_id: request.destination_branch_id,
            quantity: request.quantity,
            employee_id: request.employee_id,
            note: request.note,
            occurred_at: Utc::now(),
        }))
        .await
    }

    pub async fn mark_damaged(&self, request: MarkDamagedRequest) -> Result<PostingReceipt, ServiceError> {
        self.execute(StockOperation::MarkDamaged(MarkDamaged {
            batch_id: request.batch_id.unwrap_or_default(),
            product_id: request.product_id,
            branch_id: request.branch_id,
            quantity: request.quantity,
            employee_id: request.employee_id,
            note: request.note,
            occurred_at: Utc::now(),
        }))
        .await
    }

    /// Dispatch any stock operation to its handler.
    pub async fn execute(&self, operation: StockOperation) -> Result<PostingReceipt, ServiceError> {
        self.stock.execute(operation).await
    }

    /// Current record, or a zero record if the pair never held stock.
    pub async fn get_stock(&self, product_id: ProductId, branch_id: BranchId) -> Result<StockRecord, ServiceError> {
        let key = StockKey::new(product_id, branch_id);
        Ok(self
            .ledger
            .get(key)
            .await?
            .unwrap_or_else(|| StockRecord::empty(key)))
    }

    pub async fn stock_levels(&self, product_id: ProductId) -> Result<Vec<StockRecord>, ServiceError> {
        Ok(self.ledger.records_for_product(product_id).await?)
    }

    pub async fn branch_stock(&self, branch_id: BranchId) -> Result<Vec<StockRecord>, ServiceError> {
        Ok(self.ledger.records_for_branch(branch_id).await?)
    }

    pub async fn batch_movements(&self, batch_id: BatchId) -> Result<Vec<MovementEntry>, ServiceError> {
        Ok(self.ledger.batch_movements(batch_id).await?)
    }

    pub async fn movement_history(
        &self,
        product_id: ProductId,
        branch_id: BranchId,
    ) -> Result<Vec<MovementEntry>, ServiceError> {
        Ok(self
            .ledger
            .movement_history(StockKey::new(product_id, branch_id))
            .await?)
    }

    pub async fn process_return(&self, request: ReturnRequest) -> Result<ReturnOutcome, ServiceError> {
        self.returns.process(request).await
    }

    pub async fn active_credits(&self) -> Result<Vec<StoreCredit>, ServiceError> {
        self.returns.active_credits().await
    }

    pub async fn credit(&self, id: CreditId) -> Result<StoreCredit, ServiceError> {
        self.returns.credit(id).await
    }

    pub async fn redeem_credit(&self, id: CreditId, amount: Money) -> Result<StoreCredit, ServiceError> {
        self.returns.redeem_credit(id, amount).await
    }

    pub async fn void_credit(&self, id: CreditId) -> Result<StoreCredit, ServiceError> {
        self.returns.void_credit(id).await
    }

    pub async fn order_line(&self, order_id: OrderId, product_id: ProductId) -> Result<OrderLine, ServiceError> {
        self.returns.order_line(order_id, product_id).await
    }

    pub async fn return_notes(&self, order_id: OrderId) -> Result<Vec<ReturnNote>, ServiceError> {
        self.returns.return_notes(order_id).await
    }
}
