//! Stock Operation Coordinator.
//!
//! Every [`StockOperation`] variant has its own handler that checks the
//! references it names; the common tail (plan, post, map violations, log)
//! is shared with supply intake through [`commit_posting`].

use tracing::{info, instrument, warn};

use backoffice_inventory::{MarkDamaged, Posting, Receive, StockOperation, StockOut, Transfer};

use super::checks::{require_branch, require_product};
use super::error::ViolationMapping;
use super::ServiceError;
use crate::ledger_store::{PostingReceipt, StockLedger};
use crate::reference::ReferenceData;

/// Post `posting` and translate a rejection into the operation's own error.
pub(crate) async fn commit_posting<L>(
    ledger: &L,
    posting: Posting,
    mapping: ViolationMapping,
    kind: &'static str,
) -> Result<PostingReceipt, ServiceError>
where
    L: StockLedger + ?Sized,
{
    let batch_id = posting.batch_id;
    match ledger.post(posting).await {
        Ok(receipt) => {
            info!(
                kind,
                batch_id = %receipt.batch_id,
                records = receipt.records.len(),
                movements = receipt.movements.len(),
                "stock operation committed"
            );
            Ok(receipt)
        }
        Err(err) => {
            let err = mapping.map_write(err);
            warn!(kind, batch_id = %batch_id, code = err.code(), error = %err, "stock operation rejected");
            Err(err)
        }
    }
}

#[derive(Debug, Clone)]
pub struct StockCoordinator<L, R> {
    ledger: L,
    reference: R,
}

impl<L, R> StockCoordinator<L, R>
where
    L: StockLedger,
    R: ReferenceData,
{
    pub fn new(ledger: L, reference: R) -> Self {
        Self { ledger, reference }
    }

    /// Validate and atomically apply one operation.
    #[instrument(
        skip(self, operation),
        fields(kind = operation.kind(), batch_id = %operation.batch_id()),
        err
    )]
    pub async fn execute(&self, operation: StockOperation) -> Result<PostingReceipt, ServiceError> {
        let posting = operation.plan()?;
        let mapping = match &operation {
            StockOperation::Receive(op) => self.check_receive(op).await?,
            StockOperation::StockOut(op) => self.check_stock_out(op).await?,
            StockOperation::Transfer(op) => self.check_transfer(op).await?,
            StockOperation::MarkDamaged(op) => self.check_mark_damaged(op).await?,
        };
        commit_posting(&self.ledger, posting, mapping, operation.kind()).await
    }

    async fn check_receive(&self, op: &Receive) -> Result<ViolationMapping, ServiceError> {
        require_branch(&self.reference, op.branch_id).await?;
        for line in &op.lines {
            require_product(&self.reference, line.product_id, false).await?;
        }
        Ok(ViolationMapping::Addition)
    }

    async fn check_stock_out(&self, op: &StockOut) -> Result<ViolationMapping, ServiceError> {
        require_branch(&self.reference, op.branch_id).await?;
        require_product(&self.reference, op.product_id, true).await?;
        Ok(ViolationMapping::Removal)
    }

    async fn check_transfer(&self, op: &Transfer) -> Result<ViolationMapping, ServiceError> {
        require_branch(&self.reference, op.source_branch_id).await?;
        require_branch(&self.reference, op.destination_branch_id).await?;
        require_product(&self.reference, op.product_id, true).await?;
        Ok(ViolationMapping::Removal)
    }

    async fn check_mark_damaged(&self, op: &MarkDamaged) -> Result<ViolationMapping, ServiceError> {
        require_branch(&self.reference, op.branch_id).await?;
        require_product(&self.reference, op.product_id, true).await?;
        Ok(ViolationMapping::Flagging)
    }
}
