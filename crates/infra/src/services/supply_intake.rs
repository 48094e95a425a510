use chrono::Utc;
use tracing::instrument;

use backoffice_purchasing::SupplyBatch;

use super::checks::{require_branch, require_product, require_supplier};
use super::error::ViolationMapping;
use super::stock_coordinator::commit_posting;
use super::ServiceError;
use crate::ledger_store::{PostingReceipt, StockLedger};
use crate::reference::ReferenceData;

/// Books supplier deliveries as one `StockIn` movement per line.
///
/// The whole batch is a single posting: one bad line and nothing is received.
#[derive(Debug, Clone)]
pub struct SupplyIntakeProcessor<L, R> {
    ledger: L,
    reference: R,
}

impl<L, R> SupplyIntakeProcessor<L, R>
where
    L: StockLedger,
    R: ReferenceData,
{
    pub fn new(ledger: L, reference: R) -> Self {
        Self { ledger, reference }
    }

    #[instrument(
        skip(self, batch),
        fields(batch_id = %batch.batch_id, supplier_id = %batch.supplier_id, lines = batch.lines.len()),
        err
    )]
    pub async fn receive(&self, batch: SupplyBatch) -> Result<PostingReceipt, ServiceError> {
        batch.validate()?;
        require_supplier(&self.reference, batch.supplier_id).await?;
        require_branch(&self.reference, batch.branch_id).await?;
        for line in &batch.lines {
            require_product(&self.reference, line.product_id, false).await?;
        }

        let operation = batch.to_operation(Utc::now());
        let posting = operation.plan()?;
        commit_posting(&self.ledger, posting, ViolationMapping::Addition, operation.kind()).await
    }
}
