//! Supplier deliveries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use backoffice_core::{BatchId, BranchId, DomainError, DomainResult, EmployeeId, ProductId, SupplierId};
use backoffice_inventory::{ReceiptLine, Receive, StockOperation};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
}

/// Delivered product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// One supplier delivery into one receiving branch.
///
/// Expands into one `StockIn` movement per line, all sharing `batch_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyBatch {
    pub batch_id: BatchId,
    pub supplier_id: SupplierId,
    pub branch_id: BranchId,
    pub date: NaiveDate,
    pub lines: Vec<SupplyLine>,
    pub employee_id: Option<EmployeeId>,
    pub note: Option<String>,
}

impl SupplyBatch {
    /// Shape checks that need no reference data.
    pub fn validate(&self) -> DomainResult<()> {
        if self.lines.is_empty() {
            return Err(DomainError::validation(
                "supply batch must contain at least one line",
            ));
        }
        for (idx, line) in self.lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "supply line {} has non-positive quantity {}",
                    idx + 1,
                    line.quantity
                )));
            }
        }
        Ok(())
    }

    /// The ledger operation that books this delivery.
    pub fn to_operation(&self, occurred_at: DateTime<Utc>) -> StockOperation {
        StockOperation::Receive(Receive {
            batch_id: self.batch_id,
            branch_id: self.branch_id,
            lines: self
                .lines
                .iter()
                .map(|l| ReceiptLine {
                    product_id: l.product_id,
                    quantity: l.quantity,
                })
                .collect(),
            employee_id: self.employee_id,
            reason: Some(format!("supplier {} delivery of {}", self.supplier_id, self.date)),
            note: self.note.clone(),
            occurred_at,
        })
    }
}
