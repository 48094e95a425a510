//! Movement log entries: the append-only audit trail behind the ledger.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_core::{BatchId, BranchId, DomainError, EmployeeId, MovementId, ProductId};

use crate::stock::StockKey;

/// What kind of movement an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementAction {
    StockIn,
    StockOut,
    Transfer,
    MarkDamaged,
}

impl MovementAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementAction::StockIn => "stock_in",
            MovementAction::StockOut => "stock_out",
            MovementAction::Transfer => "transfer",
            MovementAction::MarkDamaged => "mark_damaged",
        }
    }
}

impl FromStr for MovementAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stock_in" => Ok(MovementAction::StockIn),
            "stock_out" => Ok(MovementAction::StockOut),
            "transfer" => Ok(MovementAction::Transfer),
            "mark_damaged" => Ok(MovementAction::MarkDamaged),
            other => Err(DomainError::validation(format!("unknown movement action '{other}'"))),
        }
    }
}

/// Why units left a branch.
///
/// `Damaged` is the one reason with ledger semantics: the units leave the
/// damaged subset as well as the on-hand quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockOutReason {
    Sold,
    Lost,
    Damaged,
    Other(String),
}

impl StockOutReason {
    /// Parse a free-form reason; blank input is rejected.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("stock out reason is required"));
        }
        Ok(match trimmed {
            "Sold" => StockOutReason::Sold,
            "Lost" => StockOutReason::Lost,
            "Damaged" => StockOutReason::Damaged,
            other => StockOutReason::Other(other.to_string()),
        })
    }

    pub fn as_str(&self) -> &str {
        match self {
            StockOutReason::Sold => "Sold",
            StockOutReason::Lost => "Lost",
            StockOutReason::Damaged => "Damaged",
            StockOutReason::Other(s) => s,
        }
    }

    pub fn is_damaged(&self) -> bool {
        matches!(self, StockOutReason::Damaged)
    }
}

/// A movement ready to be appended (not yet assigned a log position).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMovement {
    pub id: MovementId,
    pub batch_id: BatchId,
    pub action: MovementAction,
    pub product_id: ProductId,
    pub source_branch_id: Option<BranchId>,
    pub destination_branch_id: Option<BranchId>,
    pub quantity: i64,
    pub employee_id: Option<EmployeeId>,
    pub reason: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl PendingMovement {
    /// Assign the log position chosen by the store.
    pub fn commit(self, sequence: u64) -> MovementEntry {
        MovementEntry {
            id: self.id,
            sequence,
            batch_id: self.batch_id,
            action: self.action,
            product_id: self.product_id,
            source_branch_id: self.source_branch_id,
            destination_branch_id: self.destination_branch_id,
            quantity: self.quantity,
            employee_id: self.employee_id,
            reason: self.reason,
            note: self.note,
            occurred_at: self.occurred_at,
        }
    }
}

/// An appended movement. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementEntry {
    pub id: MovementId,
    /// Monotonically increasing position in the movement log.
    pub sequence: u64,
    pub batch_id: BatchId,
    pub action: MovementAction,
    pub product_id: ProductId,
    pub source_branch_id: Option<BranchId>,
    pub destination_branch_id: Option<BranchId>,
    pub quantity: i64,
    pub employee_id: Option<EmployeeId>,
    pub reason: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl MovementEntry {
    /// True if this movement changed the record at `key` (as source or destination).
    pub fn touches(&self, key: &StockKey) -> bool {
        self.product_id == key.product_id
            && (self.source_branch_id == Some(key.branch_id)
                || self.destination_branch_id == Some(key.branch_id))
    }
}
