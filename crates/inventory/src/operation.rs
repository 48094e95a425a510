//! Stock operations and their planning step.
//!
//! Each operation is validated and turned into a [`Posting`]: the deltas to
//! apply to the ledger plus the movements to append, which a store then
//! commits as one atomic unit. Planning is pure; it never looks at current
//! quantities. Those checks happen in [`Posting::apply_to`] while the store
//! holds the affected rows.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_core::{BatchId, BranchId, DomainError, DomainResult, EmployeeId, MovementId, ProductId};

use crate::movement::{MovementAction, PendingMovement, StockOutReason};
use crate::stock::{StockDelta, StockKey, StockRecord, StockViolation};

/// One received product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Operation: goods arriving at a branch (one supplier delivery).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receive {
    pub batch_id: BatchId,
    pub branch_id: BranchId,
    pub lines: Vec<ReceiptLine>,
    pub employee_id: Option<EmployeeId>,
    /// Where the goods came from (e.g. the supplier reference).
    pub reason: Option<String>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Operation: units leaving a branch (sale, loss, damage write-off).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockOut {
    pub batch_id: BatchId,
    pub product_id: ProductId,
    pub branch_id: BranchId,
    pub quantity: i64,
    pub employee_id: EmployeeId,
    pub reason: StockOutReason,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Operation: units moving between two branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub batch_id: BatchId,
    pub product_id: ProductId,
    pub source_branch_id: BranchId,
    pub destination_branch_id: BranchId,
    pub quantity: i64,
    pub employee_id: Option<EmployeeId>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Operation: flag units already on hand as unsellable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkDamaged {
    pub batch_id: BatchId,
    pub product_id: ProductId,
    pub branch_id: BranchId,
    pub quantity: i64,
    pub employee_id: Option<EmployeeId>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockOperation {
    Receive(Receive),
    StockOut(StockOut),
    Transfer(Transfer),
    MarkDamaged(MarkDamaged),
}

impl StockOperation {
    pub fn batch_id(&self) -> BatchId {
        match self {
            StockOperation::Receive(op) => op.batch_id,
            StockOperation::StockOut(op) => op.batch_id,
            StockOperation::Transfer(op) => op.batch_id,
            StockOperation::MarkDamaged(op) => op.batch_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StockOperation::Receive(_) => "inventory.stock.receive",
            StockOperation::StockOut(_) => "inventory.stock.out",
            StockOperation::Transfer(_) => "inventory.stock.transfer",
            StockOperation::MarkDamaged(_) => "inventory.stock.mark_damaged",
        }
    }

    /// Every (product, branch) pair this operation references.
    pub fn keys(&self) -> Vec<StockKey> {
        match self {
            StockOperation::Receive(op) => op
                .lines
                .iter()
                .map(|l| StockKey::new(l.product_id, op.branch_id))
                .collect(),
            StockOperation::StockOut(op) => vec![StockKey::new(op.product_id, op.branch_id)],
            StockOperation::Transfer(op) => vec![
                StockKey::new(op.product_id, op.source_branch_id),
                StockKey::new(op.product_id, op.destination_branch_id),
            ],
            StockOperation::MarkDamaged(op) => vec![StockKey::new(op.product_id, op.branch_id)],
        }
    }

    /// Validate the operation and decide its ledger deltas and movements.
    pub fn plan(&self) -> DomainResult<Posting> {
        match self {
            StockOperation::Receive(op) => plan_receive(op),
            StockOperation::StockOut(op) => plan_stock_out(op),
            StockOperation::Transfer(op) => plan_transfer(op),
            StockOperation::MarkDamaged(op) => plan_mark_damaged(op),
        }
    }
}

/// Deltas plus movements that must be committed together or not at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub batch_id: BatchId,
    pub deltas: Vec<StockDelta>,
    pub movements: Vec<PendingMovement>,
}

impl Posting {
    /// Distinct keys touched, in lock order.
    pub fn keys(&self) -> BTreeSet<StockKey> {
        self.deltas.iter().map(|d| d.key).collect()
    }

    /// Apply every delta in order against `records`.
    ///
    /// Absent keys start from [`StockRecord::empty`]. On failure `records` is left
    /// untouched. On success it holds the new state and the touched records are
    /// returned in key order.
    pub fn apply_to(
        &self,
        records: &mut BTreeMap<StockKey, StockRecord>,
    ) -> Result<Vec<StockRecord>, StockViolation> {
        let mut working: BTreeMap<StockKey, StockRecord> = BTreeMap::new();
        for delta in &self.deltas {
            let current = match working.get(&delta.key) {
                Some(r) => r.clone(),
                None => records
                    .get(&delta.key)
                    .cloned()
                    .unwrap_or_else(|| StockRecord::empty(delta.key)),
            };
            let next = current.apply_delta(delta)?;
            working.insert(delta.key, next);
        }

        let touched: Vec<StockRecord> = working.values().cloned().collect();
        records.extend(working);
        Ok(touched)
    }
}

fn ensure_positive(quantity: i64, what: &str) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation(format!(
            "{what} quantity must be greater than zero (got {quantity})"
        )));
    }
    Ok(())
}

fn plan_receive(op: &Receive) -> DomainResult<Posting> {
    if op.lines.is_empty() {
        return Err(DomainError::validation("receipt must contain at least one line"));
    }
    // Reject the whole receipt before producing anything for it.
    for (idx, line) in op.lines.iter().enumerate() {
        ensure_positive(line.quantity, &format!("receipt line {}", idx + 1))?;
    }

    let mut deltas = Vec::with_capacity(op.lines.len());
    let mut movements = Vec::with_capacity(op.lines.len());
    for line in &op.lines {
        deltas.push(StockDelta::new(
            StockKey::new(line.product_id, op.branch_id),
            line.quantity,
            0,
        ));
        movements.push(PendingMovement {
            id: MovementId::new(),
            batch_id: op.batch_id,
            action: MovementAction::StockIn,
            product_id: line.product_id,
            source_branch_id: None,
            destination_branch_id: Some(op.branch_id),
            quantity: line.quantity,
            employee_id: op.employee_id,
            reason: op.reason.clone(),
            note: op.note.clone(),
            occurred_at: op.occurred_at,
        });
    }

    Ok(Posting {
        batch_id: op.batch_id,
        deltas,
        movements,
    })
}

fn plan_stock_out(op: &StockOut) -> DomainResult<Posting> {
    ensure_positive(op.quantity, "stock out")?;

    let damaged_delta = if op.reason.is_damaged() { -op.quantity } else { 0 };
    let key = StockKey::new(op.product_id, op.branch_id);

    Ok(Posting {
        batch_id: op.batch_id,
        deltas: vec![StockDelta::new(key, -op.quantity, damaged_delta)],
        movements: vec![PendingMovement {
            id: MovementId::new(),
            batch_id: op.batch_id,
            action: MovementAction::StockOut,
            product_id: op.product_id,
            source_branch_id: Some(op.branch_id),
            destination_branch_id: None,
            quantity: op.quantity,
            employee_id: Some(op.employee_id),
            reason: Some(op.reason.as_str().to_string()),
            note: op.note.clone(),
            occurred_at: op.occurred_at,
        }],
    })
}

fn plan_transfer(op: &Transfer) -> DomainResult<Posting> {
    ensure_positive(op.quantity, "transfer")?;
    if op.source_branch_id == op.destination_branch_id {
        return Err(DomainError::validation(
            "transfer source and destination branches must differ",
        ));
    }

    Ok(Posting {
        batch_id: op.batch_id,
        deltas: vec![
            StockDelta::new(StockKey::new(op.product_id, op.source_branch_id), -op.quantity, 0),
            StockDelta::new(
                StockKey::new(op.product_id, op.destination_branch_id),
                op.quantity,
                0,
            ),
        ],
        movements: vec![PendingMovement {
            id: MovementId::new(),
            batch_id: op.batch_id,
            action: MovementAction::Transfer,
            product_id: op.product_id,
            source_branch_id: Some(op.source_branch_id),
            destination_branch_id: Some(op.destination_branch_id),
            quantity: op.quantity,
            employee_id: op.employee_id,
            reason: None,
            note: op.note.clone(),
            occurred_at: op.occurred_at,
        }],
    })
}

fn plan_mark_damaged(op: &MarkDamaged) -> DomainResult<Posting> {
    ensure_positive(op.quantity, "damaged")?;

    Ok(Posting {
        batch_id: op.batch_id,
        deltas: vec![StockDelta::new(
            StockKey::new(op.product_id, op.branch_id),
            0,
            op.quantity,
        )],
        movements: vec![PendingMovement {
            id: MovementId::new(),
            batch_id: op.batch_id,
            action: MovementAction::MarkDamaged,
            product_id: op.product_id,
            source_branch_id: Some(op.branch_id),
            destination_branch_id: None,
            quantity: op.quantity,
            employee_id: op.employee_id,
            reason: None,
            note: op.note.clone(),
            occurred_at: op.occurred_at,
        }],
    })
}
