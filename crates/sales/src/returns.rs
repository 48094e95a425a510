//! Returns and their conversion into store credit.
//!
//! [`settle`] is the decision step: given the sold lines of an order (as
//! currently stored) and the customer's active credit, it validates a return
//! request and computes everything that must be written. Stores call it while
//! holding those rows, then persist the settlement in one transaction.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use backoffice_core::{CreditId, DomainError, DomainResult, EmployeeId, Money, OrderId, ProductId};

use crate::credit::StoreCredit;
use crate::order_line::OrderLine;

/// One product being brought back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLineRequest {
    pub product_id: ProductId,
    pub quantity: i64,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRequest {
    pub order_id: OrderId,
    pub employee_id: EmployeeId,
    pub customer_name: String,
    pub lines: Vec<ReturnLineRequest>,
}

impl ReturnRequest {
    /// Customer name as used to match store credits.
    pub fn customer(&self) -> &str {
        self.customer_name.trim()
    }

    /// Distinct products referenced, in lock order.
    pub fn product_ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<ProductId> = self.lines.iter().map(|l| l.product_id).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// Shape checks that need no stored state.
    pub fn validate(&self) -> DomainResult<()> {
        if self.customer().is_empty() {
            return Err(DomainError::validation("customer name is required"));
        }
        if self.lines.is_empty() {
            return Err(DomainError::validation("return must contain at least one line"));
        }
        for (idx, line) in self.lines.iter().enumerate() {
            if line.quantity <= 0 {
                return Err(DomainError::validation(format!(
                    "return line {} has non-positive quantity {}",
                    idx + 1,
                    line.quantity
                )));
            }
        }
        Ok(())
    }
}

/// Audit note recorded for every accepted return line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnNote {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub employee_id: EmployeeId,
    pub quantity: i64,
    pub refund: Money,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Everything an accepted return writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnSettlement {
    /// Order lines after the return, one per distinct product.
    pub lines: Vec<OrderLine>,
    pub notes: Vec<ReturnNote>,
    pub total_credit_amount: Money,
    /// The customer's active credit after the refund is added.
    pub credit: StoreCredit,
    /// True when `credit` did not exist before this return.
    pub credit_opened: bool,
}

/// Result handed back to the caller of a processed return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnOutcome {
    pub message: String,
    pub credit_id: CreditId,
    pub total_credit_amount: Money,
}

impl ReturnOutcome {
    pub fn from_settlement(settlement: &ReturnSettlement) -> Self {
        Self {
            message: "Return processed".to_string(),
            credit_id: settlement.credit.id,
            total_credit_amount: settlement.total_credit_amount,
        }
    }
}

/// Validate `request` against the stored `sold` lines and compute its settlement.
///
/// All-or-nothing: any missing line or over-return rejects the whole request.
/// Several request lines for the same product count cumulatively against it.
pub fn settle(
    request: &ReturnRequest,
    sold: &BTreeMap<ProductId, OrderLine>,
    active_credit: Option<&StoreCredit>,
    at: DateTime<Utc>,
) -> DomainResult<ReturnSettlement> {
    request.validate()?;

    let mut updated: BTreeMap<ProductId, OrderLine> = BTreeMap::new();
    let mut notes = Vec::with_capacity(request.lines.len());
    let mut total = Money::ZERO;

    for line in &request.lines {
        let current = match updated.get(&line.product_id) {
            Some(l) => l,
            None => sold.get(&line.product_id).ok_or_else(|| {
                DomainError::not_found(format!(
                    "product {} was not sold on order {}",
                    line.product_id, request.order_id
                ))
            })?,
        };
        if current.order_id != request.order_id {
            return Err(DomainError::invariant(format!(
                "order line for product {} belongs to order {}",
                line.product_id, current.order_id
            )));
        }

        let next = current.record_return(line.quantity)?;
        let refund = next.unit_price_deducted.times(line.quantity)?;
        total = total.checked_add(refund)?;

        notes.push(ReturnNote {
            order_id: request.order_id,
            product_id: line.product_id,
            employee_id: request.employee_id,
            quantity: line.quantity,
            refund,
            note: line.note.clone(),
            created_at: at,
        });
        updated.insert(line.product_id, next);
    }

    let customer = request.customer();
    let (credit, credit_opened) = match active_credit {
        Some(existing) if existing.customer_name == customer => (existing.add(total, at)?, false),
        Some(existing) => {
            return Err(DomainError::invariant(format!(
                "store credit {} belongs to another customer",
                existing.id
            )));
        }
        None => (StoreCredit::open(customer, total, at), true),
    };

    Ok(ReturnSettlement {
        lines: updated.into_values().collect(),
        notes,
        total_credit_amount: total,
        credit,
        credit_opened,
    })
}
