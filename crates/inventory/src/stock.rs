use serde::{Deserialize, Serialize};
use thiserror::Error;

use backoffice_core::{BranchId, ProductId};

/// Ledger key: one stock record per (product, branch) pair.
///
/// Ordering is by product then branch; stores lock rows in this order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub branch_id: BranchId,
}

impl StockKey {
    pub fn new(product_id: ProductId, branch_id: BranchId) -> Self {
        Self {
            product_id,
            branch_id,
        }
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "product {} at branch {}", self.product_id, self.branch_id)
    }
}

/// Current truth for one (product, branch) pair.
///
/// `damaged` is the subset of `quantity` flagged unsellable, so
/// `0 <= damaged <= quantity` holds for every record a store hands out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: ProductId,
    pub branch_id: BranchId,
    pub quantity: i64,
    pub damaged: i64,
    /// Incremented on every applied delta.
    pub version: u64,
}

/// Signed change to a stock record.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta {
    pub key: StockKey,
    pub quantity: i64,
    pub damaged: i64,
}

impl StockDelta {
    pub fn new(key: StockKey, quantity: i64, damaged: i64) -> Self {
        Self {
            key,
            quantity,
            damaged,
        }
    }
}

/// A delta that would leave a record outside `0 <= damaged <= quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockViolation {
    #[error("quantity of {key} would drop to {resulting} (on hand: {on_hand})")]
    NegativeQuantity {
        key: StockKey,
        on_hand: i64,
        resulting: i64,
    },

    #[error("damaged count of {key} would drop to {resulting} (damaged: {damaged})")]
    NegativeDamaged {
        key: StockKey,
        damaged: i64,
        resulting: i64,
    },

    #[error("damaged count of {key} would be {damaged} with only {quantity} on hand")]
    DamagedExceedsQuantity {
        key: StockKey,
        quantity: i64,
        damaged: i64,
    },

    #[error("arithmetic overflow applying delta to {key}")]
    Overflow { key: StockKey },
}

impl StockViolation {
    pub fn key(&self) -> StockKey {
        match self {
            StockViolation::NegativeQuantity { key, .. }
            | StockViolation::NegativeDamaged { key, .. }
            | StockViolation::DamagedExceedsQuantity { key, .. }
            | StockViolation::Overflow { key } => *key,
        }
    }
}

impl StockRecord {
    /// A zero record for a pair that has never received stock.
    pub fn empty(key: StockKey) -> Self {
        Self {
            product_id: key.product_id,
            branch_id: key.branch_id,
            quantity: 0,
            damaged: 0,
            version: 0,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.branch_id)
    }

    /// Units on hand that are not flagged damaged.
    pub fn sellable(&self) -> i64 {
        self.quantity - self.damaged
    }

    /// Compute the record that results from `delta`, or the rule it breaks.
    ///
    /// Pure: stores call this while holding the row so the check and the write
    /// cannot be separated by a concurrent update.
    pub fn apply_delta(&self, delta: &StockDelta) -> Result<StockRecord, StockViolation> {
        let key = self.key();
        let quantity = self
            .quantity
            .checked_add(delta.quantity)
            .ok_or(StockViolation::Overflow { key })?;
        let damaged = self
            .damaged
            .checked_add(delta.damaged)
            .ok_or(StockViolation::Overflow { key })?;

        if quantity < 0 {
            return Err(StockViolation::NegativeQuantity {
                key,
                on_hand: self.quantity,
                resulting: quantity,
            });
        }
        if damaged < 0 {
            return Err(StockViolation::NegativeDamaged {
                key,
                damaged: self.damaged,
                resulting: damaged,
            });
        }
        if damaged > quantity {
            return Err(StockViolation::DamagedExceedsQuantity {
                key,
                quantity,
                damaged,
            });
        }

        Ok(StockRecord {
            product_id: self.product_id,
            branch_id: self.branch_id,
            quantity,
            damaged,
            version: self.version + 1,
        })
    }
}
