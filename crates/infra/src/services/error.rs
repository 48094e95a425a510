use thiserror::Error;

use backoffice_core::DomainError;
use backoffice_inventory::StockViolation;

use crate::error::{StoreError, WriteError};

/// Error surface of the back-office services.
///
/// Every variant except `Storage` is deterministic: retrying the same request
/// fails the same way. `Storage` failures left nothing written and are safe to
/// retry when [`ServiceError::is_retryable`] says so.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Malformed input or an unknown / unusable reference.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced order line or store credit does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    #[error("over return: {0}")]
    OverReturn(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ServiceError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Storage(err) => err.is_transient(),
            _ => false,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::InsufficientStock(_) => "insufficient_stock",
            ServiceError::OverReturn(_) => "over_return",
            ServiceError::Storage(_) => "storage_failure",
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => ServiceError::Validation(msg),
            DomainError::NotFound(msg) => ServiceError::NotFound(msg),
            DomainError::OverReturn(msg) => ServiceError::OverReturn(msg),
            // Stored rows contradict each other; nothing was written.
            DomainError::InvariantViolation(msg) => ServiceError::Storage(StoreError::Corrupt(msg)),
        }
    }
}

impl From<WriteError<DomainError>> for ServiceError {
    fn from(value: WriteError<DomainError>) -> Self {
        match value {
            WriteError::Rejected(err) => err.into(),
            WriteError::Store(err) => ServiceError::Storage(err),
        }
    }
}

/// How a stock rule violation reads to the caller of a given operation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum ViolationMapping {
    /// Removing units: any violation means not enough stock.
    Removal,
    /// Flagging units damaged: exceeding what is on hand is bad input.
    Flagging,
    /// Adding units: only overflow is possible.
    Addition,
}

impl ViolationMapping {
    pub(crate) fn map(self, violation: StockViolation) -> ServiceError {
        match (self, &violation) {
            (_, StockViolation::Overflow { .. }) => ServiceError::Validation(violation.to_string()),
            (ViolationMapping::Removal, _) => ServiceError::InsufficientStock(violation.to_string()),
            (ViolationMapping::Flagging, _) | (ViolationMapping::Addition, _) => {
                ServiceError::Validation(violation.to_string())
            }
        }
    }

    pub(crate) fn map_write(self, err: WriteError<StockViolation>) -> ServiceError {
        match err {
            WriteError::Rejected(violation) => self.map(violation),
            WriteError::Store(err) => ServiceError::Storage(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backoffice_core::{BranchId, ProductId};
    use backoffice_inventory::StockKey;

    fn negative() -> StockViolation {
        StockViolation::NegativeQuantity {
            key: StockKey::new(ProductId::new(), BranchId::new()),
            on_hand: 1,
            resulting: -1,
        }
    }

    #[test]
    fn removal_violations_are_insufficient_stock() {
        let err = ViolationMapping::Removal.map(negative());
        assert_eq!(err.code(), "insufficient_stock");
        assert!(!err.is_retryable());
    }

    #[test]
    fn flagging_violations_are_validation() {
        let violation = StockViolation::DamagedExceedsQuantity {
            key: StockKey::new(ProductId::new(), BranchId::new()),
            quantity: 2,
            damaged: 3,
        };
        assert!(matches!(ViolationMapping::Flagging.map(violation), ServiceError::Validation(_)));
    }

    #[test]
    fn only_transient_storage_failures_are_retryable() {
        assert!(ServiceError::Storage(StoreError::Conflict("x".into())).is_retryable());
        assert!(!ServiceError::Storage(StoreError::Corrupt("x".into())).is_retryable());
        assert!(!ServiceError::from(DomainError::over_return("x")).is_retryable());
    }

    #[test]
    fn domain_errors_keep_their_kind() {
        assert_eq!(ServiceError::from(DomainError::not_found("line")).code(), "not_found");
        assert_eq!(ServiceError::from(DomainError::invalid_id("x")).code(), "validation");
    }

    #[test]
    fn contradictory_stored_rows_are_non_retryable_storage_failures() {
        let err = ServiceError::from(DomainError::invariant("credit belongs to another customer"));
        assert!(matches!(err, ServiceError::Storage(StoreError::Corrupt(_))));
        assert!(!err.is_retryable());
    }
}
