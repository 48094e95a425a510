//! Storage-layer errors.
//!
//! These are **infrastructure errors** (connectivity, write conflicts, bad rows)
//! as opposed to domain errors. A store that validates a business rule while
//! holding rows reports the rule's own error through [`WriteError::Rejected`].

use thiserror::Error;

use backoffice_core::DomainError;
use backoffice_inventory::StockViolation;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Connection, pool or IO failure.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Concurrent write detected (unique violation, serialization failure,
    /// deadlock, stale row version).
    #[error("write conflict: {0}")]
    Conflict(String),

    /// The database refused a write through one of its constraints.
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// A stored row could not be decoded.
    #[error("corrupt stored data: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn poisoned() -> Self {
        StoreError::Unavailable("lock poisoned".to_string())
    }

    /// True when re-running the whole (atomic) operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Conflict(_))
    }
}

/// Failure of a guarded write: either the rule checked under lock, or storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError<R> {
    #[error("rejected: {0}")]
    Rejected(R),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Ledger posting failure.
pub type PostingError = WriteError<StockViolation>;

/// Return settlement / credit change failure.
pub type SettlementError = WriteError<DomainError>;

/// Map SQLx errors to [`StoreError`].
///
/// | SQLx error | PostgreSQL code | StoreError |
/// |---|---|---|
/// | Database (unique violation) | `23505` | `Conflict` |
/// | Database (serialization failure / deadlock) | `40001` / `40P01` | `Conflict` |
/// | Database (check / foreign key violation) | `23514` / `23503` | `Constraint` |
/// | Decode / ColumnDecode / ColumnNotFound / RowNotFound | n/a | `Corrupt` |
/// | anything else | n/a | `Unavailable` |
pub fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                Some("23514") | Some("23503") => StoreError::Constraint(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::RowNotFound => {
            StoreError::Corrupt(format!("unexpected row not found in {operation}"))
        }
        sqlx::Error::ColumnNotFound(col) => {
            StoreError::Corrupt(format!("column '{col}' missing in {operation}"))
        }
        sqlx::Error::ColumnDecode { index, source } => {
            StoreError::Corrupt(format!("column {index} undecodable in {operation}: {source}"))
        }
        sqlx::Error::Decode(source) => {
            StoreError::Corrupt(format!("decode failure in {operation}: {source}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Unavailable(format!("sqlx error in {operation}: {other}")),
    }
}

/// Map a domain decoding failure of a stored value to [`StoreError::Corrupt`].
pub fn corrupt(operation: &str, err: DomainError) -> StoreError {
    StoreError::Corrupt(format!("{operation}: {err}"))
}
