//! Store error types
//!
//! Errors reported by a transactional store. Every error carries a numeric
//! code and a retry classification: retryable errors are handed back to the
//! transaction's `on_error`, which backs off and resets it; anything else is
//! fatal to the benchmark.

use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by a transactional store
///
/// `Clone` so a single read-version fetch can hand its outcome to every
/// waiting client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Transaction aborted by conflict detection (another transaction wrote a
    /// key in one of its read conflict ranges after its read version)
    #[error("Transaction not committed due to conflict with another transaction")]
    NotCommitted,

    /// Read version is older than the store's retained history
    #[error("Transaction is too old to perform reads or be committed")]
    TransactionTooOld,

    /// Read version is newer than anything the store has committed
    #[error("Request for future version")]
    FutureVersion,

    /// Operation did not complete in time
    #[error("Operation timed out")]
    TimedOut,

    /// Store temporarily unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Commit outcome could not be determined
    #[error("Commit result unknown")]
    CommitUnknownResult,

    /// Operation not valid in the transaction's current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Unrecoverable store failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Numeric error code, stable across releases
    pub fn code(&self) -> i32 {
        match self {
            StoreError::TransactionTooOld => 1007,
            StoreError::FutureVersion => 1009,
            StoreError::NotCommitted => 1020,
            StoreError::CommitUnknownResult => 1021,
            StoreError::TimedOut => 1031,
            StoreError::Unavailable(_) => 1040,
            StoreError::InvalidOperation(_) => 2000,
            StoreError::Internal(_) => 4100,
        }
    }

    /// True if `on_error` may back off and let the caller retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::NotCommitted
                | StoreError::TransactionTooOld
                | StoreError::FutureVersion
                | StoreError::TimedOut
                | StoreError::Unavailable(_)
                | StoreError::CommitUnknownResult
        )
    }

    /// True for conflict aborts
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::NotCommitted)
    }
}
