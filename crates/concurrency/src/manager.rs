//! Transaction manager for coordinating commit operations
//!
//! Provides atomic commit by orchestrating:
//! 1. Validation (first-committer-wins over conflict ranges)
//! 2. Version allocation
//! 3. Storage application (visibility)
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. Take the commit lock (the history mutex)
//! 2. validate_transaction() against commits newer than the read version
//! 3. IF conflicts: return ValidationFailed
//! 4. commit_version = current + 1
//! 5. apply writes at commit_version
//! 6. record the write ranges in the history
//! 7. publish commit_version (new read versions see the writes)
//! 8. prune history older than the MVCC window
//! ```
//!
//! The version is published only after the writes are applied, so a read
//! version handed out by [`TransactionManager::current_version`] never
//! points at half-applied data.

use crate::validation::{validate_transaction, CommitRecord, ValidationResult};
use parking_lot::Mutex;
use rwbench_core::{KeyRange, StoreError, Version};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// Error type for commit failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// Transaction aborted due to validation conflicts
    ValidationFailed(ValidationResult),

    /// Transaction was not in correct state for commit
    InvalidState(String),
}

impl std::fmt::Display for CommitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitError::ValidationFailed(result) => {
                write!(f, "Commit failed: {} conflict(s)", result.conflict_count())
            }
            CommitError::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
        }
    }
}

impl std::error::Error for CommitError {}

impl From<CommitError> for StoreError {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::ValidationFailed(result) => result
                .to_store_error()
                .unwrap_or_else(|| StoreError::Internal("empty validation failure".to_string())),
            CommitError::InvalidState(msg) => StoreError::InvalidOperation(msg),
        }
    }
}

/// Conflict footprint of a transaction asking to commit
#[derive(Debug, Clone, Default)]
pub struct CommitRequest {
    /// Version the transaction read at
    pub read_version: Version,
    /// Read conflict ranges
    pub read_ranges: Vec<KeyRange>,
    /// Write conflict ranges (written keys plus declared ranges)
    pub write_ranges: Vec<KeyRange>,
}

impl CommitRequest {
    /// True if the transaction wrote nothing and declared no write ranges
    pub fn is_read_only(&self) -> bool {
        self.write_ranges.is_empty()
    }
}

/// Manages the commit clock and the conflict history
///
/// The global version counter is incremented once per committed
/// transaction. All keys written by a transaction share its commit version.
pub struct TransactionManager {
    /// Last published commit version
    version: AtomicU64,

    /// Next transaction ID
    next_txn_id: AtomicU64,

    /// Write ranges of recent commits, oldest first
    ///
    /// Holding this lock serializes commits.
    history: Mutex<VecDeque<CommitRecord>>,

    /// Number of versions a read version stays valid for
    mvcc_window: u64,
}

impl TransactionManager {
    /// Create a new transaction manager
    ///
    /// # Arguments
    /// * `initial_version` - Starting version
    /// * `mvcc_window` - How many versions behind the newest one a read
    ///   version may lag before it is too old
    pub fn new(initial_version: u64, mvcc_window: u64) -> Self {
        TransactionManager {
            version: AtomicU64::new(initial_version),
            next_txn_id: AtomicU64::new(1),
            history: Mutex::new(VecDeque::new()),
            mvcc_window,
        }
    }

    /// Get current global version
    pub fn current_version(&self) -> Version {
        Version(self.version.load(Ordering::SeqCst))
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> u64 {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Oldest read version that can still be read and validated
    pub fn oldest_retained(&self) -> Version {
        Version(self.current_version().0.saturating_sub(self.mvcc_window))
    }

    /// Check a read version against the retained window
    pub fn check_read_version(&self, read_version: Version) -> Result<(), StoreError> {
        if read_version > self.current_version() {
            return Err(StoreError::FutureVersion);
        }
        if read_version < self.oldest_retained() {
            return Err(StoreError::TransactionTooOld);
        }
        Ok(())
    }

    /// Number of commits kept in the conflict history
    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Commit a transaction atomically
    ///
    /// Read-only requests succeed at their read version without touching the
    /// clock. Otherwise the request is validated and, if it passes, `apply`
    /// is called with the new commit version while the commit lock is held.
    ///
    /// # Returns
    /// - Ok(commit_version) on success
    /// - Err(CommitError) if validation fails
    pub fn commit<F>(&self, request: CommitRequest, apply: F) -> Result<Version, CommitError>
    where
        F: FnOnce(Version),
    {
        if request.is_read_only() {
            return Ok(request.read_version);
        }

        let mut history = self.history.lock();

        let result = validate_transaction(
            request.read_version,
            &request.read_ranges,
            false,
            &history,
            self.oldest_retained(),
        );
        if !result.is_valid() {
            return Err(CommitError::ValidationFailed(result));
        }

        let commit_version = self.current_version().next();
        apply(commit_version);

        history.push_back(CommitRecord {
            version: commit_version,
            write_ranges: request.write_ranges,
        });
        self.version.store(commit_version.0, Ordering::SeqCst);

        let oldest = self.oldest_retained();
        while history.front().map_or(false, |r| r.version <= oldest) {
            history.pop_front();
        }

        Ok(commit_version)
    }
}
