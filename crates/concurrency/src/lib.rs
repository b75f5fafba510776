//! In-memory transactional store for rwbench
//!
//! This crate implements the `rwbench-core` store traits with optimistic
//! concurrency control over a multi-version key-value map:
//! - TransactionManager: global commit version, commit history, first-committer-wins
//! - Validation: read-conflict ranges checked against later write-conflict ranges
//! - MemoryTransaction: read version, conflict ranges and buffered writes
//! - MemoryStore: shared state, simulated latencies, fault injection, stats
//!
//! It stands in for a real store in tests and in the `rwbench` CLI.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod retry;
pub mod store;
pub mod transaction;
pub mod validation;

pub use manager::{CommitError, CommitRequest, TransactionManager};
pub use retry::RetryConfig;
pub use store::{MemoryStore, MemoryStoreConfig, StoreStats};
pub use transaction::{MemoryTransaction, TransactionStatus};
pub use validation::{validate_transaction, CommitRecord, ConflictType, ValidationResult};
