//! Store capability traits
//!
//! The benchmark never talks to a concrete store. It drives any type that
//! implements [`KvStore`], and every operation goes through the store's
//! [`Transaction`] type. Both the direct and the session (local write cache)
//! variants implement the same pair of traits, so the transaction loop is
//! written once against them.
//!
//! Thread safety: stores are shared by many client tasks, so both traits
//! require `Send + Sync`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::types::{Key, KeyRange, Value, Version};

/// A transactional key-value store
#[async_trait]
pub trait KvStore: Send + Sync + 'static {
    /// Transaction type handed out by this store
    type Transaction: Transaction;

    /// Start a new transaction
    ///
    /// The transaction has no read version yet; it acquires one through
    /// [`Transaction::get_read_version`] or adopts one through
    /// [`Transaction::set_read_version`].
    fn begin_transaction(&self) -> Self::Transaction;

    /// Hint that `range` is about to be read
    ///
    /// Best effort. The default does nothing.
    async fn warm_range(&self, _range: &KeyRange) -> StoreResult<()> {
        Ok(())
    }
}

/// One transaction against a [`KvStore`]
///
/// Reads take `&self` so several of them can be in flight at once; buffered
/// mutations take `&mut self`.
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Fetch a consistent read version from the store
    async fn get_read_version(&mut self) -> StoreResult<Version>;

    /// Read at `version` instead of fetching one
    fn set_read_version(&mut self, version: Version);

    /// Point read
    async fn get(&self, key: &[u8]) -> StoreResult<Option<Value>>;

    /// Range read of at most `limit` rows, in key order
    async fn get_range(&self, range: &KeyRange, limit: usize) -> StoreResult<Vec<(Key, Value)>>;

    /// Buffer a write
    fn set(&mut self, key: Key, value: Value);

    /// Add a range whose concurrent modification must abort this transaction
    fn add_read_conflict_range(&mut self, range: KeyRange);

    /// Add a range that concurrent readers must treat as modified
    fn add_write_conflict_range(&mut self, range: KeyRange);

    /// Commit buffered writes, returning the commit version
    async fn commit(&mut self) -> StoreResult<Version>;

    /// Handle an error raised by this transaction
    ///
    /// Retryable errors resolve to `Ok(())` after the store's backoff, with
    /// the transaction reset to a fresh state. Anything else is returned.
    async fn on_error(&mut self, error: StoreError) -> StoreResult<()>;

    /// Tag the transaction with a correlation id for store-side tracing
    fn debug_transaction(&mut self, _id: Uuid) {}
}
