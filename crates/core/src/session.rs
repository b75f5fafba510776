//! Session transactions with a local write cache
//!
//! `SessionStore` wraps any store so that its transactions keep their writes
//! in a local ordered cache until commit:
//! - point reads of a locally written key are answered from the cache
//! - range reads merge cached writes into the store's rows
//! - the cache is flushed into the inner transaction at commit
//! - `on_error` discards the cache together with the inner transaction state

use async_trait::async_trait;
use std::collections::BTreeMap;
use tracing::trace;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::{KvStore, Transaction};
use crate::types::{Key, KeyRange, Value, Version};

/// Store adapter handing out [`SessionTransaction`]s
#[derive(Debug, Clone)]
pub struct SessionStore<S> {
    inner: S,
}

impl<S> SessionStore<S> {
    /// Wrap `inner`
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// The wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: KvStore> KvStore for SessionStore<S> {
    type Transaction = SessionTransaction<S::Transaction>;

    fn begin_transaction(&self) -> Self::Transaction {
        SessionTransaction::new(self.inner.begin_transaction())
    }

    async fn warm_range(&self, range: &KeyRange) -> StoreResult<()> {
        self.inner.warm_range(range).await
    }
}

/// Transaction that reads its own writes from a local cache
#[derive(Debug)]
pub struct SessionTransaction<T> {
    inner: T,
    writes: BTreeMap<Key, Value>,
}

impl<T> SessionTransaction<T> {
    /// Wrap an inner transaction
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            writes: BTreeMap::new(),
        }
    }

    /// Number of writes waiting in the local cache
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }
}

#[async_trait]
impl<T: Transaction> Transaction for SessionTransaction<T> {
    async fn get_read_version(&mut self) -> StoreResult<Version> {
        self.inner.get_read_version().await
    }

    fn set_read_version(&mut self, version: Version) {
        self.inner.set_read_version(version);
    }

    async fn get(&self, key: &[u8]) -> StoreResult<Option<Value>> {
        if let Some(value) = self.writes.get(key) {
            return Ok(Some(value.clone()));
        }
        self.inner.get(key).await
    }

    async fn get_range(&self, range: &KeyRange, limit: usize) -> StoreResult<Vec<(Key, Value)>> {
        if range.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let mut rows: BTreeMap<Key, Value> = self
            .inner
            .get_range(range, limit)
            .await?
            .into_iter()
            .collect();
        for (key, value) in self.writes.range(range.begin.clone()..range.end.clone()) {
            rows.insert(key.clone(), value.clone());
        }
        // The store's rows stop at `limit`; anything merged past that point
        // sorts after them and is cut here.
        Ok(rows.into_iter().take(limit).collect())
    }

    fn set(&mut self, key: Key, value: Value) {
        self.writes.insert(key, value);
    }

    fn add_read_conflict_range(&mut self, range: KeyRange) {
        self.inner.add_read_conflict_range(range);
    }

    fn add_write_conflict_range(&mut self, range: KeyRange) {
        self.inner.add_write_conflict_range(range);
    }

    async fn commit(&mut self) -> StoreResult<Version> {
        let writes = std::mem::take(&mut self.writes);
        trace!(target: "rwbench::store", writes = writes.len(), "Flushing session write cache");
        for (key, value) in writes {
            self.inner.set(key, value);
        }
        self.inner.commit().await
    }

    async fn on_error(&mut self, error: StoreError) -> StoreResult<()> {
        self.writes.clear();
        self.inner.on_error(error).await
    }

    fn debug_transaction(&mut self, id: Uuid) {
        self.inner.debug_transaction(id);
    }
}
