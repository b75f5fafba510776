//! Transaction handle for the in-memory store
//!
//! A `MemoryTransaction` tracks everything commit-time validation needs:
//! - the read version (fetched lazily on first read, or adopted through
//!   `set_read_version`)
//! - read conflict ranges (one per point read, the scanned span per range
//!   read, plus explicit ones)
//! - buffered writes and explicit write conflict ranges
//!
//! Reads take `&self`, so the read version and read ranges sit behind
//! mutexes that are never held across an `.await`. Reads do not see the
//! transaction's own buffered writes; `SessionStore` layers that on top.

use crate::manager::CommitRequest;
use crate::store::{simulate_latency, StoreCounters, StoreShared};
use async_trait::async_trait;
use parking_lot::Mutex;
use rwbench_core::{Key, KeyRange, StoreError, StoreResult, Transaction, Value, Version};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};
use uuid::Uuid;

/// Transaction lifecycle state
///
/// State transitions:
/// - `Active` → `Committed` (commit succeeded)
/// - `Active` → `Aborted` (commit failed)
/// - any → `Active` (reset by `on_error`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Transaction is executing, can read/write
    Active,
    /// Transaction committed successfully
    Committed {
        /// Commit version (the read version for read-only transactions)
        version: Version,
    },
    /// Transaction was aborted
    Aborted {
        /// Human-readable reason for abort
        reason: String,
    },
}

/// A transaction against [`crate::MemoryStore`]
pub struct MemoryTransaction {
    shared: Arc<StoreShared>,
    txn_id: u64,
    read_version: Mutex<Option<Version>>,
    read_ranges: Mutex<Vec<KeyRange>>,
    writes: BTreeMap<Key, Value>,
    write_ranges: Vec<KeyRange>,
    status: TransactionStatus,
    retries: u32,
    debug_id: Option<Uuid>,
}

impl MemoryTransaction {
    pub(crate) fn new(shared: Arc<StoreShared>) -> Self {
        let txn_id = shared.manager.next_txn_id();
        Self {
            shared,
            txn_id,
            read_version: Mutex::new(None),
            read_ranges: Mutex::new(Vec::new()),
            writes: BTreeMap::new(),
            write_ranges: Vec::new(),
            status: TransactionStatus::Active,
            retries: 0,
            debug_id: None,
        }
    }

    /// Transaction id (changes on every reset)
    pub fn txn_id(&self) -> u64 {
        self.txn_id
    }

    /// Current status
    pub fn status(&self) -> &TransactionStatus {
        &self.status
    }

    /// Number of times `on_error` reset this transaction
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Read version, if one has been fetched or set
    pub fn read_version(&self) -> Option<Version> {
        *self.read_version.lock()
    }

    /// Number of read conflict ranges recorded so far
    pub fn read_conflict_count(&self) -> usize {
        self.read_ranges.lock().len()
    }

    /// Correlation id set through `debug_transaction`
    pub fn debug_id(&self) -> Option<Uuid> {
        self.debug_id
    }

    fn ensure_active(&self) -> StoreResult<()> {
        match &self.status {
            TransactionStatus::Active => Ok(()),
            other => Err(StoreError::InvalidOperation(format!(
                "transaction {} is not active: {:?}",
                self.txn_id, other
            ))),
        }
    }

    async fn fetch_read_version(&self) -> Version {
        simulate_latency(self.shared.config.grv_latency).await;
        StoreCounters::bump(&self.shared.counters.read_versions);
        self.shared.manager.current_version()
    }

    /// Read version for a read, fetching one if none is set yet
    async fn read_version_for_read(&self) -> StoreResult<Version> {
        let cached = *self.read_version.lock();
        let version = match cached {
            Some(version) => version,
            None => {
                let fetched = self.fetch_read_version().await;
                *self.read_version.lock().get_or_insert(fetched)
            }
        };
        if let Err(e) = self.shared.manager.check_read_version(version) {
            if e == StoreError::TransactionTooOld {
                StoreCounters::bump(&self.shared.counters.too_old);
            }
            return Err(e);
        }
        Ok(version)
    }

    fn reset(&mut self) {
        self.txn_id = self.shared.manager.next_txn_id();
        *self.read_version.get_mut() = None;
        self.read_ranges.get_mut().clear();
        self.writes.clear();
        self.write_ranges.clear();
        self.status = TransactionStatus::Active;
    }
}

impl std::fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTransaction")
            .field("txn_id", &self.txn_id)
            .field("read_version", &self.read_version())
            .field("writes", &self.writes.len())
            .field("status", &self.status)
            .finish()
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get_read_version(&mut self) -> StoreResult<Version> {
        self.ensure_active()?;
        if let Some(version) = *self.read_version.get_mut() {
            return Ok(version);
        }
        let version = self.fetch_read_version().await;
        *self.read_version.get_mut() = Some(version);
        Ok(version)
    }

    fn set_read_version(&mut self, version: Version) {
        *self.read_version.get_mut() = Some(version);
    }

    async fn get(&self, key: &[u8]) -> StoreResult<Option<Value>> {
        self.ensure_active()?;
        let version = self.read_version_for_read().await?;
        simulate_latency(self.shared.config.read_latency).await;

        self.read_ranges.lock().push(KeyRange::single_key(key));
        StoreCounters::bump(&self.shared.counters.reads);
        Ok(self.shared.data.get_at(key, version))
    }

    async fn get_range(&self, range: &KeyRange, limit: usize) -> StoreResult<Vec<(Key, Value)>> {
        self.ensure_active()?;
        let version = self.read_version_for_read().await?;
        simulate_latency(self.shared.config.read_latency).await;

        let rows = self.shared.data.range_at(range, version, limit);

        // A truncated scan only depends on the keys up to its last row
        let conflict = match rows.last() {
            Some((last, _)) if rows.len() == limit => {
                KeyRange::new(range.begin.clone(), KeyRange::single_key(last).end)
            }
            _ => range.clone(),
        };
        if !conflict.is_empty() {
            self.read_ranges.lock().push(conflict);
        }
        StoreCounters::bump(&self.shared.counters.range_reads);
        Ok(rows)
    }

    fn set(&mut self, key: Key, value: Value) {
        self.writes.insert(key, value);
    }

    fn add_read_conflict_range(&mut self, range: KeyRange) {
        self.read_ranges.get_mut().push(range);
    }

    fn add_write_conflict_range(&mut self, range: KeyRange) {
        self.write_ranges.push(range);
    }

    async fn commit(&mut self) -> StoreResult<Version> {
        self.ensure_active()?;

        let fault = self.shared.faults.lock().pop_front();
        if let Some(error) = fault {
            StoreCounters::bump(&self.shared.counters.injected_faults);
            self.status = TransactionStatus::Aborted {
                reason: format!("injected fault: {}", error),
            };
            return Err(error);
        }

        simulate_latency(self.shared.config.commit_latency).await;

        let fetched = *self.read_version.get_mut();
        let read_version = fetched.unwrap_or_else(|| self.shared.manager.current_version());

        let mut write_ranges: Vec<KeyRange> =
            self.writes.keys().map(|k| KeyRange::single_key(k)).collect();
        write_ranges.append(&mut self.write_ranges);

        let request = CommitRequest {
            read_version,
            read_ranges: std::mem::take(self.read_ranges.get_mut()),
            write_ranges,
        };
        let read_only = request.is_read_only();
        let writes = std::mem::take(&mut self.writes);
        let prune_below = Version(
            read_version
                .0
                .max(self.shared.manager.current_version().0)
                .saturating_sub(self.shared.config.mvcc_window),
        );

        let shared = &self.shared;
        match shared
            .manager
            .commit(request, |version| shared.data.apply(version, writes, prune_below))
        {
            Ok(version) => {
                let counter = if read_only {
                    &shared.counters.read_only_commits
                } else {
                    &shared.counters.commits
                };
                StoreCounters::bump(counter);
                trace!(
                    target: "rwbench::store",
                    txn_id = self.txn_id,
                    version = version.0,
                    debug_id = ?self.debug_id,
                    "Transaction committed"
                );
                self.status = TransactionStatus::Committed { version };
                Ok(version)
            }
            Err(e) => {
                let error = StoreError::from(e);
                match error {
                    StoreError::NotCommitted => StoreCounters::bump(&shared.counters.conflicts),
                    StoreError::TransactionTooOld => StoreCounters::bump(&shared.counters.too_old),
                    _ => {}
                }
                self.status = TransactionStatus::Aborted {
                    reason: error.to_string(),
                };
                Err(error)
            }
        }
    }

    async fn on_error(&mut self, error: StoreError) -> StoreResult<()> {
        if !error.is_retryable() {
            debug!(
                target: "rwbench::store",
                txn_id = self.txn_id,
                code = error.code(),
                "Fatal error, not retrying"
            );
            return Err(error);
        }

        let delay = self.shared.config.retry.calculate_delay(self.retries);
        self.retries = self.retries.saturating_add(1);
        simulate_latency(delay).await;

        self.reset();
        StoreCounters::bump(&self.shared.counters.resets);
        Ok(())
    }

    fn debug_transaction(&mut self, id: Uuid) {
        self.debug_id = Some(id);
    }
}
