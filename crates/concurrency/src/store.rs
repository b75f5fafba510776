//! In-memory multi-version store
//!
//! `MemoryStore` is a cheaply clonable handle over shared state:
//! - a [`TransactionManager`] (commit clock and conflict history)
//! - versioned rows, each key holding its recent `(version, value)` pairs
//! - a queue of injected commit faults
//! - observational counters
//!
//! Latencies for read-version requests, reads and commits are simulated with
//! `tokio::time::sleep`, so paused-time tests control them exactly.

use crate::manager::TransactionManager;
use crate::retry::RetryConfig;
use crate::transaction::MemoryTransaction;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rwbench_core::{Key, KeyRange, KvStore, StoreError, StoreResult, Value, Version};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Configuration for [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStoreConfig {
    /// Simulated latency of a read-version request
    pub grv_latency: Duration,
    /// Simulated latency of each point or range read
    pub read_latency: Duration,
    /// Simulated latency of a commit
    pub commit_latency: Duration,
    /// Number of versions a read version stays usable for
    pub mvcc_window: u64,
    /// Backoff used by `on_error`
    pub retry: RetryConfig,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            grv_latency: Duration::ZERO,
            read_latency: Duration::ZERO,
            commit_latency: Duration::ZERO,
            mvcc_window: 100_000,
            retry: RetryConfig::default(),
        }
    }
}

impl MemoryStoreConfig {
    /// Set the simulated read-version latency
    pub fn with_grv_latency(mut self, latency: Duration) -> Self {
        self.grv_latency = latency;
        self
    }

    /// Set the simulated read latency
    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = latency;
        self
    }

    /// Set the simulated commit latency
    pub fn with_commit_latency(mut self, latency: Duration) -> Self {
        self.commit_latency = latency;
        self
    }

    /// Set the MVCC window in versions
    pub fn with_mvcc_window(mut self, versions: u64) -> Self {
        self.mvcc_window = versions;
        self
    }

    /// Set the `on_error` backoff
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Snapshot of store counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Read versions served
    pub read_versions: u64,
    /// Point reads served
    pub reads: u64,
    /// Range reads served
    pub range_reads: u64,
    /// Transactions committed with writes
    pub commits: u64,
    /// Read-only transactions committed
    pub read_only_commits: u64,
    /// Commits rejected by conflict detection
    pub conflicts: u64,
    /// Reads or commits rejected as too old
    pub too_old: u64,
    /// Commits failed by an injected fault
    pub injected_faults: u64,
    /// Transactions reset by `on_error`
    pub resets: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StoreCounters {
    pub(crate) read_versions: AtomicU64,
    pub(crate) reads: AtomicU64,
    pub(crate) range_reads: AtomicU64,
    pub(crate) commits: AtomicU64,
    pub(crate) read_only_commits: AtomicU64,
    pub(crate) conflicts: AtomicU64,
    pub(crate) too_old: AtomicU64,
    pub(crate) injected_faults: AtomicU64,
    pub(crate) resets: AtomicU64,
}

impl StoreCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> StoreStats {
        StoreStats {
            read_versions: self.read_versions.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            range_reads: self.range_reads.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            read_only_commits: self.read_only_commits.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            too_old: self.too_old.load(Ordering::Relaxed),
            injected_faults: self.injected_faults.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
        }
    }
}

/// Rows with their recent versions, oldest first per key
#[derive(Debug, Default)]
pub(crate) struct VersionedData {
    rows: RwLock<BTreeMap<Key, Vec<(Version, Value)>>>,
}

impl VersionedData {
    fn visible(versions: &[(Version, Value)], at: Version) -> Option<&Value> {
        versions
            .iter()
            .rev()
            .find(|(version, _)| *version <= at)
            .map(|(_, value)| value)
    }

    pub(crate) fn get_at(&self, key: &[u8], at: Version) -> Option<Value> {
        let rows = self.rows.read();
        rows.get(key)
            .and_then(|versions| Self::visible(versions, at))
            .cloned()
    }

    pub(crate) fn range_at(
        &self,
        range: &KeyRange,
        at: Version,
        limit: usize,
    ) -> Vec<(Key, Value)> {
        if range.is_empty() {
            return Vec::new();
        }
        let rows = self.rows.read();
        rows.range(range.begin.clone()..range.end.clone())
            .filter_map(|(key, versions)| {
                Self::visible(versions, at).map(|value| (key.clone(), value.clone()))
            })
            .take(limit)
            .collect()
    }

    /// Install `writes` at `version`, dropping versions no reader at or
    /// after `prune_below` can see
    pub(crate) fn apply(
        &self,
        version: Version,
        writes: BTreeMap<Key, Value>,
        prune_below: Version,
    ) {
        let mut rows = self.rows.write();
        for (key, value) in writes {
            let versions = rows.entry(key).or_default();
            versions.push((version, value));
            let keep_from = versions
                .iter()
                .rposition(|(v, _)| *v <= prune_below)
                .unwrap_or(0);
            versions.drain(..keep_from);
        }
    }

    fn len(&self) -> usize {
        self.rows.read().len()
    }
}

/// State shared by a store and all its transactions
pub(crate) struct StoreShared {
    pub(crate) config: MemoryStoreConfig,
    pub(crate) manager: TransactionManager,
    pub(crate) data: VersionedData,
    pub(crate) faults: Mutex<VecDeque<StoreError>>,
    pub(crate) counters: StoreCounters,
}

pub(crate) async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

/// In-memory transactional store
///
/// # Example
/// ```ignore
/// let store = MemoryStore::new(MemoryStoreConfig::default());
/// let mut txn = store.begin_transaction();
/// txn.set(b"k".to_vec(), b"v".to_vec());
/// txn.commit().await?;
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<StoreShared>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new(config: MemoryStoreConfig) -> Self {
        let manager = TransactionManager::new(0, config.mvcc_window);
        Self {
            shared: Arc::new(StoreShared {
                config,
                manager,
                data: VersionedData::default(),
                faults: Mutex::new(VecDeque::new()),
                counters: StoreCounters::default(),
            }),
        }
    }

    /// Store configuration
    pub fn config(&self) -> &MemoryStoreConfig {
        &self.shared.config
    }

    /// Make the next commit that would otherwise run fail with `error`
    ///
    /// Faults queue up; each commit consumes at most one.
    pub fn inject_commit_fault(&self, error: StoreError) {
        self.shared.faults.lock().push_back(error);
    }

    /// Number of injected faults not yet consumed
    pub fn pending_faults(&self) -> usize {
        self.shared.faults.lock().len()
    }

    /// Latest committed value of `key`
    pub fn read_latest(&self, key: &[u8]) -> Option<Value> {
        self.shared
            .data
            .get_at(key, self.shared.manager.current_version())
    }

    /// Number of keys ever written
    pub fn key_count(&self) -> usize {
        self.shared.data.len()
    }

    /// Latest committed version
    pub fn current_version(&self) -> Version {
        self.shared.manager.current_version()
    }

    /// Counter snapshot
    pub fn stats(&self) -> StoreStats {
        self.shared.counters.snapshot()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryStoreConfig::default())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("version", &self.current_version())
            .field("config", &self.shared.config)
            .finish()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    type Transaction = MemoryTransaction;

    fn begin_transaction(&self) -> MemoryTransaction {
        MemoryTransaction::new(Arc::clone(&self.shared))
    }

    async fn warm_range(&self, range: &KeyRange) -> StoreResult<()> {
        debug!(
            target: "rwbench::store",
            begin = ?range.begin,
            end = ?range.end,
            "Warm range requested"
        );
        Ok(())
    }
}
