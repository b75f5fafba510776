//! Shared read-version cache
//!
//! With inconsistent reads enabled, clients do not each ask the store for a
//! read version. One fetch runs at a time; its result is published through a
//! `watch` channel, and callers that arrive while a previous result exists
//! take that result immediately. Staleness is therefore bounded by one fetch.
//!
//! This is deliberately not linearizable: concurrent callers may see the
//! same version although time has moved on.

use parking_lot::Mutex;
use rwbench_core::{KvStore, StoreError, StoreResult, Transaction, Version};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

type FetchSlot = watch::Receiver<Option<StoreResult<Version>>>;

#[derive(Default)]
struct CacheState {
    last: Option<Version>,
    in_flight: Option<FetchSlot>,
    task: Option<JoinHandle<()>>,
}

/// Single-flight, staleness-bounded read-version source
pub struct VersionCache<S: KvStore> {
    store: Arc<S>,
    state: Mutex<CacheState>,
    fetches: AtomicU64,
}

impl<S: KvStore> VersionCache<S> {
    /// Create a cache fetching from `store`
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            state: Mutex::new(CacheState::default()),
            fetches: AtomicU64::new(0),
        }
    }

    /// Number of fetches started so far
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    /// Last completed fetch result adopted by the cache
    pub fn last_version(&self) -> Option<Version> {
        self.state.lock().last
    }

    /// Read version for `txn`
    ///
    /// `consistent` asks the transaction itself. Otherwise the shared cache
    /// answers: a new fetch starts unless one is still outstanding, the last
    /// completed version is returned if there is one, and only the very first
    /// callers wait for a fetch.
    pub async fn get_version(
        &self,
        consistent: bool,
        txn: &mut S::Transaction,
    ) -> StoreResult<Version> {
        if consistent {
            return txn.get_read_version().await;
        }

        let mut pending = {
            let mut state = self.state.lock();
            let finished = state
                .in_flight
                .as_ref()
                .map(|slot| slot.borrow().clone());
            match finished {
                // A fetch is still outstanding
                Some(None) => {}
                completed => {
                    if let Some(Some(Ok(version))) = completed {
                        state.last = Some(version);
                    }
                    let (slot, task) = self.spawn_fetch();
                    state.in_flight = Some(slot);
                    state.task = Some(task);
                }
            }
            if let Some(version) = state.last {
                return Ok(version);
            }
            match state.in_flight.clone() {
                Some(slot) => slot,
                None => return Err(StoreError::Internal("version fetch not started".to_string())),
            }
        };

        let outcome = pending
            .wait_for(Option::is_some)
            .await
            .map(|published| published.clone());
        match outcome {
            Ok(Some(result)) => result,
            _ => Err(StoreError::Internal(
                "read version fetch ended without a result".to_string(),
            )),
        }
    }

    /// Abort an outstanding fetch
    ///
    /// The next inconsistent caller starts a fresh one.
    pub fn cancel_fetch(&self) {
        let mut state = self.state.lock();
        if let Some(task) = state.task.take() {
            if !task.is_finished() {
                task.abort();
                state.in_flight = None;
                trace!(target: "rwbench::client", "Shared read version fetch cancelled");
            }
        }
    }

    fn spawn_fetch(&self) -> (FetchSlot, JoinHandle<()>) {
        let (tx, rx) = watch::channel(None);
        let fetch_no = self.fetches.fetch_add(1, Ordering::Relaxed) + 1;
        let store = Arc::clone(&self.store);
        let task = tokio::spawn(async move {
            let result = fetch_read_version(store.as_ref()).await;
            trace!(
                target: "rwbench::client",
                fetch = fetch_no,
                version = ?result.as_ref().ok(),
                "Shared read version fetched"
            );
            let _ = tx.send(Some(result));
        });
        (rx, task)
    }
}

impl<S: KvStore> Drop for VersionCache<S> {
    fn drop(&mut self) {
        if let Some(task) = self.state.get_mut().task.take() {
            task.abort();
        }
    }
}

/// Fetch a read version, retrying through `on_error`
async fn fetch_read_version<S: KvStore>(store: &S) -> StoreResult<Version> {
    let mut txn = store.begin_transaction();
    loop {
        match txn.get_read_version().await {
            Ok(version) => return Ok(version),
            Err(e) => txn.on_error(e).await?,
        }
    }
}
