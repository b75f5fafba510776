//! Concurrent/Multi-threaded Tests for rwbench-concurrency
//!
//! These tests verify correct behavior under actual concurrent execution:
//!
//! 1. **Commit Lock** - validation and apply happen under one lock
//! 2. **Version Monotonicity** - versions always increase under load
//! 3. **First-Committer-Wins** - conflict detection works with real races
//! 4. **Store Tasks** - many tokio tasks sharing one `MemoryStore`
//!
//! ## Running These Tests
//!
//! ```bash
//! cargo test --test concurrent_tests
//! ```

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use rwbench_concurrency::{
    CommitRequest, MemoryStore, MemoryStoreConfig, RetryConfig, TransactionManager,
};
use rwbench_core::{KeyRange, KvStore, StoreError, Transaction, Version};

// ============================================================================
// Test Helpers
// ============================================================================

fn read_write_request(read_version: Version, key: &[u8]) -> CommitRequest {
    CommitRequest {
        read_version,
        read_ranges: vec![KeyRange::single_key(key)],
        write_ranges: vec![KeyRange::single_key(key)],
    }
}

fn fast_store() -> MemoryStore {
    MemoryStore::new(MemoryStoreConfig::default().with_retry(RetryConfig::no_backoff()))
}

// ============================================================================
// SECTION 1: Commit Lock Tests
// ============================================================================

mod commit_lock {
    use super::*;

    /// Two transactions validated against the same read version: exactly one
    /// may commit.
    #[test]
    fn test_commit_lock_prevents_double_commit() {
        let manager = Arc::new(TransactionManager::new(0, 1000));
        let barrier = Arc::new(Barrier::new(2));
        let success_count = Arc::new(AtomicUsize::new(0));
        let failure_count = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let barrier = Arc::clone(&barrier);
                let success_count = Arc::clone(&success_count);
                let failure_count = Arc::clone(&failure_count);

                thread::spawn(move || {
                    let request = read_write_request(Version(0), b"contested");
                    barrier.wait();
                    match manager.commit(request, |_| {}) {
                        Ok(_) => success_count.fetch_add(1, Ordering::SeqCst),
                        Err(_) => failure_count.fetch_add(1, Ordering::SeqCst),
                    };
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(success_count.load(Ordering::SeqCst), 1, "Exactly one commit should succeed");
        assert_eq!(failure_count.load(Ordering::SeqCst), 1, "Exactly one commit should fail");
        assert_eq!(manager.current_version(), Version(1));
    }

    /// Apply runs only for validated commits, each with a distinct version
    #[test]
    fn test_apply_runs_once_per_successful_commit() {
        let manager = Arc::new(TransactionManager::new(0, 1000));
        let applied = Arc::new(Mutex::new(Vec::new()));
        let num_threads = 10;
        let barrier = Arc::new(Barrier::new(num_threads));

        let handles: Vec<_> = (0..num_threads)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let applied = Arc::clone(&applied);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let request = read_write_request(Version(0), b"atomic_test");
                    barrier.wait();
                    let _ = manager.commit(request, |v| applied.lock().push(v));
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(applied.lock().as_slice(), &[Version(1)]);
    }
}

// ============================================================================
// SECTION 2: Version Monotonicity Tests
// ============================================================================

mod version_monotonicity {
    use super::*;

    #[test]
    fn test_blind_writers_get_unique_increasing_versions() {
        let manager = Arc::new(TransactionManager::new(0, 1000));
        let num_threads = 8;
        let per_thread = 50;

        let handles: Vec<_> = (0..num_threads)
            .map(|t| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    let mut versions = Vec::with_capacity(per_thread);
                    for i in 0..per_thread {
                        let key = format!("t{}-k{}", t, i);
                        let request = CommitRequest {
                            read_version: manager.current_version(),
                            read_ranges: Vec::new(),
                            write_ranges: vec![KeyRange::single_key(key.as_bytes())],
                        };
                        versions.push(manager.commit(request, |_| {}).unwrap());
                    }
                    versions
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            let versions = handle.join().unwrap();
            assert!(versions.windows(2).all(|w| w[0] < w[1]), "Per-thread versions must increase");
            all.extend(versions);
        }

        assert_eq!(all.len(), num_threads * per_thread);
        assert_eq!(manager.current_version(), Version((num_threads * per_thread) as u64));
    }
}

// ============================================================================
// SECTION 3: Store Tasks
// ============================================================================

mod store_tasks {
    use super::*;

    /// Read-modify-write increments from many tasks, retried through
    /// `on_error`, never lose an update
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_counter_increments_are_serializable() {
        let store = fast_store();
        let tasks = 8;
        let per_task = 25;

        let handles: Vec<_> = (0..tasks)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    for _ in 0..per_task {
                        let mut txn = store.begin_transaction();
                        loop {
                            let result: Result<Version, StoreError> = async {
                                let current = txn
                                    .get(b"counter")
                                    .await?
                                    .map(|v| u64::from_be_bytes(v.try_into().unwrap()))
                                    .unwrap_or(0);
                                txn.set(b"counter".to_vec(), (current + 1).to_be_bytes().to_vec());
                                txn.commit().await
                            }
                            .await;
                            match result {
                                Ok(_) => break,
                                Err(e) => txn.on_error(e).await.unwrap(),
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        let value = store.read_latest(b"counter").unwrap();
        assert_eq!(u64::from_be_bytes(value.try_into().unwrap()), (tasks * per_task) as u64);
        let stats = store.stats();
        assert_eq!(stats.commits, (tasks * per_task) as u64);
        assert_eq!(stats.resets, stats.conflicts);
    }
}
