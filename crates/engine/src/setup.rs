//! Bulk loader
//!
//! Writes every record once before the run, in batches of
//! `load_batch_size` sets per transaction. A failed batch is retried
//! through `on_error`, with fresh values.

use crate::context::WorkloadContext;
use crate::error::BenchResult;
use rwbench_core::{KvStore, Transaction};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// What a load wrote
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadReport {
    /// Records written
    pub records: u64,
    /// Committed batches
    pub batches: u64,
    /// Retried batch commits
    pub retries: u64,
    /// Wall time of the load
    pub elapsed: Duration,
}

/// Loads `0..record_count` into the store
pub struct BulkLoader<'a, S: KvStore> {
    ctx: &'a WorkloadContext<S>,
}

impl<'a, S: KvStore> BulkLoader<'a, S> {
    /// Loader for the store and keyspace of `ctx`
    pub fn new(ctx: &'a WorkloadContext<S>) -> Self {
        Self { ctx }
    }

    /// Write every record
    pub async fn load(&self) -> BenchResult<LoadReport> {
        let started = Instant::now();
        let record_count = self.ctx.keys().record_count();
        let batch_size = self.ctx.config().load_batch_size.max(1) as u64;

        let mut batches = 0u64;
        let mut retries = 0u64;
        let mut begin = 0u64;
        while begin < record_count {
            let end = (begin + batch_size).min(record_count);
            retries += self.load_batch(begin, end).await?;
            batches += 1;
            debug!(target: "rwbench::driver", begin, end, "Loaded batch");
            begin = end;
        }

        let report = LoadReport {
            records: record_count,
            batches,
            retries,
            elapsed: started.elapsed(),
        };
        info!(
            target: "rwbench::driver",
            records = report.records,
            batches = report.batches,
            retries = report.retries,
            seconds = report.elapsed.as_secs_f64(),
            "Bulk load finished"
        );
        Ok(report)
    }

    /// Write `begin..end` in one transaction; returns the retries it took
    async fn load_batch(&self, begin: u64, end: u64) -> BenchResult<u64> {
        let keys = self.ctx.keys();
        let mut txn = self.ctx.store().begin_transaction();
        let mut retries = 0;
        loop {
            for index in begin..end {
                txn.set(keys.key_for(index), self.ctx.random_value());
            }
            match txn.commit().await {
                Ok(_) => return Ok(retries),
                Err(e) => {
                    txn.on_error(e).await?;
                    retries += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkloadConfig;
    use rwbench_concurrency::{MemoryStore, MemoryStoreConfig, RetryConfig};
    use rwbench_core::StoreError;
    use std::sync::Arc;

    fn context(
        store: &MemoryStore,
        record_count: u64,
        batch: usize,
    ) -> WorkloadContext<MemoryStore> {
        WorkloadContext::new(
            WorkloadConfig {
                record_count,
                load_batch_size: batch,
                seed: Some(2),
                ..Default::default()
            },
            Arc::new(store.clone()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_loads_every_record() {
        let store = MemoryStore::default();
        let ctx = context(&store, 250, 100);

        let report = BulkLoader::new(&ctx).load().await.unwrap();
        assert_eq!(report.records, 250);
        assert_eq!(report.batches, 3);
        assert_eq!(report.retries, 0);
        assert_eq!(store.key_count(), 250);
        assert!(store.read_latest(&ctx.keys().key_for(249)).is_some());
    }

    #[tokio::test]
    async fn test_failed_batch_is_retried() {
        let store =
            MemoryStore::new(MemoryStoreConfig::default().with_retry(RetryConfig::no_backoff()));
        store.inject_commit_fault(StoreError::NotCommitted);
        let ctx = context(&store, 10, 4);

        let report = BulkLoader::new(&ctx).load().await.unwrap();
        assert_eq!(report.batches, 3);
        assert_eq!(report.retries, 1);
        assert_eq!(store.key_count(), 10);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_load() {
        let store = MemoryStore::default();
        store.inject_commit_fault(StoreError::InvalidOperation("read only".to_string()));
        let ctx = context(&store, 10, 4);

        assert!(BulkLoader::new(&ctx).load().await.is_err());
        assert_eq!(store.key_count(), 0);
    }
}
