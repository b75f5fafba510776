//! Transaction attempts
//!
//! An attempt is one logical benchmark transaction. It draws its plan once
//! (mix, read keys, values, extra conflict ranges), then tries until the
//! store accepts it:
//!
//! ```text
//! read version -> reads -> [writes + extra ranges -> commit] -> done
//!       ^                                                 |
//!       +------------- on_error (backoff, reset) <--------+
//! ```
//!
//! Recoverable errors go through [`Transaction::on_error`], which backs off
//! and resets the transaction, so nothing of a failed try survives. Write
//! keys are drawn again on every try. An error `on_error` refuses to retry
//! ends the attempt with [`BenchError::Store`].
//!
//! Samples are attributed by attempt start: an attempt that began outside
//! the metrics window records nothing, however long it runs.

use crate::context::WorkloadContext;
use crate::error::BenchResult;
use crate::latency::LatencyKind;
use crate::ramp::MixKind;
use futures::future::try_join_all;
use rand::Rng;
use rwbench_core::{KeyRange, KvStore, StoreResult, Transaction, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};
use uuid::Uuid;

/// Everything an attempt decides before its first try
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptPlan {
    /// Selected mix
    pub mix: MixKind,
    /// Indices read on every try
    pub read_indices: Vec<u64>,
    /// One value per write
    pub values: Vec<Value>,
    /// Extra read conflict ranges (writing transactions only)
    pub extra_read_ranges: Vec<KeyRange>,
    /// Extra write conflict ranges (writing transactions only)
    pub extra_write_ranges: Vec<KeyRange>,
}

impl AttemptPlan {
    /// Draw a plan for an attempt starting `elapsed` seconds into the run
    pub fn build<S: KvStore>(ctx: &WorkloadContext<S>, elapsed: f64) -> Self {
        let config = ctx.config();
        let u: f64 = ctx.with_rng(|rng| rng.gen());
        let mix = ctx.ramp().choose_mix(u, elapsed);
        let (reads, writes) = match mix {
            MixKind::A => (config.reads_per_transaction_a, config.writes_per_transaction_a),
            MixKind::B => (config.reads_per_transaction_b, config.writes_per_transaction_b),
        };

        let read_indices = ctx.with_rng(|rng| {
            ctx.keys().sample_indices(rng, reads, config.adjacent_reads)
        });
        let values = (0..writes).map(|_| ctx.random_value()).collect();

        let (extra_reads, extra_writes) = if writes > 0 {
            (config.extra_read_conflict_ranges, config.extra_write_conflict_ranges)
        } else {
            (0, 0)
        };
        let unique_range = |_| KeyRange::single_key(Uuid::new_v4().to_string().as_bytes());

        Self {
            mix,
            read_indices,
            values,
            extra_read_ranges: (0..extra_reads).map(unique_range).collect(),
            extra_write_ranges: (0..extra_writes).map(unique_range).collect(),
        }
    }

    /// Reads per try
    pub fn read_count(&self) -> usize {
        self.read_indices.len()
    }

    /// Writes per try
    pub fn write_count(&self) -> usize {
        self.values.len()
    }

    /// True if the plan neither reads nor writes
    pub fn is_noop(&self) -> bool {
        self.read_indices.is_empty() && self.values.is_empty()
    }
}

/// Result of a successful attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttemptOutcome {
    /// Mix the attempt ran
    pub mix: MixKind,
    /// Recoverable errors before success
    pub retries: u32,
    /// Attempt start to completion
    pub latency: Duration,
    /// Whether the attempt counted towards reported metrics
    pub recorded: bool,
}

/// Phase latencies of the latest try
#[derive(Debug, Default, Clone, Copy)]
struct TryTimings {
    read_version: Option<Duration>,
    commit: Option<Duration>,
}

fn nanos(latency: Option<Duration>) -> i64 {
    latency.map_or(-1, |l| l.as_nanos() as i64)
}

/// One logical transaction, retried until it succeeds
pub struct TransactionAttempt<'a, S: KvStore> {
    ctx: &'a WorkloadContext<S>,
    plan: AttemptPlan,
    start: Instant,
    record: bool,
    debug_id: Option<Uuid>,
}

impl<'a, S: KvStore> TransactionAttempt<'a, S> {
    /// Start an attempt now
    pub fn new(ctx: &'a WorkloadContext<S>) -> Self {
        let start = Instant::now();
        let plan = AttemptPlan::build(ctx, ctx.elapsed_at(start));
        Self::with_plan(ctx, plan, start)
    }

    /// Start an attempt with a prepared plan
    pub fn with_plan(ctx: &'a WorkloadContext<S>, plan: AttemptPlan, start: Instant) -> Self {
        let debug_id = ctx.in_debug_interval(start).then(Uuid::new_v4);
        Self {
            record: ctx.should_record(start),
            ctx,
            plan,
            start,
            debug_id,
        }
    }

    /// The plan this attempt executes
    pub fn plan(&self) -> &AttemptPlan {
        &self.plan
    }

    /// Run tries until one succeeds or the store reports a fatal error
    pub async fn run(self) -> BenchResult<AttemptOutcome> {
        let mut retries = 0u32;
        let mut timings = TryTimings::default();

        if !self.plan.is_noop() {
            let mut txn = self.ctx.store().begin_transaction();
            if let Some(id) = self.debug_id {
                txn.debug_transaction(id);
                debug!(target: "rwbench::txn", debug_id = %id, "attempt.before");
            }

            loop {
                let try_start = Instant::now();
                timings = TryTimings::default();
                match self.try_once(&mut txn, &mut timings).await {
                    Ok(()) => break,
                    Err(error) => {
                        debug!(
                            target: "rwbench::txn",
                            error_code = error.code(),
                            read_version_latency_ns = nanos(timings.read_version),
                            "Transaction try failed"
                        );
                        if self.record {
                            self.ctx
                                .latencies()
                                .record(LatencyKind::Failure, try_start.elapsed());
                        }
                        txn.on_error(error).await?;
                        retries += 1;
                        self.ctx.counters().record_retry(self.record);
                    }
                }
            }

            if let Some(id) = self.debug_id {
                debug!(target: "rwbench::txn", debug_id = %id, "attempt.after");
            }
        }

        let latency = self.start.elapsed();
        debug!(
            target: "rwbench::txn",
            mix = ?self.plan.mix,
            total_latency_ns = latency.as_nanos() as u64,
            read_version_latency_ns = nanos(timings.read_version),
            commit_latency_ns = nanos(timings.commit),
            retries,
            "Transaction succeeded"
        );

        if self.record {
            self.ctx.counters().record_transaction(self.plan.mix.is_a());
            self.ctx.latencies().record(LatencyKind::Total, latency);
        }

        Ok(AttemptOutcome {
            mix: self.plan.mix,
            retries,
            latency,
            recorded: self.record,
        })
    }

    async fn try_once(
        &self,
        txn: &mut S::Transaction,
        timings: &mut TryTimings,
    ) -> StoreResult<()> {
        let config = self.ctx.config();
        let latencies = self.ctx.latencies();

        let grv_start = Instant::now();
        let consistent = !config.inconsistent_reads;
        let version = self.ctx.version_cache().get_version(consistent, txn).await?;
        if !consistent {
            txn.set_read_version(version);
        }
        let grv_latency = grv_start.elapsed();
        timings.read_version = Some(grv_latency);
        if self.record {
            latencies.record(LatencyKind::ReadVersion, grv_latency);
        }

        let read_start = Instant::now();
        self.read_keys(txn).await?;
        if self.record {
            latencies.record(LatencyKind::FullRead, read_start.elapsed());
        }

        let writes = self.plan.write_count();
        if writes == 0 {
            return Ok(());
        }

        let keys = self.ctx.keys();
        let write_indices = self
            .ctx
            .with_rng(|rng| keys.sample_indices(rng, writes, config.adjacent_writes));
        for (index, value) in write_indices.into_iter().zip(&self.plan.values) {
            txn.set(keys.key_for(index), value.clone());
        }
        for range in &self.plan.extra_read_ranges {
            txn.add_read_conflict_range(range.clone());
        }
        for range in &self.plan.extra_write_ranges {
            txn.add_write_conflict_range(range.clone());
        }

        let commit_start = Instant::now();
        txn.commit().await?;
        let commit_latency = commit_start.elapsed();
        timings.commit = Some(commit_latency);
        if self.record {
            latencies.record(LatencyKind::Commit, commit_latency);
        }
        Ok(())
    }

    async fn read_keys(&self, txn: &S::Transaction) -> StoreResult<()> {
        if self.ctx.config().dependent_reads {
            for &index in &self.plan.read_indices {
                self.read_one(txn, index).await?;
            }
        } else {
            try_join_all(
                self.plan
                    .read_indices
                    .iter()
                    .map(|&index| self.read_one(txn, index)),
            )
            .await?;
        }
        Ok(())
    }

    async fn read_one(&self, txn: &S::Transaction, index: u64) -> StoreResult<()> {
        self.ctx.counters().record_read();
        let keys = self.ctx.keys();
        let begin = Instant::now();
        if self.ctx.config().range_reads {
            txn.get_range(&keys.range_for(index), self.ctx.config().range_read_limit)
                .await?;
        } else {
            txn.get(&keys.key_for(index)).await?;
        }
        let latency = begin.elapsed();
        trace!(
            target: "rwbench::txn",
            index,
            read_latency_ns = latency.as_nanos() as u64,
            "Read completed"
        );
        if self.record {
            self.ctx.latencies().record(LatencyKind::RowRead, latency);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkloadConfig;
    use rwbench_concurrency::{MemoryStore, MemoryStoreConfig, RetryConfig};
    use rwbench_core::StoreError;
    use std::sync::Arc;

    fn context(config: WorkloadConfig, store: MemoryStore) -> WorkloadContext<MemoryStore> {
        WorkloadContext::new(
            WorkloadConfig {
                seed: Some(5),
                discard_edge_measurements: false,
                record_count: 100,
                ..config
            },
            Arc::new(store),
        )
        .unwrap()
    }

    fn quiet_store() -> MemoryStore {
        MemoryStore::new(MemoryStoreConfig::default().with_retry(RetryConfig::no_backoff()))
    }

    #[test]
    fn test_plan_follows_mix() {
        let ctx = context(
            WorkloadConfig {
                alpha: 0.0,
                extra_read_conflict_ranges: 2,
                ..Default::default()
            },
            quiet_store(),
        );
        // alpha 0: always mix A, which is read-only by default
        let plan = AttemptPlan::build(&ctx, 0.0);
        assert_eq!(plan.mix, MixKind::A);
        assert_eq!(plan.read_count(), 10);
        assert_eq!(plan.write_count(), 0);
        assert!(plan.extra_read_ranges.is_empty());
    }

    #[test]
    fn test_writing_plan_carries_extra_ranges() {
        let ctx = context(
            WorkloadConfig {
                alpha: 1.0,
                extra_read_conflict_ranges: 2,
                extra_write_conflict_ranges: 3,
                ..Default::default()
            },
            quiet_store(),
        );
        let plan = AttemptPlan::build(&ctx, 0.0);
        assert_eq!(plan.mix, MixKind::B);
        assert_eq!(plan.read_count(), 1);
        assert_eq!(plan.write_count(), 9);
        assert_eq!(plan.extra_read_ranges.len(), 2);
        assert_eq!(plan.extra_write_ranges.len(), 3);
        assert_ne!(plan.extra_write_ranges[0], plan.extra_write_ranges[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_only_attempt_skips_commit() {
        let store = quiet_store();
        let ctx = context(
            WorkloadConfig {
                alpha: 0.0,
                metrics_start: 0.0,
                ..Default::default()
            },
            store.clone(),
        );
        ctx.mark_client_begin();

        let outcome = TransactionAttempt::new(&ctx).run().await.unwrap();
        assert_eq!(outcome.mix, MixKind::A);
        assert_eq!(outcome.retries, 0);
        assert!(outcome.recorded);

        let stats = store.stats();
        assert_eq!(stats.reads, 10);
        assert_eq!(stats.commits, 0);
        assert_eq!(ctx.latencies().count(LatencyKind::RowRead), 10);
        assert_eq!(ctx.latencies().count(LatencyKind::FullRead), 1);
        assert_eq!(ctx.latencies().count(LatencyKind::Commit), 0);
        assert_eq!(ctx.counters().snapshot().a_transactions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writing_attempt_commits_values() {
        let store = quiet_store();
        let ctx = context(
            WorkloadConfig {
                alpha: 1.0,
                adjacent_writes: true,
                ..Default::default()
            },
            store.clone(),
        );
        ctx.mark_client_begin();

        let outcome = TransactionAttempt::new(&ctx).run().await.unwrap();
        assert_eq!(outcome.mix, MixKind::B);
        assert_eq!(store.stats().commits, 1);
        assert_eq!(store.key_count(), 9);
        assert_eq!(ctx.latencies().count(LatencyKind::Commit), 1);
        assert_eq!(ctx.counters().snapshot().b_transactions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_counted_once_each() {
        let store = quiet_store();
        store.inject_commit_fault(StoreError::NotCommitted);
        store.inject_commit_fault(StoreError::TimedOut);
        store.inject_commit_fault(StoreError::NotCommitted);
        let ctx = context(
            WorkloadConfig {
                alpha: 1.0,
                ..Default::default()
            },
            store.clone(),
        );
        ctx.mark_client_begin();

        let outcome = TransactionAttempt::new(&ctx).run().await.unwrap();
        assert_eq!(outcome.retries, 3);

        let snap = ctx.counters().snapshot();
        assert_eq!(snap.retries, 3);
        assert_eq!(snap.total_retries, 3);
        assert_eq!(snap.b_transactions, 1);
        assert_eq!(ctx.latencies().count(LatencyKind::Total), 1);
        assert_eq!(ctx.latencies().count(LatencyKind::Failure), 3);
        assert_eq!(ctx.latencies().count(LatencyKind::Commit), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_ends_attempt() {
        let store = quiet_store();
        store.inject_commit_fault(StoreError::Internal("disk on fire".to_string()));
        let ctx = context(
            WorkloadConfig {
                alpha: 1.0,
                ..Default::default()
            },
            store,
        );
        ctx.mark_client_begin();

        let err = TransactionAttempt::new(&ctx).run().await.unwrap_err();
        assert!(err.to_string().contains("disk on fire"));
        assert_eq!(ctx.counters().snapshot().b_transactions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_noop_plan_never_touches_store() {
        let store = quiet_store();
        let ctx = context(
            WorkloadConfig {
                reads_per_transaction_a: 0,
                alpha: 0.0,
                ..Default::default()
            },
            store.clone(),
        );
        ctx.mark_client_begin();

        let outcome = TransactionAttempt::new(&ctx).run().await.unwrap();
        assert_eq!(outcome.retries, 0);
        assert_eq!(store.stats().read_versions, 0);
        assert_eq!(ctx.counters().snapshot().a_transactions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_outside_window_records_nothing() {
        let store = quiet_store();
        store.inject_commit_fault(StoreError::NotCommitted);
        let ctx = context(
            WorkloadConfig {
                alpha: 1.0,
                metrics_start: 5.0,
                ..Default::default()
            },
            store,
        );
        ctx.mark_client_begin();

        let outcome = TransactionAttempt::new(&ctx).run().await.unwrap();
        assert!(!outcome.recorded);
        assert_eq!(outcome.retries, 1);
        for kind in LatencyKind::ALL {
            assert_eq!(ctx.latencies().count(kind), 0, "{:?}", kind);
        }
        let snap = ctx.counters().snapshot();
        assert_eq!(snap.b_transactions, 0);
        assert_eq!(snap.retries, 0);
        assert_eq!(snap.total_retries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependent_range_reads() {
        let store = quiet_store();
        let ctx = context(
            WorkloadConfig {
                alpha: 0.0,
                dependent_reads: true,
                range_reads: true,
                reads_per_transaction_a: 3,
                ..Default::default()
            },
            store.clone(),
        );
        ctx.mark_client_begin();

        TransactionAttempt::new(&ctx).run().await.unwrap();
        assert_eq!(store.stats().range_reads, 3);
        assert_eq!(ctx.counters().snapshot().total_reads, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inconsistent_reads_use_shared_cache() {
        let store = quiet_store();
        let ctx = context(
            WorkloadConfig {
                alpha: 0.0,
                inconsistent_reads: true,
                ..Default::default()
            },
            store,
        );
        ctx.mark_client_begin();

        TransactionAttempt::new(&ctx).run().await.unwrap();
        TransactionAttempt::new(&ctx).run().await.unwrap();
        assert!(ctx.version_cache().fetch_count() >= 1);
    }
}
