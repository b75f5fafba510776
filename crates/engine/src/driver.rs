//! ReadWrite workload driver
//!
//! The driver owns one run:
//! - `setup` bulk loads the keyspace
//! - `start` warms the store up, launches `actor_count` client loops and
//!   enforces the test deadline
//! - `check` drains soft-stopped clients and fixes up the metrics window
//! - `get_metrics` assembles the report
//!
//! At the deadline clients are either aborted where they stand
//! (`cancel_workers_at_duration`) or told to stop after their current
//! attempt. A fatal store error in any client aborts the whole run.

use crate::client::ClientLoop;
use crate::config::WorkloadConfig;
use crate::context::WorkloadContext;
use crate::error::{BenchError, BenchResult};
use crate::metrics::{final_metrics, PerfMetric, PeriodicReporter, ReportInputs};
use crate::setup::BulkLoader;
use parking_lot::Mutex;
use rand::Rng;
use rwbench_core::{KeyRange, KvStore, SessionStore, StoreResult, Transaction};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Shortest pause between warm-up and client begin
const MIN_WARM_DELAY: Duration = Duration::from_millis(100);
/// Warm-up plus pause take at least this long
const WARM_PERIOD: Duration = Duration::from_secs(1);

/// Wait for every client; the first failure wins
async fn join_clients(clients: &mut JoinSet<BenchResult<u64>>) -> BenchResult<u64> {
    let mut completed = 0;
    while let Some(joined) = clients.join_next().await {
        match joined {
            Ok(Ok(n)) => completed += n,
            Ok(Err(e)) => return Err(e),
            Err(e) if e.is_cancelled() => {}
            Err(e) => return Err(BenchError::Task(e.to_string())),
        }
    }
    Ok(completed)
}

/// The ReadWrite benchmark against one store
pub struct ReadWriteWorkload<S: KvStore> {
    ctx: Arc<WorkloadContext<S>>,
    load_time: f64,
    periodic: Arc<Mutex<Vec<PerfMetric>>>,
    clients: JoinSet<BenchResult<u64>>,
    stop: watch::Sender<bool>,
    reporter: Option<JoinHandle<()>>,
    completed: u64,
}

impl<S: KvStore> ReadWriteWorkload<S> {
    /// Validate `config` and prepare a run against `store`
    pub fn new(config: WorkloadConfig, store: Arc<S>) -> BenchResult<Self> {
        let ctx = Arc::new(WorkloadContext::new(config, store)?);
        let (stop, _) = watch::channel(false);
        info!(
            target: "rwbench::driver",
            actors = ctx.config().actor_count(),
            records = ctx.config().record_count,
            tps = ctx.config().client_transactions_per_second(),
            "Workload configured"
        );
        Ok(Self {
            ctx,
            load_time: 0.0,
            periodic: Arc::new(Mutex::new(Vec::new())),
            clients: JoinSet::new(),
            stop,
            reporter: None,
            completed: 0,
        })
    }

    /// Shared workload state
    pub fn context(&self) -> &Arc<WorkloadContext<S>> {
        &self.ctx
    }

    /// Attempts completed by clients that have finished
    pub fn completed_attempts(&self) -> u64 {
        self.completed
    }

    /// Load the keyspace unless `setup` is off
    pub async fn setup(&mut self) -> BenchResult<()> {
        if !self.ctx.config().setup {
            return Ok(());
        }
        let report = BulkLoader::new(&self.ctx).load().await?;
        self.load_time = report.elapsed.as_secs_f64();
        Ok(())
    }

    /// Run the clients for the configured duration
    pub async fn start(&mut self) -> BenchResult<()> {
        let warm_start = Instant::now();
        self.warm_up().await?;
        let pause = WARM_PERIOD
            .saturating_sub(warm_start.elapsed())
            .max(MIN_WARM_DELAY);
        sleep(pause).await;

        if self.ctx.config().enable_read_latency_logging {
            let reporter = PeriodicReporter::new(Arc::clone(&self.ctx), Arc::clone(&self.periodic));
            self.reporter = Some(tokio::spawn(reporter.run()));
        }

        self.ctx.mark_client_begin();
        let actors = self.ctx.config().actor_count();
        for index in 0..actors {
            let client = ClientLoop::new(Arc::clone(&self.ctx), index, self.stop.subscribe());
            self.clients.spawn(client.run());
        }
        info!(target: "rwbench::driver", actors, "Clients started");

        let deadline = self.ctx.config().test_duration();
        match timeout(deadline, join_clients(&mut self.clients)).await {
            Ok(Ok(completed)) => {
                self.completed += completed;
            }
            Ok(Err(e)) => {
                warn!(target: "rwbench::driver", error = %e, "Client failed, aborting run");
                self.abort();
                return Err(e);
            }
            Err(_) if self.ctx.config().cancel_workers_at_duration => {
                self.abort();
                join_clients(&mut self.clients).await?;
                debug!(target: "rwbench::driver", "Clients cancelled at deadline");
            }
            Err(_) => {
                let _ = self.stop.send(true);
                debug!(target: "rwbench::driver", "Clients asked to stop at deadline");
            }
        }
        Ok(())
    }

    /// Read a random key and warm the whole keyspace, retrying on error
    async fn warm_up(&self) -> BenchResult<()> {
        let store = self.ctx.store();
        let index = self
            .ctx
            .with_rng(|rng| rng.gen_range(0..self.ctx.keys().record_count()));
        let key = self.ctx.keys().key_for(index);

        let mut txn = store.begin_transaction();
        loop {
            let warmed: StoreResult<()> = async {
                txn.get(&key).await?;
                store.warm_range(&KeyRange::all()).await
            }
            .await;
            match warmed {
                Ok(()) => return Ok(()),
                Err(e) => txn.on_error(e).await?,
            }
        }
    }

    fn abort(&mut self) {
        self.clients.abort_all();
        self.ctx.version_cache().cancel_fetch();
        if let Some(reporter) = self.reporter.take() {
            reporter.abort();
        }
    }

    /// Finish the run
    ///
    /// Waits for soft-stopped clients, then shrinks the metrics window to
    /// the observed run if it ended early.
    pub async fn check(&mut self) -> BenchResult<bool> {
        let _ = self.stop.send(true);
        let drained = join_clients(&mut self.clients).await;
        self.ctx.version_cache().cancel_fetch();
        if let Some(reporter) = self.reporter.take() {
            reporter.abort();
        }
        self.completed += drained?;

        if !self.ctx.config().cancel_workers_at_duration {
            let observed = self.ctx.elapsed();
            let window = self.ctx.metrics_window();
            if observed < window.end() {
                self.ctx.set_metrics_duration((observed - window.start).max(0.0));
            }
        }

        info!(
            target: "rwbench::driver",
            completed = self.completed,
            metrics_duration = self.ctx.metrics_window().duration,
            "Run checked, trace flush requested"
        );
        Ok(true)
    }

    /// Final report
    pub fn get_metrics(&self) -> Vec<PerfMetric> {
        let periodic = self.periodic.lock().clone();
        final_metrics(
            ReportInputs {
                config: self.ctx.config(),
                counters: self.ctx.counters().snapshot(),
                latencies: self.ctx.latencies(),
                duration: self.ctx.metrics_window().duration,
                load_time: self.load_time,
            },
            &periodic,
        )
    }
}

impl<S: KvStore> Drop for ReadWriteWorkload<S> {
    fn drop(&mut self) {
        if let Some(reporter) = self.reporter.take() {
            reporter.abort();
        }
    }
}

/// Run setup, start, check and report against `store`
async fn run_workload<S: KvStore>(
    config: WorkloadConfig,
    store: S,
) -> BenchResult<Vec<PerfMetric>> {
    let mut workload = ReadWriteWorkload::new(config, Arc::new(store))?;
    workload.setup().await?;
    workload.start().await?;
    if !workload.check().await? {
        return Err(BenchError::Task("post-run check failed".to_string()));
    }
    Ok(workload.get_metrics())
}

/// Run the whole benchmark and return its metrics
///
/// Session transactions wrap `store` in a [`SessionStore`].
pub async fn run_benchmark<S: KvStore>(
    config: WorkloadConfig,
    store: S,
) -> BenchResult<Vec<PerfMetric>> {
    if config.session_transactions {
        run_workload(config, SessionStore::new(store)).await
    } else {
        run_workload(config, store).await
    }
}
