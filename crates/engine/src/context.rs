//! Shared workload state
//!
//! One [`WorkloadContext`] is built per run and handed to every client loop
//! behind an `Arc`. It owns the components the loops share: the key model,
//! the ramp controller, the version cache, the latency windows and counters,
//! and the workload RNG.

use crate::config::{MetricsWindow, WorkloadConfig};
use crate::error::BenchResult;
use crate::keys::KeyAccessModel;
use crate::latency::{Counters, LatencyWindows};
use crate::ramp::RampController;
use crate::version_cache::VersionCache;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rwbench_core::{KvStore, Value};
use std::sync::Arc;
use tokio::time::Instant;

/// Random index pairs checked against the key mapping at construction
const MONOTONIC_CHECK_PAIRS: usize = 30;

/// State shared by every client loop of one run
pub struct WorkloadContext<S: KvStore> {
    config: WorkloadConfig,
    store: Arc<S>,
    keys: KeyAccessModel,
    ramp: RampController,
    version_cache: VersionCache<S>,
    latencies: LatencyWindows,
    counters: Counters,
    rng: Mutex<StdRng>,
    client_begin: Mutex<Instant>,
    metrics_window: Mutex<MetricsWindow>,
}

impl<S: KvStore> WorkloadContext<S> {
    /// Validate `config` and build the shared state
    ///
    /// Fails with a configuration error before anything touches the store.
    pub fn new(config: WorkloadConfig, store: Arc<S>) -> BenchResult<Self> {
        config.validate()?;

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let keys = KeyAccessModel::from_config(&config);
        keys.verify_monotonic(&mut rng, MONOTONIC_CHECK_PAIRS)?;

        Ok(Self {
            ramp: RampController::from_config(&config),
            version_cache: VersionCache::new(Arc::clone(&store)),
            latencies: LatencyWindows::new(),
            counters: Counters::default(),
            rng: Mutex::new(rng),
            client_begin: Mutex::new(Instant::now()),
            metrics_window: Mutex::new(config.metrics_window()),
            keys,
            store,
            config,
        })
    }

    /// Workload configuration
    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Store under test
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Key access model
    pub fn keys(&self) -> &KeyAccessModel {
        &self.keys
    }

    /// Ramp controller
    pub fn ramp(&self) -> &RampController {
        &self.ramp
    }

    /// Shared read-version cache
    pub fn version_cache(&self) -> &VersionCache<S> {
        &self.version_cache
    }

    /// Latency windows
    pub fn latencies(&self) -> &LatencyWindows {
        &self.latencies
    }

    /// Workload counters
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Run `f` with the workload RNG
    ///
    /// The lock is held only for the duration of `f`; never await inside.
    pub fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        f(&mut self.rng.lock())
    }

    /// Random value: `.` bytes, length uniform in the configured bounds
    pub fn random_value(&self) -> Value {
        let len = self.with_rng(|rng| {
            rng.gen_range(self.config.min_value_bytes..=self.config.max_value_bytes)
        });
        vec![b'.'; len]
    }

    /// Record now as the instant client loops begin
    pub fn mark_client_begin(&self) {
        *self.client_begin.lock() = Instant::now();
    }

    /// Instant client loops began
    pub fn client_begin(&self) -> Instant {
        *self.client_begin.lock()
    }

    /// Seconds from client begin to `at`, zero if `at` is earlier
    pub fn elapsed_at(&self, at: Instant) -> f64 {
        at.saturating_duration_since(self.client_begin()).as_secs_f64()
    }

    /// Seconds since client begin
    pub fn elapsed(&self) -> f64 {
        self.elapsed_at(Instant::now())
    }

    /// Current metrics window
    pub fn metrics_window(&self) -> MetricsWindow {
        *self.metrics_window.lock()
    }

    /// Replace the metrics window length
    pub fn set_metrics_duration(&self, duration: f64) {
        self.metrics_window.lock().duration = duration;
    }

    /// True if an attempt started at `at` counts towards reported metrics
    pub fn should_record(&self, at: Instant) -> bool {
        self.metrics_window().contains(self.elapsed_at(at))
    }

    /// True if an attempt started at `at` falls in the debug interval
    ///
    /// The interval is `(debug_time, debug_time + debug_interval]`.
    pub fn in_debug_interval(&self, at: Instant) -> bool {
        if self.config.debug_interval <= 0.0 {
            return false;
        }
        let elapsed = self.elapsed_at(at);
        elapsed > self.config.debug_time
            && elapsed <= self.config.debug_time + self.config.debug_interval
    }
}
