//! Workload configuration via TOML
//!
//! Every field is optional in the file; missing fields take the defaults
//! below. A configuration is built once, validated, and never mutated while
//! the workload runs.

use crate::error::{BenchError, BenchResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Minimum key width after the prefix (16 hex digits of the index)
pub const MIN_KEY_BYTES: usize = 16;

/// Longest accepted time setting, one year in seconds
pub const MAX_SECONDS: f64 = 365.0 * 24.0 * 3600.0;

/// Most client loops one process may run
pub const MAX_ACTOR_COUNT: usize = 100_000;

/// ReadWrite workload configuration
///
/// # Example
///
/// ```toml
/// record_count = 1000
/// transactions_per_second = 500.0
/// test_duration = 30.0
///
/// # Mix A: read-only, mix B: mostly writes
/// reads_per_transaction_a = 10
/// writes_per_transaction_a = 0
/// reads_per_transaction_b = 1
/// writes_per_transaction_b = 9
/// alpha = 0.1
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkloadConfig {
    /// Number of logical records
    pub record_count: u64,
    /// Key width after the prefix
    pub key_bytes: usize,
    /// Prefix prepended to every key
    pub key_prefix: String,
    /// Smallest written value
    pub min_value_bytes: usize,
    /// Largest written value
    pub max_value_bytes: usize,

    /// Reads per mix A transaction
    pub reads_per_transaction_a: usize,
    /// Writes per mix A transaction
    pub writes_per_transaction_a: usize,
    /// Reads per mix B transaction
    pub reads_per_transaction_b: usize,
    /// Writes per mix B transaction
    pub writes_per_transaction_b: usize,
    /// Probability of choosing mix B
    pub alpha: f64,
    /// Extra read conflict ranges per writing transaction
    pub extra_read_conflict_ranges: usize,
    /// Extra write conflict ranges per writing transaction
    pub extra_write_conflict_ranges: usize,

    /// Target transactions per second across all participating processes
    pub transactions_per_second: f64,
    /// Latency budget used to size the default actor count (seconds)
    pub allowed_latency: f64,
    /// Client loops in this process (derived when absent)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_count: Option<usize>,
    /// Index of this process among the participating processes
    pub client_id: usize,
    /// Number of participating processes
    pub client_count: usize,

    /// Run length (seconds)
    pub test_duration: f64,
    /// Start of the metrics window relative to client begin (seconds)
    pub metrics_start: f64,
    /// Length of the metrics window (seconds, defaults to the run length)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_duration: Option<f64>,
    /// Keep only the middle three quarters of the run
    pub discard_edge_measurements: bool,

    /// Issue reads one after another instead of all at once
    pub dependent_reads: bool,
    /// Read a contiguous run of keys
    pub adjacent_reads: bool,
    /// Write a contiguous run of keys
    pub adjacent_writes: bool,
    /// Scan each read key's range instead of a point lookup
    pub range_reads: bool,
    /// Row cap of one range read
    pub range_read_limit: usize,
    /// Share one possibly stale read version between clients
    pub inconsistent_reads: bool,

    /// Fraction of the keyspace that is hot
    pub hot_key_fraction: f64,
    /// Fraction of accesses that should land on hot keys
    pub hot_traffic_fraction: f64,

    /// Skip attempts following the sweep triangle wave
    pub ramp_up_load: bool,
    /// Use the sweep value in place of `alpha`
    pub ramp_transaction_type: bool,
    /// Stagger client start and stop over the run
    pub ramp_up_concurrency: bool,
    /// Number of sweeps over the run
    pub ramp_sweep_count: u32,

    /// Use session (local write cache) transactions
    pub session_transactions: bool,

    /// Report latency windows periodically
    pub enable_read_latency_logging: bool,
    /// Periodic report interval (seconds)
    pub periodic_logging_interval: f64,
    /// Tear clients down at the deadline instead of letting attempts finish
    pub cancel_workers_at_duration: bool,

    /// Start of the debug correlation interval (seconds after client begin)
    pub debug_time: f64,
    /// Length of the debug correlation interval (seconds)
    pub debug_interval: f64,

    /// Load every record during setup
    pub setup: bool,
    /// Records written per load transaction
    pub load_batch_size: usize,

    /// Seed for the workload RNG
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            record_count: 10_000,
            key_bytes: MIN_KEY_BYTES,
            key_prefix: String::new(),
            min_value_bytes: 16,
            max_value_bytes: 96,
            reads_per_transaction_a: 10,
            writes_per_transaction_a: 0,
            reads_per_transaction_b: 1,
            writes_per_transaction_b: 9,
            alpha: 0.1,
            extra_read_conflict_ranges: 0,
            extra_write_conflict_ranges: 0,
            transactions_per_second: 5000.0,
            allowed_latency: 0.25,
            actor_count: None,
            client_id: 0,
            client_count: 1,
            test_duration: 10.0,
            metrics_start: 0.0,
            metrics_duration: None,
            discard_edge_measurements: true,
            dependent_reads: false,
            adjacent_reads: false,
            adjacent_writes: false,
            range_reads: false,
            range_read_limit: 1000,
            inconsistent_reads: false,
            hot_key_fraction: 0.0,
            hot_traffic_fraction: 0.0,
            ramp_up_load: false,
            ramp_transaction_type: false,
            ramp_up_concurrency: false,
            ramp_sweep_count: 1,
            session_transactions: false,
            enable_read_latency_logging: false,
            periodic_logging_interval: 5.0,
            cancel_workers_at_duration: true,
            debug_time: 0.0,
            debug_interval: 0.0,
            setup: true,
            load_batch_size: 100,
            seed: None,
        }
    }
}

/// Metrics window relative to client begin, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsWindow {
    /// Window start
    pub start: f64,
    /// Window length
    pub duration: f64,
}

impl MetricsWindow {
    /// True if `elapsed` falls in `[start, start + duration)`
    pub fn contains(&self, elapsed: f64) -> bool {
        elapsed >= self.start && elapsed < self.start + self.duration
    }

    /// Window end
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

impl WorkloadConfig {
    /// Parse and validate a workload from TOML text
    pub fn from_toml_str(content: &str) -> BenchResult<Self> {
        let config: WorkloadConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a workload file
    pub fn load(path: &Path) -> BenchResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> BenchResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| BenchError::config(format!("failed to serialize workload: {}", e)))
    }

    /// Target rate of this process
    pub fn client_transactions_per_second(&self) -> f64 {
        self.transactions_per_second / self.client_count.max(1) as f64
    }

    /// Client loops in this process
    ///
    /// Defaults to `ceil(client tps * allowed_latency)`.
    pub fn actor_count(&self) -> usize {
        self.actor_count.unwrap_or_else(|| {
            (self.client_transactions_per_second() * self.allowed_latency).ceil() as usize
        })
    }

    /// Mean Poisson inter-arrival time of one client loop
    pub fn mean_arrival_interval(&self) -> Duration {
        Duration::from_secs_f64(self.actor_count() as f64 / self.client_transactions_per_second())
    }

    /// Run length
    pub fn test_duration(&self) -> Duration {
        Duration::from_secs_f64(self.test_duration)
    }

    /// Metrics window after edge trimming
    pub fn metrics_window(&self) -> MetricsWindow {
        let mut start = self.metrics_start;
        let mut duration = self.metrics_duration.unwrap_or(self.test_duration);
        if self.discard_edge_measurements {
            start += self.test_duration * 0.125;
            duration *= 0.75;
        }
        MetricsWindow { start, duration }
    }

    /// Bytes per row used for throughput estimates
    pub fn row_bytes(&self) -> f64 {
        (self.key_prefix.len() + self.key_bytes) as f64
            + (self.min_value_bytes + self.max_value_bytes) as f64 * 0.5
    }

    /// Check every constraint the workload relies on
    pub fn validate(&self) -> BenchResult<()> {
        fn fail<T>(msg: String) -> BenchResult<T> {
            Err(BenchError::Config(msg))
        }

        let numbers = [
            ("alpha", self.alpha),
            ("transactions_per_second", self.transactions_per_second),
            ("allowed_latency", self.allowed_latency),
            ("hot_key_fraction", self.hot_key_fraction),
            ("hot_traffic_fraction", self.hot_traffic_fraction),
        ];
        for (name, value) in numbers {
            if !value.is_finite() {
                return fail(format!("{} must be a finite number, got {}", name, value));
            }
        }
        let seconds = [
            ("test_duration", Some(self.test_duration)),
            ("allowed_latency", Some(self.allowed_latency)),
            ("metrics_start", Some(self.metrics_start)),
            ("metrics_duration", self.metrics_duration),
            ("periodic_logging_interval", Some(self.periodic_logging_interval)),
            ("debug_time", Some(self.debug_time)),
            ("debug_interval", Some(self.debug_interval)),
        ];
        for (name, value) in seconds.into_iter().filter_map(|(n, v)| v.map(|v| (n, v))) {
            if !value.is_finite() || value.abs() > MAX_SECONDS {
                return fail(format!(
                    "{} must be a finite number of seconds up to {}, got {}",
                    name, MAX_SECONDS, value
                ));
            }
        }

        if self.record_count == 0 {
            return fail("record_count must be positive".to_string());
        }
        if self.key_bytes < MIN_KEY_BYTES {
            return fail(format!(
                "key_bytes must be at least {}, got {}",
                MIN_KEY_BYTES, self.key_bytes
            ));
        }
        if self.min_value_bytes > self.max_value_bytes {
            return fail(format!(
                "min_value_bytes ({}) exceeds max_value_bytes ({})",
                self.min_value_bytes, self.max_value_bytes
            ));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return fail(format!("alpha must be within [0, 1], got {}", self.alpha));
        }
        if !(self.transactions_per_second > 0.0) {
            return fail("transactions_per_second must be positive".to_string());
        }
        if !(self.allowed_latency > 0.0) {
            return fail("allowed_latency must be positive".to_string());
        }
        if !(self.test_duration > 0.0) {
            return fail("test_duration must be positive".to_string());
        }
        if self.client_count == 0 || self.client_id >= self.client_count {
            return fail(format!(
                "client_id ({}) must be below client_count ({})",
                self.client_id, self.client_count
            ));
        }
        let actors = self.actor_count();
        if actors == 0 {
            return fail("actor_count must be positive".to_string());
        }
        if actors > MAX_ACTOR_COUNT {
            return fail(format!(
                "actor_count ({}) exceeds {}; lower transactions_per_second or allowed_latency",
                actors, MAX_ACTOR_COUNT
            ));
        }
        // The pacer stretches the mean by -ln(u) < 37
        let mean = actors as f64 / self.client_transactions_per_second();
        if mean * 37.0 > MAX_SECONDS {
            return fail(format!(
                "mean arrival interval of {} seconds is too long; raise transactions_per_second",
                mean
            ));
        }
        if self.metrics_start < 0.0 || self.metrics_duration.map_or(false, |d| d < 0.0) {
            return fail("metrics window bounds must not be negative".to_string());
        }

        if self.hot_key_fraction < 0.0 || self.hot_traffic_fraction > 1.0 {
            return fail(format!(
                "hot fractions out of range: hot_key_fraction={}, hot_traffic_fraction={}",
                self.hot_key_fraction, self.hot_traffic_fraction
            ));
        }
        if self.hot_key_fraction > self.hot_traffic_fraction {
            return fail(format!(
                "hot_key_fraction ({}) exceeds hot_traffic_fraction ({}); hot keys must be hot",
                self.hot_key_fraction, self.hot_traffic_fraction
            ));
        }
        if self.hot_key_fraction >= 1.0 {
            return fail("hot_key_fraction must be below 1".to_string());
        }
        if self.hot_key_fraction == 0.0 && self.hot_traffic_fraction > 0.0 {
            return fail("hot_traffic_fraction needs a non-zero hot_key_fraction".to_string());
        }

        if self.ramp_sweep_count == 0 {
            return fail("ramp_sweep_count must be positive".to_string());
        }
        if self.ramp_up_concurrency && self.ramp_sweep_count != 2 {
            return fail(format!(
                "ramp_up_concurrency ramps up then down and needs ramp_sweep_count = 2, got {}",
                self.ramp_sweep_count
            ));
        }

        let max_reads = self.reads_per_transaction_a.max(self.reads_per_transaction_b);
        let max_writes = self.writes_per_transaction_a.max(self.writes_per_transaction_b);
        if self.adjacent_reads && max_reads as u64 > self.record_count {
            return fail(format!(
                "adjacent_reads needs {} records, only {} exist",
                max_reads, self.record_count
            ));
        }
        if self.adjacent_writes && max_writes as u64 > self.record_count {
            return fail(format!(
                "adjacent_writes needs {} records, only {} exist",
                max_writes, self.record_count
            ));
        }
        if self.range_reads && self.range_read_limit == 0 {
            return fail("range_read_limit must be positive".to_string());
        }

        if self.enable_read_latency_logging && !(self.periodic_logging_interval > 0.0) {
            return fail("periodic_logging_interval must be positive".to_string());
        }
        if self.setup && self.load_batch_size == 0 {
            return fail("load_batch_size must be positive".to_string());
        }

        Ok(())
    }
}
