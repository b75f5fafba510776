//! ReadWrite benchmark engine
//!
//! This crate drives a transactional key-value store with an open-loop
//! read/write workload:
//! - Config: TOML workload description with fail-fast validation
//! - Keys: index-to-key mapping and hot/cold index sampling
//! - Ramp: load, mix and concurrency sweeps over the run
//! - VersionCache: single-flight shared read version for inconsistent reads
//! - Attempt: one logical transaction with its retry loop
//! - Client: Poisson-paced client loops
//! - Driver: setup, start, check and metrics for one run
//!
//! The engine only talks to the store through the `rwbench-core` traits, so
//! the same loop runs against the direct and the session variant.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attempt;
pub mod client;
pub mod config;
pub mod context;
pub mod driver;
pub mod error;
pub mod keys;
pub mod latency;
pub mod metrics;
pub mod ramp;
pub mod sample;
pub mod setup;
pub mod version_cache;

pub use attempt::{AttemptOutcome, AttemptPlan, TransactionAttempt};
pub use client::{ClientLoop, PoissonPacer};
pub use config::{MetricsWindow, WorkloadConfig, MAX_ACTOR_COUNT, MAX_SECONDS, MIN_KEY_BYTES};
pub use context::WorkloadContext;
pub use driver::{run_benchmark, ReadWriteWorkload};
pub use error::{BenchError, BenchResult};
pub use keys::{force_hot_probability, KeyAccessModel};
pub use latency::{
    CounterSnapshot, Counters, LatencyKind, LatencySummary, LatencyWindow, LatencyWindows,
};
pub use metrics::{final_metrics, PerfMetric, PeriodicReporter, ReportInputs};
pub use ramp::{MixKind, RampController};
pub use sample::{ContinuousSample, SAMPLE_SIZE};
pub use setup::{BulkLoader, LoadReport};
pub use version_cache::VersionCache;
