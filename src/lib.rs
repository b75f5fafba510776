//! rwbench - open-loop read/write benchmark for transactional key-value stores
//!
//! rwbench drives a store with a mix of read-only and read-write
//! transactions at a Poisson-paced target rate and reports throughput,
//! retries and latency distributions.
//!
//! # Quick Start
//!
//! ```ignore
//! use rwbench::{run_benchmark, MemoryStore, WorkloadConfig};
//!
//! let config = WorkloadConfig { test_duration: 5.0, ..Default::default() };
//! let metrics = run_benchmark(config, MemoryStore::default()).await?;
//! for metric in metrics {
//!     println!("{} {}", metric.name, metric.value);
//! }
//! ```
//!
//! # Architecture
//!
//! - [`core`]: the store capability traits and the session variant
//! - [`concurrency`]: an in-memory MVCC store implementing them
//! - [`engine`]: the workload itself

pub use rwbench_concurrency as concurrency;
pub use rwbench_core as core;
pub use rwbench_engine as engine;

pub use rwbench_concurrency::{MemoryStore, MemoryStoreConfig, RetryConfig, StoreStats};
pub use rwbench_core::{KvStore, SessionStore, StoreError, Transaction};
pub use rwbench_engine::{
    run_benchmark, BenchError, BenchResult, PerfMetric, ReadWriteWorkload, WorkloadConfig,
};
