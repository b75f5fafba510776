//! End-to-end runs through the `rwbench` facade
//!
//! Each test drives a full setup / start / check / report cycle against the
//! in-memory store under paused tokio time.

use rwbench::{run_benchmark, MemoryStore, MemoryStoreConfig, PerfMetric, WorkloadConfig};
use std::time::Duration;

fn workload() -> WorkloadConfig {
    WorkloadConfig {
        record_count: 500,
        actor_count: Some(2),
        transactions_per_second: 40.0,
        test_duration: 2.0,
        discard_edge_measurements: false,
        seed: Some(77),
        ..Default::default()
    }
}

fn value(metrics: &[PerfMetric], name: &str) -> f64 {
    metrics
        .iter()
        .find(|m| m.name == name)
        .map(|m| m.value)
        .unwrap_or_else(|| panic!("missing metric {}", name))
}

// ============================================================================
// Full runs
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_run_reports_throughput_and_latency() {
    let store = MemoryStore::default();
    let metrics = run_benchmark(workload(), store.clone()).await.unwrap();

    assert_eq!(value(&metrics, "Measured Duration"), 2.0);
    let transactions = value(&metrics, "A Transactions") + value(&metrics, "B Transactions");
    assert!(transactions > 0.0);
    assert!((value(&metrics, "Transactions/sec") - transactions / 2.0).abs() < 1e-9);
    assert!(value(&metrics, "Read rows") > 0.0);
    assert!(value(&metrics, "Mean Latency (ms)") >= 0.0);
    assert_eq!(value(&metrics, "Retries"), 0.0);

    assert_eq!(store.key_count(), 500);
    assert!(store.stats().read_versions > 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_from_toml_workload() {
    let toml = r#"
        record_count = 200
        actor_count = 1
        transactions_per_second = 20.0
        test_duration = 1.0
        discard_edge_measurements = false
        alpha = 1.0
        reads_per_transaction_b = 2
        writes_per_transaction_b = 3
        seed = 5
    "#;
    let config = WorkloadConfig::from_toml_str(toml).unwrap();
    let reparsed = WorkloadConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
    assert_eq!(config, reparsed);

    let store = MemoryStore::default();
    let metrics = run_benchmark(config, store.clone()).await.unwrap();
    assert_eq!(value(&metrics, "A Transactions"), 0.0);
    let b = value(&metrics, "B Transactions");
    assert!(b > 0.0);
    assert_eq!(value(&metrics, "Write rows"), b * 3.0);
    assert!(store.stats().commits as f64 >= b);
}

#[tokio::test(start_paused = true)]
async fn test_session_variant_runs_the_same_workload() {
    let config = WorkloadConfig {
        session_transactions: true,
        ..workload()
    };
    let store = MemoryStore::default();
    let metrics = run_benchmark(config, store.clone()).await.unwrap();

    assert!(value(&metrics, "Transactions/sec") > 0.0);
    assert_eq!(store.key_count(), 500);
}

#[tokio::test(start_paused = true)]
async fn test_contended_writes_conflict_and_retry() {
    let config = WorkloadConfig {
        record_count: 10,
        alpha: 1.0,
        reads_per_transaction_b: 1,
        writes_per_transaction_b: 9,
        actor_count: Some(4),
        transactions_per_second: 200.0,
        ..workload()
    };
    let store = MemoryStore::new(
        MemoryStoreConfig::default().with_commit_latency(Duration::from_millis(5)),
    );
    let metrics = run_benchmark(config, store.clone()).await.unwrap();

    assert!(store.stats().conflicts > 0, "{:?}", store.stats());
    assert!(value(&metrics, "Failed Tries") > 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_workload_never_touches_the_store() {
    let config = WorkloadConfig {
        alpha: 1.5,
        ..workload()
    };
    let store = MemoryStore::default();
    let err = run_benchmark(config, store.clone()).await.unwrap_err();
    assert!(err.is_config());
    assert_eq!(store.stats().read_versions, 0);
}

#[tokio::test(start_paused = true)]
async fn test_infinite_duration_is_rejected_before_setup() {
    let config = WorkloadConfig {
        test_duration: f64::INFINITY,
        ..workload()
    };
    let store = MemoryStore::default();
    let err = run_benchmark(config, store.clone()).await.unwrap_err();
    assert!(err.is_config());
    assert_eq!(store.key_count(), 0);
}
