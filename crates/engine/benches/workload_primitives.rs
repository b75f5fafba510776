//! Workload Primitive Benchmarks
//!
//! Per-attempt costs paid on the client side, independent of the store:
//! - index sampling (uniform and hot-skewed)
//! - key formatting
//! - reservoir insertion and percentile extraction

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rwbench_engine::{ContinuousSample, KeyAccessModel, WorkloadConfig, SAMPLE_SIZE};

fn model(hot_key_fraction: f64, hot_traffic_fraction: f64) -> KeyAccessModel {
    KeyAccessModel::from_config(&WorkloadConfig {
        record_count: 1_000_000,
        hot_key_fraction,
        hot_traffic_fraction,
        ..Default::default()
    })
}

/// Benchmark index sampling
fn bench_sampling(c: &mut Criterion) {
    let uniform = model(0.0, 0.0);
    let hot = model(0.01, 0.5);
    let mut rng = StdRng::seed_from_u64(1);

    let mut group = c.benchmark_group("keys");
    group.throughput(Throughput::Elements(1));
    group.bench_function("sample_uniform", |b| b.iter(|| uniform.sample_index(&mut rng)));
    group.bench_function("sample_hot", |b| b.iter(|| hot.sample_index(&mut rng)));
    group.bench_function("sample_adjacent_10", |b| {
        b.iter(|| uniform.sample_indices(&mut rng, 10, true))
    });
    group.finish();
}

/// Benchmark key formatting
fn bench_key_for(c: &mut Criterion) {
    let keys = model(0.0, 0.0);
    let mut index = 0u64;

    let mut group = c.benchmark_group("keys");
    group.throughput(Throughput::Elements(1));
    group.bench_function("key_for", |b| {
        b.iter(|| {
            index = (index + 7919) % 1_000_000;
            keys.key_for(black_box(index))
        })
    });
    group.finish();
}

/// Benchmark reservoir insertion once the reservoir is full
fn bench_reservoir(c: &mut Criterion) {
    let mut sample = ContinuousSample::with_seed(SAMPLE_SIZE, 3);
    for i in 0..SAMPLE_SIZE {
        sample.add_sample(i as f64 * 1e-6);
    }

    let mut group = c.benchmark_group("sample");
    group.throughput(Throughput::Elements(1));
    let mut value = 0.0;
    group.bench_function("add_full", |b| {
        b.iter(|| {
            value += 1e-6;
            sample.add_sample(black_box(value));
        })
    });
    group.bench_function("p98", |b| b.iter(|| sample.percentile(0.98)));
    group.finish();
}

criterion_group!(benches, bench_sampling, bench_key_for, bench_reservoir);
criterion_main!(benches);
