//! Reported metrics
//!
//! The final report is assembled from the counters and latency windows once
//! the run is over. When periodic logging is enabled, a reporter task also
//! snapshots every window on a fixed schedule, appends `T=<elapsed>s:`
//! prefixed metrics for ticks that lie inside the metrics window, and resets
//! the windows for the next tick.

use crate::config::WorkloadConfig;
use crate::context::WorkloadContext;
use crate::latency::{CounterSnapshot, LatencyKind, LatencySummary, LatencyWindows};
use parking_lot::Mutex;
use rwbench_core::KvStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::info;

/// One reported value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfMetric {
    /// Metric name
    pub name: String,
    /// Metric value
    pub value: f64,
    /// Whether combining runs should average this value instead of summing
    pub averaged: bool,
}

impl PerfMetric {
    /// Create a metric
    pub fn new(name: impl Into<String>, value: f64, averaged: bool) -> Self {
        Self {
            name: name.into(),
            value,
            averaged,
        }
    }
}

fn ms(seconds: f64) -> f64 {
    1000.0 * seconds
}

/// Rows read and written by completed transactions
pub fn row_counts(config: &WorkloadConfig, counters: &CounterSnapshot) -> (u64, u64) {
    let reads = counters.a_transactions * config.reads_per_transaction_a as u64
        + counters.b_transactions * config.reads_per_transaction_b as u64;
    let writes = counters.a_transactions * config.writes_per_transaction_a as u64
        + counters.b_transactions * config.writes_per_transaction_b as u64;
    (reads, writes)
}

/// Inputs of the final report
#[derive(Debug, Clone, Copy)]
pub struct ReportInputs<'a> {
    /// Workload configuration
    pub config: &'a WorkloadConfig,
    /// Counters at the end of the run
    pub counters: CounterSnapshot,
    /// Latency windows at the end of the run
    pub latencies: &'a LatencyWindows,
    /// Length of the metrics window in seconds
    pub duration: f64,
    /// Bulk load time in seconds
    pub load_time: f64,
}

/// Assemble the final report, followed by `periodic`
pub fn final_metrics(inputs: ReportInputs<'_>, periodic: &[PerfMetric]) -> Vec<PerfMetric> {
    let ReportInputs {
        config,
        counters,
        latencies,
        duration,
        load_time,
    } = inputs;
    let per_sec = |n: f64| if duration > 0.0 { n / duration } else { 0.0 };

    let (reads, writes) = row_counts(config, &counters);
    let (reads, writes) = (reads as f64, writes as f64);
    let transactions = (counters.a_transactions + counters.b_transactions) as f64;

    let mut m = vec![
        PerfMetric::new("Measured Duration", duration, true),
        PerfMetric::new("Transactions/sec", per_sec(transactions), false),
        PerfMetric::new("Operations/sec", per_sec(reads + writes), false),
        PerfMetric::new("A Transactions", counters.a_transactions as f64, false),
        PerfMetric::new("B Transactions", counters.b_transactions as f64, false),
        PerfMetric::new("Retries", counters.retries as f64, false),
        PerfMetric::new("Mean load time (seconds)", load_time, true),
        PerfMetric::new("Read rows", reads, false),
        PerfMetric::new("Write rows", writes, false),
    ];

    if !config.ramp_up_load {
        let total = latencies.summary(LatencyKind::Total);
        m.push(PerfMetric::new("Mean Latency (ms)", ms(total.mean), true));
        m.push(PerfMetric::new("Median Latency (ms, averaged)", ms(total.median), true));
        m.push(PerfMetric::new("90% Latency (ms, averaged)", ms(total.p90), true));
        m.push(PerfMetric::new("98% Latency (ms, averaged)", ms(total.p98), true));
        m.push(PerfMetric::new("Max Latency (ms, averaged)", ms(total.max), true));

        for (kind, label) in [
            (LatencyKind::RowRead, "Row Read"),
            (LatencyKind::FullRead, "Total Read"),
            (LatencyKind::ReadVersion, "Read Version"),
            (LatencyKind::Commit, "Commit"),
        ] {
            let s = latencies.summary(kind);
            m.push(PerfMetric::new(format!("Mean {} Latency (ms)", label), ms(s.mean), true));
            m.push(PerfMetric::new(
                format!("Median {} Latency (ms, averaged)", label),
                ms(s.median),
                true,
            ));
            m.push(PerfMetric::new(
                format!("Max {} Latency (ms, averaged)", label),
                ms(s.max),
                true,
            ));
        }

        let failure = latencies.summary(LatencyKind::Failure);
        m.push(PerfMetric::new("Mean Failure Latency (ms)", ms(failure.mean), true));
        m.push(PerfMetric::new("Failed Tries", failure.count as f64, false));
    }

    let row_bytes = config.row_bytes();
    m.push(PerfMetric::new("Read rows/sec", per_sec(reads), false));
    m.push(PerfMetric::new("Write rows/sec", per_sec(writes), false));
    m.push(PerfMetric::new("Bytes read/sec", per_sec(reads * row_bytes), false));
    m.push(PerfMetric::new("Bytes written/sec", per_sec(writes * row_bytes), false));

    m.extend_from_slice(periodic);
    m
}

/// Metrics of one periodic tick, `elapsed` seconds after the reporter began
pub fn tick_metrics(
    elapsed: f64,
    ops_per_sec: f64,
    summary: impl Fn(LatencyKind) -> LatencySummary,
) -> Vec<PerfMetric> {
    let ts = format!("T={:04.0}s:", elapsed);
    let mut m = vec![PerfMetric::new(format!("{}Operations/sec", ts), ops_per_sec, false)];

    let kinds = [
        (LatencyKind::Total, ""),
        (LatencyKind::RowRead, "Row Read "),
        (LatencyKind::FullRead, "Total Read "),
        (LatencyKind::ReadVersion, "Read Version "),
        (LatencyKind::Commit, "Commit "),
    ];
    for (kind, label) in kinds {
        let s = summary(kind);
        m.push(PerfMetric::new(format!("{}Mean {}Latency (ms)", ts, label), ms(s.mean), true));
        for (name, value) in [("Median", s.median), ("5%", s.p5), ("95%", s.p95)] {
            m.push(PerfMetric::new(
                format!("{}{} {}Latency (ms, averaged)", ts, name, label),
                ms(value),
                true,
            ));
        }
    }
    for (kind, label) in kinds {
        m.push(PerfMetric::new(
            format!("{}Max {}Latency (ms, averaged)", ts, label),
            ms(summary(kind).max),
            true,
        ));
    }
    m
}

/// Periodic latency reporter
pub struct PeriodicReporter<S: KvStore> {
    ctx: Arc<WorkloadContext<S>>,
    interval: Duration,
    sink: Arc<Mutex<Vec<PerfMetric>>>,
}

impl<S: KvStore> PeriodicReporter<S> {
    /// Reporter appending its metrics to `sink`
    pub fn new(ctx: Arc<WorkloadContext<S>>, sink: Arc<Mutex<Vec<PerfMetric>>>) -> Self {
        let interval = Duration::from_secs_f64(ctx.config().periodic_logging_interval);
        Self {
            ctx,
            interval,
            sink,
        }
    }

    /// Tick forever; the owner aborts the task
    pub async fn run(self) {
        let start = Instant::now();
        let mut ticks = 0u32;
        let mut last_ops = 0u64;
        loop {
            ticks += 1;
            let elapsed = self.interval * ticks;
            sleep_until(start + elapsed).await;
            last_ops = self.tick(elapsed.as_secs_f64(), last_ops);
        }
    }

    /// Report one tick and return the operation count it observed
    fn tick(&self, elapsed: f64, last_ops: u64) -> u64 {
        let latencies = self.ctx.latencies();
        for kind in LatencyKind::ALL {
            let s = latencies.summary(kind);
            info!(
                target: "rwbench::latency",
                window = kind.label(),
                mean = s.mean,
                median = s.median,
                p5 = s.p5,
                p95 = s.p95,
                count = s.count,
                elapsed,
                "Periodic latency"
            );
        }

        let config = self.ctx.config();
        let (reads, writes) = row_counts(config, &self.ctx.counters().snapshot());
        let ops = reads + writes;

        let now = Instant::now();
        let client_begin = self.ctx.client_begin();
        let tick_begin = now
            .checked_sub(self.interval)
            .map_or(client_begin, |t| t.max(client_begin));
        if self.ctx.should_record(tick_begin) && self.ctx.should_record(now) {
            let ops_per_sec = ops.saturating_sub(last_ops) as f64 / self.interval.as_secs_f64();
            let metrics = tick_metrics(elapsed, ops_per_sec, |kind| latencies.summary(kind));
            self.sink.lock().extend(metrics);
        }

        latencies.reset_all();
        ops
    }
}
