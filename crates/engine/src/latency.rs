//! Latency windows and workload counters
//!
//! Client tasks run on a multi-threaded runtime, so every shared aggregate
//! is guarded explicitly: each latency window sits behind its own mutex
//! (never held across an `.await`), counters are atomics.
//!
//! # Memory Ordering
//!
//! Counters use Relaxed ordering. They are observational, read only at
//! reporting time, and synchronize nothing else.

use crate::sample::{ContinuousSample, SAMPLE_SIZE};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Which latency a sample measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LatencyKind {
    /// Attempt start to completion, retries included
    Total,
    /// One read
    RowRead,
    /// All reads of one try
    FullRead,
    /// Acquiring the read version
    ReadVersion,
    /// Commit call
    Commit,
    /// Try start to a recoverable error
    Failure,
}

impl LatencyKind {
    /// Every kind, in reporting order
    pub const ALL: [LatencyKind; 6] = [
        LatencyKind::Total,
        LatencyKind::RowRead,
        LatencyKind::FullRead,
        LatencyKind::ReadVersion,
        LatencyKind::Commit,
        LatencyKind::Failure,
    ];

    fn slot(self) -> usize {
        match self {
            LatencyKind::Total => 0,
            LatencyKind::RowRead => 1,
            LatencyKind::FullRead => 2,
            LatencyKind::ReadVersion => 3,
            LatencyKind::Commit => 4,
            LatencyKind::Failure => 5,
        }
    }

    /// Name used in log events
    pub fn label(self) -> &'static str {
        match self {
            LatencyKind::Total => "total",
            LatencyKind::RowRead => "row_read",
            LatencyKind::FullRead => "full_read",
            LatencyKind::ReadVersion => "read_version",
            LatencyKind::Commit => "commit",
            LatencyKind::Failure => "failure",
        }
    }
}

/// Summary statistics of one window, in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    /// Samples added since the last reset
    pub count: u64,
    /// Exact mean over every sample added
    pub mean: f64,
    /// Sampled median
    pub median: f64,
    /// Sampled 5th percentile
    pub p5: f64,
    /// Sampled 90th percentile
    pub p90: f64,
    /// Sampled 95th percentile
    pub p95: f64,
    /// Sampled 98th percentile
    pub p98: f64,
    /// Largest sample
    pub max: f64,
}

/// Reservoir sample plus raw sum and count
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    sample: ContinuousSample,
    total: f64,
    count: u64,
}

impl LatencyWindow {
    /// Create an empty window backed by a reservoir of `capacity`
    pub fn new(capacity: usize) -> Self {
        Self {
            sample: ContinuousSample::new(capacity),
            total: 0.0,
            count: 0,
        }
    }

    /// Add one latency in seconds
    pub fn add(&mut self, seconds: f64) {
        self.sample.add_sample(seconds);
        self.total += seconds;
        self.count += 1;
    }

    /// Samples added since the last reset
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Summarize the window
    pub fn summary(&self) -> LatencySummary {
        let mean = if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        };
        LatencySummary {
            count: self.count,
            mean,
            median: self.sample.median(),
            p5: self.sample.percentile(0.05),
            p90: self.sample.percentile(0.90),
            p95: self.sample.percentile(0.95),
            p98: self.sample.percentile(0.98),
            max: self.sample.max(),
        }
    }

    /// Start the next window
    pub fn reset(&mut self) {
        self.sample.clear();
        self.total = 0.0;
        self.count = 0;
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new(SAMPLE_SIZE)
    }
}

/// One window per [`LatencyKind`]
#[derive(Debug, Default)]
pub struct LatencyWindows {
    windows: [Mutex<LatencyWindow>; 6],
}

impl LatencyWindows {
    /// Create empty windows
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a latency
    pub fn record(&self, kind: LatencyKind, latency: Duration) {
        self.windows[kind.slot()].lock().add(latency.as_secs_f64());
    }

    /// Summary of one window
    pub fn summary(&self, kind: LatencyKind) -> LatencySummary {
        self.windows[kind.slot()].lock().summary()
    }

    /// Samples in one window
    pub fn count(&self, kind: LatencyKind) -> u64 {
        self.windows[kind.slot()].lock().count()
    }

    /// Reset every window
    pub fn reset_all(&self) {
        for window in &self.windows {
            window.lock().reset();
        }
    }
}

/// Workload counters
#[derive(Debug, Default)]
pub struct Counters {
    a_transactions: AtomicU64,
    b_transactions: AtomicU64,
    retries: AtomicU64,
    total_reads: AtomicU64,
    total_retries: AtomicU64,
}

/// Point-in-time copy of [`Counters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    /// Mix A transactions completed inside the metrics window
    pub a_transactions: u64,
    /// Mix B transactions completed inside the metrics window
    pub b_transactions: u64,
    /// Retries inside the metrics window
    pub retries: u64,
    /// Reads issued over the whole run
    pub total_reads: u64,
    /// Retries over the whole run
    pub total_retries: u64,
}

impl Counters {
    /// Count a completed transaction of mix A (`true`) or B
    pub fn record_transaction(&self, mix_a: bool) {
        let counter = if mix_a {
            &self.a_transactions
        } else {
            &self.b_transactions
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a retry; `in_window` also bumps the reported retry counter
    pub fn record_retry(&self, in_window: bool) {
        self.total_retries.fetch_add(1, Ordering::Relaxed);
        if in_window {
            self.retries.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Count an issued read
    pub fn record_read(&self) {
        self.total_reads.fetch_add(1, Ordering::Relaxed);
    }

    /// Read every counter
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            a_transactions: self.a_transactions.load(Ordering::Relaxed),
            b_transactions: self.b_transactions.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            total_reads: self.total_reads.load(Ordering::Relaxed),
            total_retries: self.total_retries.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_mean_uses_raw_sum() {
        let mut w = LatencyWindow::new(2);
        for v in [1.0, 2.0, 3.0, 6.0] {
            w.add(v);
        }
        let s = w.summary();
        assert_eq!(s.count, 4);
        assert_eq!(s.mean, 3.0);
        assert_eq!(s.max, 6.0);
    }

    #[test]
    fn test_window_reset() {
        let mut w = LatencyWindow::default();
        w.add(0.5);
        w.reset();
        assert_eq!(w.summary(), LatencySummary::default());
    }

    #[test]
    fn test_windows_are_independent() {
        let windows = LatencyWindows::new();
        windows.record(LatencyKind::Commit, Duration::from_millis(20));
        windows.record(LatencyKind::Commit, Duration::from_millis(40));
        windows.record(LatencyKind::Failure, Duration::from_millis(5));

        assert_eq!(windows.count(LatencyKind::Commit), 2);
        assert_eq!(windows.count(LatencyKind::Failure), 1);
        assert_eq!(windows.count(LatencyKind::Total), 0);
        assert!((windows.summary(LatencyKind::Commit).mean - 0.03).abs() < 1e-12);

        windows.reset_all();
        for kind in LatencyKind::ALL {
            assert_eq!(windows.count(kind), 0);
        }
    }

    #[test]
    fn test_counters() {
        let counters = Counters::default();
        counters.record_transaction(true);
        counters.record_transaction(false);
        counters.record_transaction(false);
        counters.record_retry(true);
        counters.record_retry(false);
        counters.record_read();

        let snap = counters.snapshot();
        assert_eq!(snap.a_transactions, 1);
        assert_eq!(snap.b_transactions, 2);
        assert_eq!(snap.retries, 1);
        assert_eq!(snap.total_retries, 2);
        assert_eq!(snap.total_reads, 1);
    }

    #[test]
    fn test_labels_are_distinct() {
        let mut labels: Vec<_> = LatencyKind::ALL.iter().map(|k| k.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), LatencyKind::ALL.len());
    }
}
