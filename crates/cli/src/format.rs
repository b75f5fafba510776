//! Report → human/json string formatting.
//!
//! Two modes:
//! - **Human** (default): aligned `name  value` table, store counters below
//! - **JSON** (`--json`): one pretty-printed object with `metrics` and `store`

use rwbench_concurrency::StoreStats;
use rwbench_engine::{BenchError, PerfMetric};
use serde::Serialize;

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

#[derive(Serialize)]
struct Report<'a> {
    metrics: &'a [PerfMetric],
    store: &'a StoreStats,
}

/// Format the final metrics of a run together with the store counters.
pub fn format_report(metrics: &[PerfMetric], store: &StoreStats, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(&Report { metrics, store })
            .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e)),
        OutputMode::Human => format_human(metrics, store),
    }
}

fn format_human(metrics: &[PerfMetric], store: &StoreStats) -> String {
    let width = metrics.iter().map(|m| m.name.len()).max().unwrap_or(0);
    let mut lines: Vec<String> = metrics
        .iter()
        .map(|m| format!("{:<width$}  {}", m.name, format_value(m.value), width = width))
        .collect();

    lines.push(String::new());
    lines.push("store:".to_string());
    let counters = [
        ("read versions", store.read_versions),
        ("reads", store.reads),
        ("range reads", store.range_reads),
        ("commits", store.commits),
        ("read-only commits", store.read_only_commits),
        ("conflicts", store.conflicts),
        ("too old", store.too_old),
        ("injected faults", store.injected_faults),
        ("resets", store.resets),
    ];
    for (name, value) in counters {
        lines.push(format!("  {:<18} {}", name, value));
    }
    lines.join("\n")
}

/// Whole numbers print without a fraction, everything else with three places.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.3}", value)
    }
}

/// Format an error.
pub fn format_error(err: &BenchError, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(&serde_json::json!({
            "error": err.to_string()
        }))
        .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", err)),
        OutputMode::Human => format!("(error) {}", err),
    }
}
