//! rwbench: run the ReadWrite benchmark against the in-memory store.
//!
//! `rwbench [flags]` loads the workload, runs setup, the timed client phase
//! and the post-run check, then prints the final metrics. Logs go to stderr
//! and follow `RUST_LOG` (default `rwbench=info`).

mod commands;
mod format;

use std::process;

use rwbench_concurrency::MemoryStore;
use rwbench_engine::run_benchmark;
use tracing::info;
use tracing_subscriber::EnvFilter;

use commands::{build_cli, store_config, workload_config};
use format::{format_error, format_report, OutputMode};

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let output_mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rwbench=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match workload_config(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_error(&e, output_mode));
            process::exit(2);
        }
    };

    if matches.get_flag("print-config") {
        match config.to_toml_string() {
            Ok(toml) => {
                print!("{}", toml);
                return;
            }
            Err(e) => {
                eprintln!("{}", format_error(&e, output_mode));
                process::exit(1);
            }
        }
    }

    let settings = store_config(&matches);
    info!(
        target: "rwbench::cli",
        grv_latency = ?settings.grv_latency,
        read_latency = ?settings.read_latency,
        commit_latency = ?settings.commit_latency,
        "Opening in-memory store"
    );
    let store = MemoryStore::new(settings);
    match run_benchmark(config, store.clone()).await {
        Ok(metrics) => {
            println!("{}", format_report(&metrics, &store.stats(), output_mode));
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, output_mode));
            process::exit(1);
        }
    }
}
