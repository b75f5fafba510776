//! Clap command definition and the settings it produces.
//!
//! A run is described by an optional TOML workload file; flags given on
//! the command line override individual fields of it. Store latencies only
//! exist on the command line because they describe the simulated store,
//! not the workload.

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use rwbench_concurrency::MemoryStoreConfig;
use rwbench_engine::{BenchResult, WorkloadConfig};
use std::path::Path;
use std::time::Duration;

/// Build the CLI command.
pub fn build_cli() -> Command {
    Command::new("rwbench")
        .about("Open-loop read/write benchmark against an in-memory transactional store")
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .value_name("PATH")
                .help("TOML workload file (defaults apply to missing fields)"),
        )
        .arg(
            Arg::new("duration")
                .long("duration")
                .short('d')
                .value_name("SECS")
                .value_parser(non_negative)
                .help("Run length in seconds"),
        )
        .arg(
            Arg::new("tps")
                .long("tps")
                .value_name("RATE")
                .value_parser(non_negative)
                .help("Target transactions per second"),
        )
        .arg(
            Arg::new("records")
                .long("records")
                .value_name("N")
                .value_parser(value_parser!(u64))
                .help("Number of records in the keyspace"),
        )
        .arg(
            Arg::new("actors")
                .long("actors")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Client loops (derived from rate and allowed latency when absent)"),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("SEED")
                .value_parser(value_parser!(u64))
                .help("Seed for the workload RNG"),
        )
        .arg(
            Arg::new("session")
                .long("session")
                .help("Use session transactions with a local write cache")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("inconsistent-reads")
                .long("inconsistent-reads")
                .help("Share one possibly stale read version between clients")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("soft-stop")
                .long("soft-stop")
                .help("Let in-flight attempts finish at the deadline instead of cancelling them")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("periodic")
                .long("periodic")
                .help("Report latency windows every logging interval")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("grv-latency-ms")
                .long("grv-latency-ms")
                .value_name("MS")
                .value_parser(non_negative)
                .help("Simulated read version latency"),
        )
        .arg(
            Arg::new("read-latency-ms")
                .long("read-latency-ms")
                .value_name("MS")
                .value_parser(non_negative)
                .help("Simulated read latency"),
        )
        .arg(
            Arg::new("commit-latency-ms")
                .long("commit-latency-ms")
                .value_name("MS")
                .value_parser(non_negative)
                .help("Simulated commit latency"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("print-config")
                .long("print-config")
                .help("Print the effective workload as TOML and exit")
                .action(ArgAction::SetTrue),
        )
}

fn non_negative(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("'{}' must be a finite non-negative number", s))
    }
}

/// Workload described by the file and flags in `matches`, validated.
pub fn workload_config(matches: &ArgMatches) -> BenchResult<WorkloadConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => WorkloadConfig::load(Path::new(path))?,
        None => WorkloadConfig::default(),
    };

    if let Some(&duration) = matches.get_one::<f64>("duration") {
        config.test_duration = duration;
    }
    if let Some(&tps) = matches.get_one::<f64>("tps") {
        config.transactions_per_second = tps;
    }
    if let Some(&records) = matches.get_one::<u64>("records") {
        config.record_count = records;
    }
    if let Some(&actors) = matches.get_one::<usize>("actors") {
        config.actor_count = Some(actors);
    }
    if let Some(&seed) = matches.get_one::<u64>("seed") {
        config.seed = Some(seed);
    }
    if matches.get_flag("session") {
        config.session_transactions = true;
    }
    if matches.get_flag("inconsistent-reads") {
        config.inconsistent_reads = true;
    }
    if matches.get_flag("soft-stop") {
        config.cancel_workers_at_duration = false;
    }
    if matches.get_flag("periodic") {
        config.enable_read_latency_logging = true;
    }

    config.validate()?;
    Ok(config)
}

/// Simulated store latencies from `matches`.
pub fn store_config(matches: &ArgMatches) -> MemoryStoreConfig {
    let latency = |name: &str| {
        matches
            .get_one::<f64>(name)
            .map(|&ms| Duration::from_secs_f64(ms / 1000.0))
            .unwrap_or(Duration::ZERO)
    };
    MemoryStoreConfig::default()
        .with_grv_latency(latency("grv-latency-ms"))
        .with_read_latency(latency("read-latency-ms"))
        .with_commit_latency(latency("commit-latency-ms"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> ArgMatches {
        let mut argv = vec!["rwbench"];
        argv.extend_from_slice(args);
        build_cli().try_get_matches_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_without_flags() {
        let config = workload_config(&parse(&[])).unwrap();
        assert_eq!(config, WorkloadConfig::default());
    }

    #[test]
    fn test_flags_override_fields() {
        let config = workload_config(&parse(&[
            "--duration",
            "2.5",
            "--tps",
            "40",
            "--records",
            "500",
            "--actors",
            "3",
            "--seed",
            "9",
            "--session",
            "--inconsistent-reads",
            "--soft-stop",
            "--periodic",
        ]))
        .unwrap();
        assert_eq!(config.test_duration, 2.5);
        assert_eq!(config.transactions_per_second, 40.0);
        assert_eq!(config.record_count, 500);
        assert_eq!(config.actor_count, Some(3));
        assert_eq!(config.seed, Some(9));
        assert!(config.session_transactions);
        assert!(config.inconsistent_reads);
        assert!(!config.cancel_workers_at_duration);
        assert!(config.enable_read_latency_logging);
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "record_count = 123\ntest_duration = 4.0\nalpha = 0.5").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = workload_config(&parse(&["--config", &path, "--duration", "1"])).unwrap();
        assert_eq!(config.record_count, 123);
        assert_eq!(config.alpha, 0.5);
        assert_eq!(config.test_duration, 1.0);
    }

    #[test]
    fn test_invalid_workload_is_rejected() {
        let err = workload_config(&parse(&["--records", "0"])).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_negative_values_are_rejected_by_parser() {
        let result = build_cli().try_get_matches_from(["rwbench", "--tps", "-5"]);
        assert!(result.is_err());
        let result = build_cli().try_get_matches_from(["rwbench", "--commit-latency-ms", "abc"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_store_latencies_in_milliseconds() {
        let store = store_config(&parse(&["--grv-latency-ms", "2", "--commit-latency-ms", "0.5"]));
        assert_eq!(store.grv_latency, Duration::from_millis(2));
        assert_eq!(store.read_latency, Duration::ZERO);
        assert_eq!(store.commit_latency, Duration::from_micros(500));
    }
}
