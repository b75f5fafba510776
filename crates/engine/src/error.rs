//! Benchmark error types
//!
//! Recoverable store errors never reach this layer: they are retried inside
//! a transaction attempt. What remains is configuration rejected at startup,
//! fatal store errors, and failures of the surrounding runtime.

use rwbench_core::StoreError;
use thiserror::Error;

/// Result type alias for benchmark operations
pub type BenchResult<T> = std::result::Result<T, BenchError>;

/// Errors that abort a benchmark run
#[derive(Debug, Error)]
pub enum BenchError {
    /// Invalid workload configuration, reported before any client starts
    #[error("Invalid workload configuration: {0}")]
    Config(String),

    /// Store error that `on_error` refused to retry
    #[error("Fatal store error: {0}")]
    Store(#[from] StoreError),

    /// Reading a workload file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Workload file is not valid TOML for a workload
    #[error("Failed to parse workload file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A client task panicked or was lost
    #[error("Client task failed: {0}")]
    Task(String),
}

impl BenchError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        BenchError::Config(msg.into())
    }

    /// True if the error was raised by configuration validation
    pub fn is_config(&self) -> bool {
        matches!(self, BenchError::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = BenchError::config("alpha must be within [0, 1]");
        assert!(err.is_config());
        assert!(err.to_string().contains("alpha must be within"));
    }

    #[test]
    fn test_store_error_converts() {
        let err: BenchError = StoreError::Internal("boom".to_string()).into();
        assert!(matches!(err, BenchError::Store(StoreError::Internal(_))));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_parse_error_converts() {
        let parse = toml::from_str::<toml::Table>("= nope").unwrap_err();
        let err: BenchError = parse.into();
        assert!(matches!(err, BenchError::Parse(_)));
    }
}
