//! Backoff configuration for `on_error`
//!
//! Retryable errors are retried without limit; this only shapes how long a
//! transaction waits before its next try.

use std::time::Duration;

/// Backoff applied by `on_error` before a retryable transaction is reset
///
/// # Example
/// ```ignore
/// let config = RetryConfig::new()
///     .with_base_delay_ms(5)
///     .with_max_delay_ms(500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay before the first retry in milliseconds (doubles per retry)
    pub base_delay_ms: u64,
    /// Upper bound on the delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 10,
            max_delay_ms: 1000,
        }
    }
}

impl RetryConfig {
    /// Create a new RetryConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Retry immediately, without sleeping
    pub fn no_backoff() -> Self {
        Self {
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Set base delay for exponential backoff
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    /// Set maximum delay between retries
    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }

    /// Delay before retry number `attempt` (0-based, exponential backoff)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        // Cap the shift to prevent overflow (1 << 63 is the max for u64)
        let shift = attempt.min(63);
        let multiplier = 1u64 << shift;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(delay_ms.min(self.max_delay_ms))
    }
}
