//! Ramp control
//!
//! Pure functions of elapsed time and configuration:
//! - the sweep triangle wave (0 → 1 → 0 … over `ramp_sweep_count` segments)
//! - transaction mix selection from `alpha` or the sweep
//! - load gating, which skips attempts while the sweep is low
//! - concurrency staggering, which starts and stops clients linearly
//!   across the run (ramp up over the first half, down over the second)

use crate::config::WorkloadConfig;
use std::time::Duration;

/// Transaction mix profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MixKind {
    /// Mix A (by default read-only)
    A,
    /// Mix B (by default write-heavy)
    B,
}

impl MixKind {
    /// True for mix A
    pub fn is_a(self) -> bool {
        matches!(self, MixKind::A)
    }
}

/// Ramp parameters extracted from a configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RampController {
    test_duration: f64,
    sweep_count: u32,
    alpha: f64,
    ramp_up_load: bool,
    ramp_transaction_type: bool,
    ramp_up_concurrency: bool,
    actor_count: usize,
    client_id: usize,
    client_count: usize,
}

impl RampController {
    /// Build from a validated configuration
    pub fn from_config(config: &WorkloadConfig) -> Self {
        Self {
            test_duration: config.test_duration,
            sweep_count: config.ramp_sweep_count.max(1),
            alpha: config.alpha,
            ramp_up_load: config.ramp_up_load,
            ramp_transaction_type: config.ramp_transaction_type,
            ramp_up_concurrency: config.ramp_up_concurrency,
            actor_count: config.actor_count().max(1),
            client_id: config.client_id,
            client_count: config.client_count.max(1),
        }
    }

    /// Triangle wave position at `elapsed` seconds
    ///
    /// Even segments rise from 0 to 1, odd segments fall back.
    pub fn sweep_alpha(&self, elapsed: f64) -> f64 {
        let sweep_duration = self.test_duration / self.sweep_count as f64;
        let sweeps = elapsed / sweep_duration;
        let current = sweeps.floor();
        let position = sweeps - current;
        if (current as u64) % 2 == 1 {
            1.0 - position
        } else {
            position
        }
    }

    /// Probability of mix B at `elapsed`
    pub fn effective_alpha(&self, elapsed: f64) -> f64 {
        if self.ramp_transaction_type {
            self.sweep_alpha(elapsed)
        } else {
            self.alpha
        }
    }

    /// Pick the mix for a uniform draw `u` in `[0, 1)`
    ///
    /// Mix A wins when `u` exceeds the effective alpha, so
    /// `P(A) = 1 - alpha`.
    pub fn choose_mix(&self, u: f64, elapsed: f64) -> MixKind {
        if u > self.effective_alpha(elapsed) {
            MixKind::A
        } else {
            MixKind::B
        }
    }

    /// Whether an iteration fires for a uniform draw `u` in `[0, 1)`
    pub fn should_fire(&self, u: f64, elapsed: f64) -> bool {
        !self.ramp_up_load || u < self.sweep_alpha(elapsed)
    }

    /// Stagger position of client loop `index` in `[0, 1)`
    ///
    /// Interleaves the loops of all participating processes.
    pub fn client_position(&self, index: usize) -> f64 {
        index as f64 / self.actor_count as f64
            + self.client_id as f64 / self.client_count as f64 / self.actor_count as f64
    }

    /// Delay before client loop `index` issues anything
    pub fn start_delay(&self, index: usize) -> Option<Duration> {
        if !self.ramp_up_concurrency {
            return None;
        }
        Some(Duration::from_secs_f64(
            self.test_duration / 2.0 * self.client_position(index),
        ))
    }

    /// Elapsed seconds after which client loop `index` stops for good
    pub fn stop_point(&self, index: usize) -> Option<f64> {
        if !self.ramp_up_concurrency {
            return None;
        }
        Some(self.test_duration / 2.0 * (2.0 - self.client_position(index)))
    }

    /// True once client loop `index` is past its stop point
    pub fn is_past_stop(&self, index: usize, elapsed: f64) -> bool {
        self.stop_point(index).map_or(false, |stop| elapsed >= stop)
    }

    /// Global ordinal of client loop `index` across processes
    pub fn global_ordinal(&self, index: usize) -> usize {
        index * self.client_count + self.client_id
    }
}
