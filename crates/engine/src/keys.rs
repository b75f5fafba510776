//! Key access model
//!
//! Maps logical record indices to physical keys and samples indices with a
//! tunable hot/cold skew.
//!
//! With hot key fraction `H` and hot traffic fraction `F`, an access is
//! forced into the hot range with probability `(F - H) / (1 - H)` and is
//! uniform otherwise. A uniform draw lands in the hot range with probability
//! `H`, so `P(cold) = (1 - fhp)(1 - H) = 1 - F`. Hot draws are spread across
//! the keyspace (`drawn / H`), which makes the hot set every `1/H`-th index.

use crate::config::WorkloadConfig;
use crate::error::{BenchError, BenchResult};
use rand::Rng;
use rwbench_core::{Key, KeyRange};

/// Probability of forcing an access into the hot set
///
/// Callers must reject `hot_key_fraction == 1` first.
pub fn force_hot_probability(hot_key_fraction: f64, hot_traffic_fraction: f64) -> f64 {
    (hot_traffic_fraction - hot_key_fraction) / (1.0 - hot_key_fraction)
}

/// Index-to-key mapping plus index sampling
#[derive(Debug, Clone, PartialEq)]
pub struct KeyAccessModel {
    record_count: u64,
    prefix: Vec<u8>,
    key_bytes: usize,
    hot_key_fraction: f64,
    force_hot_probability: f64,
}

impl KeyAccessModel {
    /// Build the model for a validated configuration
    pub fn from_config(config: &WorkloadConfig) -> Self {
        Self {
            record_count: config.record_count,
            prefix: config.key_prefix.as_bytes().to_vec(),
            key_bytes: config.key_bytes,
            hot_key_fraction: config.hot_key_fraction,
            force_hot_probability: force_hot_probability(
                config.hot_key_fraction,
                config.hot_traffic_fraction,
            ),
        }
    }

    /// Number of logical records
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Derived probability of a forced hot access
    pub fn force_hot_probability(&self) -> f64 {
        self.force_hot_probability
    }

    /// Number of indices in the hot range
    pub fn hot_count(&self) -> u64 {
        (self.record_count as f64 * self.hot_key_fraction) as u64
    }

    /// Physical key of `index`
    ///
    /// Prefix, then 16 lowercase hex digits, then `.` padding up to the key
    /// width. Fixed width keeps byte order equal to numeric order.
    pub fn key_for(&self, index: u64) -> Key {
        let width = self.prefix.len() + self.key_bytes;
        let mut key = Vec::with_capacity(width);
        key.extend_from_slice(&self.prefix);
        key.extend_from_slice(format!("{:016x}", index).as_bytes());
        key.resize(width, b'.');
        key
    }

    /// Range scanned by a range read of `index`: every key starting with
    /// `key_for(index)`
    pub fn range_for(&self, index: u64) -> KeyRange {
        let key = self.key_for(index);
        KeyRange::prefix(&key).unwrap_or_else(|| KeyRange::single_key(&key))
    }

    /// Sample an index in `[0, record_count)`
    pub fn sample_index<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        self.sample_below(rng, self.record_count)
    }

    /// Sample an index in `[0, bound)` with the configured skew
    fn sample_below<R: Rng + ?Sized>(&self, rng: &mut R, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        if self.force_hot_probability > 0.0 && rng.gen::<f64>() < self.force_hot_probability {
            let hot = (bound as f64 * self.hot_key_fraction) as u64;
            if hot > 0 {
                let drawn = rng.gen_range(0..hot);
                return ((drawn as f64 / self.hot_key_fraction) as u64).min(bound - 1);
            }
        }
        rng.gen_range(0..bound)
    }

    /// Sample `count` indices
    ///
    /// Scattered mode samples each index independently. Adjacent mode picks
    /// one base uniformly in `[0, record_count - count)` and returns the run
    /// `base..base + count`.
    pub fn sample_indices<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        count: usize,
        adjacent: bool,
    ) -> Vec<u64> {
        if !adjacent {
            return (0..count).map(|_| self.sample_index(rng)).collect();
        }
        let span = self.record_count.saturating_sub(count as u64);
        let base = if span == 0 { 0 } else { rng.gen_range(0..span) };
        (base..base + count as u64).collect()
    }

    /// Check `key_for` on random ordered index pairs
    pub fn verify_monotonic<R: Rng + ?Sized>(&self, rng: &mut R, pairs: usize) -> BenchResult<()> {
        for _ in 0..pairs {
            let mut a = rng.gen_range(0..self.record_count);
            let mut b = rng.gen_range(0..self.record_count);
            if a > b {
                std::mem::swap(&mut a, &mut b);
            }
            if self.key_for(a) > self.key_for(b) {
                return Err(BenchError::config(format!(
                    "key mapping is not monotonic: key_for({}) > key_for({})",
                    a, b
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn model(
        record_count: u64,
        hot_key_fraction: f64,
        hot_traffic_fraction: f64,
    ) -> KeyAccessModel {
        KeyAccessModel::from_config(&WorkloadConfig {
            record_count,
            hot_key_fraction,
            hot_traffic_fraction,
            ..Default::default()
        })
    }

    #[test]
    fn test_force_hot_probability_scenario() {
        let fhp = force_hot_probability(0.01, 0.5);
        assert!((fhp - 0.49 / 0.99).abs() < 1e-12);
        assert!((fhp - 0.494_949_494_9).abs() < 1e-9);
    }

    #[test]
    fn test_key_format() {
        let m = KeyAccessModel::from_config(&WorkloadConfig {
            key_prefix: "rw/".to_string(),
            key_bytes: 20,
            ..Default::default()
        });
        assert_eq!(m.key_for(255), b"rw/00000000000000ff....".to_vec());
        assert_eq!(m.key_for(0).len(), 23);
    }

    #[test]
    fn test_range_for_covers_only_key_prefix() {
        let m = model(100, 0.0, 0.0);
        let range = m.range_for(5);
        assert!(range.contains(&m.key_for(5)));
        assert!(!range.contains(&m.key_for(6)));
        assert!(!range.contains(&m.key_for(4)));
    }

    #[test]
    fn test_uniform_sampling_stays_in_range() {
        let m = model(10, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            assert!(m.sample_index(&mut rng) < 10);
        }
    }

    #[test]
    fn test_hot_probability_law() {
        // H = 0.25, F = 0.5: hot set is every 4th index
        let m = model(1000, 0.25, 0.5);
        assert!((m.force_hot_probability() - 1.0 / 3.0).abs() < 1e-12);

        let mut rng = StdRng::seed_from_u64(42);
        let samples = 200_000;
        let hot = (0..samples)
            .filter(|_| m.sample_index(&mut rng) % 4 == 0)
            .count();
        let p_hot = hot as f64 / samples as f64;
        assert!((p_hot - 0.5).abs() < 0.01, "P(hot) = {}", p_hot);
    }

    #[test]
    fn test_adjacent_indices_are_contiguous() {
        let m = model(100, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let run = m.sample_indices(&mut rng, 10, true);
            assert_eq!(run.len(), 10);
            assert!(run.windows(2).all(|w| w[1] == w[0] + 1));
            assert!(run[0] < 90);
        }
    }

    #[test]
    fn test_adjacent_run_spanning_keyspace_starts_at_zero() {
        let m = model(5, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(m.sample_indices(&mut rng, 5, true), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_verify_monotonic_accepts_key_format() {
        let m = model(1_000_000, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(9);
        m.verify_monotonic(&mut rng, 30).unwrap();
    }

    proptest! {
        #[test]
        fn key_for_is_monotonic(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
            let m = model(10, 0.0, 0.0);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(m.key_for(lo) <= m.key_for(hi));
        }
    }
}
