//! Reservoir-sampling percentile estimator
//!
//! Keeps a uniform sample of at most `capacity` values out of everything
//! added, plus the exact minimum and maximum.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Default reservoir capacity
pub const SAMPLE_SIZE: usize = 10_000;

/// Bounded uniform sample of a value stream
#[derive(Debug, Clone)]
pub struct ContinuousSample {
    samples: Vec<f64>,
    capacity: usize,
    population: u64,
    min: f64,
    max: f64,
    rng: StdRng,
}

impl ContinuousSample {
    /// Create an empty sample holding at most `capacity` values
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_entropy())
    }

    /// Like [`ContinuousSample::new`] with a deterministic replacement stream
    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        Self {
            samples: Vec::with_capacity(capacity.min(1024)),
            capacity: capacity.max(1),
            population: 0,
            min: 0.0,
            max: 0.0,
            rng,
        }
    }

    /// Add a value
    ///
    /// Once the reservoir is full, the value replaces a random slot with
    /// probability `capacity / population`.
    pub fn add_sample(&mut self, value: f64) {
        if self.population == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.population += 1;

        if self.samples.len() < self.capacity {
            self.samples.push(value);
        } else {
            let slot = self.rng.gen_range(0..self.population);
            if (slot as usize) < self.capacity {
                self.samples[slot as usize] = value;
            }
        }
    }

    /// Values added since the last clear
    pub fn population(&self) -> u64 {
        self.population
    }

    /// Values currently held
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if nothing was added since the last clear
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Mean of the held values, 0 when empty
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Median of the held values
    pub fn median(&self) -> f64 {
        self.percentile(0.5)
    }

    /// Value at fraction `p` of the sorted held values, 0 when empty
    pub fn percentile(&self, p: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted = self.samples.clone();
        sorted.sort_by(f64::total_cmp);
        let idx = ((p.clamp(0.0, 1.0) * sorted.len() as f64) as usize).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Smallest value ever added, 0 when empty
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest value ever added, 0 when empty
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Drop every value
    pub fn clear(&mut self) {
        self.samples.clear();
        self.population = 0;
        self.min = 0.0;
        self.max = 0.0;
    }
}

impl Default for ContinuousSample {
    fn default() -> Self {
        Self::new(SAMPLE_SIZE)
    }
}
