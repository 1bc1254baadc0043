//! Randomness source for simulated stream metrics

use std::fmt::Debug;
use std::ops::RangeInclusive;
use std::sync::Mutex;

/// Uniform integer sampling
pub trait MetricSampler: Send + Sync + Debug {
    /// A value in `range`, inclusive on both ends
    fn sample(&self, range: RangeInclusive<u32>) -> u32;
}

/// Sampler backed by `fastrand`
#[derive(Debug)]
pub struct FastrandSampler {
    rng: Mutex<fastrand::Rng>,
}

impl Default for FastrandSampler {
    fn default() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }
}

impl FastrandSampler {
    /// Sampler with a fixed seed, producing the same sequence every run
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }
}

impl MetricSampler for FastrandSampler {
    fn sample(&self, range: RangeInclusive<u32>) -> u32 {
        let low = *range.start();
        match self.rng.lock() {
            Ok(mut rng) => rng.u32(range),
            Err(_) => low,
        }
    }
}
