//! Random sources for weighted draws
//!
//! The selector draws through the `RandomSource` trait so that tests can
//! replay exact draw sequences and distribution checks are reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Source of uniform random integers, shared across concurrent selections
pub trait RandomSource: Send + Sync {
    /// Uniform integer in `[0, upper)`. Callers guarantee `upper > 0`.
    fn next_below(&self, upper: u64) -> u64;
}

/// Thread-local generator from `rand`; the production default
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_below(&self, upper: u64) -> u64 {
        rand::rng().random_range(0..upper)
    }
}

/// Seeded generator producing a reproducible stream
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_below(&self, upper: u64) -> u64 {
        // A poisoned lock still holds a usable generator
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random_range(0..upper)
    }
}

/// Replays a fixed list of values, cycling when exhausted
///
/// Each value is reduced modulo the requested bound.
pub struct SequenceRandom {
    values: Vec<u64>,
    position: AtomicUsize,
}

impl SequenceRandom {
    pub fn new(values: Vec<u64>) -> Self {
        Self {
            values,
            position: AtomicUsize::new(0),
        }
    }

    /// Always yields `value`
    pub fn fixed(value: u64) -> Self {
        Self::new(vec![value])
    }
}

impl RandomSource for SequenceRandom {
    fn next_below(&self, upper: u64) -> u64 {
        if self.values.is_empty() {
            return 0;
        }
        let position = self.position.fetch_add(1, Ordering::AcqRel);
        self.values[position % self.values.len()] % upper
    }
}
