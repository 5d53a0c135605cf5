//! Entropy source implementations.
//!
//! `OsEntropy` feeds the engine from the operating system's CSPRNG;
//! `SeededEntropy` replays a deterministic ChaCha stream for reproducible
//! tests and simulation.

use rand::{RngCore, SeedableRng, rngs::OsRng};
use rand_chacha::ChaCha8Rng;

use rollgate_core::EntropySource;

/// Operating-system randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn random_byte(&mut self) -> u8 {
        OsRng.next_u32() as u8
    }
}

/// Deterministic seeded randomness for tests and simulation.
///
/// Same seed, same byte stream.
#[derive(Debug, Clone)]
pub struct SeededEntropy {
    rng: ChaCha8Rng,
}

impl SeededEntropy {
    /// Create a stream from `seed`.
    pub fn new(seed: u64) -> Self {
        Self { rng: ChaCha8Rng::seed_from_u64(seed) }
    }
}

impl EntropySource for SeededEntropy {
    fn random_byte(&mut self) -> u8 {
        self.rng.next_u32() as u8
    }
}
