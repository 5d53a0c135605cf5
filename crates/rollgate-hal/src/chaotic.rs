//! Chaotic EEPROM wrapper for fault injection testing.
//!
//! Wraps another EEPROM and randomly fails operations at a configured
//! rate, to verify that the engine's commit ordering keeps tag and store
//! consistent under storage faults.

use rollgate_core::{Eeprom, EepromError};

/// EEPROM wrapper that randomly injects failures.
///
/// Delegates to an underlying implementation but fails operations with the
/// configured probability, driven by a seeded LCG so chaos runs are
/// reproducible.
pub struct ChaoticEeprom<E: Eeprom> {
    inner: E,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    rng: ChaoticRng,
    operation_count: usize,
}

/// Simple deterministic RNG for chaos injection.
///
/// Linear congruential generator: fast and reproducible with the same
/// seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate next random value [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }

    fn should_fail(&mut self, failure_rate: f64) -> bool {
        self.next() < failure_rate
    }
}

impl<E: Eeprom> ChaoticEeprom<E> {
    /// Create a chaotic wrapper with a default seed.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: E, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: E, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self { inner, failure_rate, rng: ChaoticRng::new(seed), operation_count: 0 }
    }

    /// Underlying EEPROM (for checking invariants after chaos).
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Total number of operations attempted, failed or not.
    pub fn operation_count(&self) -> usize {
        self.operation_count
    }

    fn roll(&mut self) -> Result<(), EepromError> {
        self.operation_count += 1;
        if self.rng.should_fail(self.failure_rate) {
            return Err(EepromError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<E: Eeprom> Eeprom for ChaoticEeprom<E> {
    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn read_byte(&mut self, address: usize) -> Result<u8, EepromError> {
        self.roll()?;
        self.inner.read_byte(address)
    }

    fn write_byte(&mut self, address: usize, value: u8) -> Result<(), EepromError> {
        self.roll()?;
        self.inner.write_byte(address, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEeprom;

    #[test]
    fn zero_failure_rate_never_fails() {
        let mut chaotic = ChaoticEeprom::new(MemoryEeprom::new(16), 0.0);

        for address in 0..16 {
            chaotic.write_byte(address, address as u8).unwrap();
            assert_eq!(chaotic.read_byte(address).unwrap(), address as u8);
        }
    }

    #[test]
    fn full_failure_rate_always_fails() {
        let mut chaotic = ChaoticEeprom::new(MemoryEeprom::new(16), 1.0);

        assert!(chaotic.write_byte(0, 0x42).is_err());
        assert!(chaotic.read_byte(0).is_err());
    }

    #[test]
    fn same_seed_same_failure_pattern() {
        let mut a = ChaoticEeprom::with_seed(MemoryEeprom::new(16), 0.5, 42);
        let mut b = ChaoticEeprom::with_seed(MemoryEeprom::new(16), 0.5, 42);

        for address in 0..16 {
            let result_a = a.write_byte(address, 0x11);
            let result_b = b.write_byte(address, 0x11);
            assert_eq!(result_a.is_ok(), result_b.is_ok(), "determinism violated at {address}");
        }
    }

    #[test]
    fn operations_reach_the_inner_region() {
        let inner = MemoryEeprom::new(16);
        let mut chaotic = ChaoticEeprom::new(inner.clone(), 0.0);

        chaotic.write_byte(5, 0x99).unwrap();
        assert_eq!(inner.snapshot()[5], 0x99);
        assert_eq!(chaotic.inner().snapshot()[5], 0x99);
        assert_eq!(chaotic.operation_count(), 1);
    }

    #[test]
    #[should_panic(expected = "failure_rate must be between 0.0 and 1.0")]
    fn rejects_invalid_failure_rate() {
        let _chaotic = ChaoticEeprom::new(MemoryEeprom::new(16), 1.5); // Invalid!
    }
}
