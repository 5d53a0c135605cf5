//! In-memory EEPROM for testing and simulation.

use std::sync::{Arc, Mutex};

use rollgate_core::{Eeprom, EepromError};

/// In-memory byte region with EEPROM semantics: fresh state reads `0xFF`.
///
/// Clones share the underlying region via `Arc<Mutex<_>>`, which models one
/// physical part surviving engine restarts: build a second engine over a
/// clone and it sees the first engine's writes. Uses `lock().expect()`
/// which will panic if the mutex is poisoned, acceptable for
/// test/simulation code.
#[derive(Clone)]
pub struct MemoryEeprom {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemoryEeprom {
    /// Create an erased region of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self { bytes: Arc::new(Mutex::new(vec![0xFF; capacity])) }
    }

    /// Snapshot of the whole region.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. Acceptable for test code.
    #[allow(clippy::expect_used)]
    pub fn snapshot(&self) -> Vec<u8> {
        self.bytes.lock().expect("Mutex poisoned").clone()
    }
}

impl Eeprom for MemoryEeprom {
    #[allow(clippy::expect_used)]
    fn capacity(&self) -> usize {
        self.bytes.lock().expect("Mutex poisoned").len()
    }

    #[allow(clippy::expect_used)]
    fn read_byte(&mut self, address: usize) -> Result<u8, EepromError> {
        let bytes = self.bytes.lock().expect("Mutex poisoned");
        bytes
            .get(address)
            .copied()
            .ok_or(EepromError::OutOfRange { address, capacity: bytes.len() })
    }

    #[allow(clippy::expect_used)]
    fn write_byte(&mut self, address: usize, value: u8) -> Result<(), EepromError> {
        let mut bytes = self.bytes.lock().expect("Mutex poisoned");
        let capacity = bytes.len();
        let slot =
            bytes.get_mut(address).ok_or(EepromError::OutOfRange { address, capacity })?;
        *slot = value;
        Ok(())
    }
}
