//! Redb-backed durable EEPROM.
//!
//! Persists the byte region in a redb table keyed by address, using redb's
//! ACID transactions for crash safety. An address with no row reads as
//! `0xFF`, matching erased-flash semantics, so a freshly created database
//! behaves exactly like a factory-fresh part.

use std::{path::Path, sync::Arc};

use redb::{Database, TableDefinition};

use rollgate_core::{Eeprom, EepromError};

/// Table: region bytes. Key: address, value: the byte at that address.
/// Absent rows read as `0xFF` (erased).
const REGION: TableDefinition<u32, u8> = TableDefinition::new("region");

/// Durable EEPROM backed by redb.
///
/// Clone is cheap (Arc); clones share the database, modeling one physical
/// part across engine restarts.
#[derive(Clone)]
pub struct RedbEeprom {
    db: Arc<Database>,
    capacity: usize,
}

impl RedbEeprom {
    /// Open or create a database at `path` exposing a `capacity`-byte
    /// region.
    pub fn open(path: impl AsRef<Path>, capacity: usize) -> Result<Self, EepromError> {
        let db = Database::create(path.as_ref()).map_err(|e| EepromError::Io(e.to_string()))?;

        let txn = db.begin_write().map_err(|e| EepromError::Io(e.to_string()))?;
        {
            let _ = txn.open_table(REGION).map_err(|e| EepromError::Io(e.to_string()))?;
        }
        txn.commit().map_err(|e| EepromError::Io(e.to_string()))?;

        Ok(Self { db: Arc::new(db), capacity })
    }

    fn check_span(&self, address: usize, len: usize) -> Result<(), EepromError> {
        let end = address + len;
        if end > self.capacity {
            return Err(EepromError::OutOfRange {
                address: end - 1,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

impl Eeprom for RedbEeprom {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read_byte(&mut self, address: usize) -> Result<u8, EepromError> {
        let mut byte = [0u8; 1];
        self.read_bytes(address, &mut byte)?;
        Ok(byte[0])
    }

    fn write_byte(&mut self, address: usize, value: u8) -> Result<(), EepromError> {
        self.write_bytes(address, &[value])
    }

    /// Ranged read in a single read transaction.
    fn read_bytes(&mut self, address: usize, buf: &mut [u8]) -> Result<(), EepromError> {
        self.check_span(address, buf.len())?;

        let txn = self.db.begin_read().map_err(|e| EepromError::Io(e.to_string()))?;
        let table = txn.open_table(REGION).map_err(|e| EepromError::Io(e.to_string()))?;

        for (offset, slot) in buf.iter_mut().enumerate() {
            let row = table
                .get((address + offset) as u32)
                .map_err(|e| EepromError::Io(e.to_string()))?;
            *slot = row.map_or(0xFF, |guard| guard.value());
        }

        Ok(())
    }

    /// Ranged write committed as one transaction.
    fn write_bytes(&mut self, address: usize, bytes: &[u8]) -> Result<(), EepromError> {
        self.check_span(address, bytes.len())?;

        let txn = self.db.begin_write().map_err(|e| EepromError::Io(e.to_string()))?;
        {
            let mut table = txn.open_table(REGION).map_err(|e| EepromError::Io(e.to_string()))?;
            for (offset, byte) in bytes.iter().enumerate() {
                table
                    .insert((address + offset) as u32, *byte)
                    .map_err(|e| EepromError::Io(e.to_string()))?;
            }
        }
        txn.commit().map_err(|e| EepromError::Io(e.to_string()))?;

        Ok(())
    }
}
