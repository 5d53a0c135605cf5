//! Collaborator contracts the engine consumes.
//!
//! Trait-based abstraction over the hardware-facing layers: authenticated
//! tag block I/O, a rate-limited entropy feed, and a small byte-addressable
//! persistent region (EEPROM or equivalent). All traits are synchronous;
//! a stalled transport is the collaborator's problem, not the engine's.

use crate::error::{EepromError, TagIoError};

/// Bytes per MIFARE Classic block.
pub const BLOCK_SIZE: usize = 16;

/// Blocks per MIFARE Classic sector (1K layout).
pub const BLOCKS_PER_SECTOR: u8 = 4;

/// Length in bytes of a MIFARE sector transport key.
pub const SECTOR_KEY_LEN: usize = 6;

/// A 6-byte transport key used to authenticate the reader to a sector.
///
/// Distinct from the rotating [`AppKey`](crate::key::AppKey) stored *inside*
/// the sector: transport keys live in the sector trailer and are fixed for
/// the lifetime of a provisioned tag.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SectorKey(pub [u8; SECTOR_KEY_LEN]);

impl SectorKey {
    /// The transport key of a factory-fresh tag.
    pub const FACTORY_DEFAULT: Self = Self([0xFF; SECTOR_KEY_LEN]);
}

impl std::fmt::Debug for SectorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if *self == Self::FACTORY_DEFAULT {
            f.write_str("SectorKey(factory-default)")
        } else {
            f.write_str("SectorKey(<redacted>)")
        }
    }
}

/// Authenticated block I/O against the presented tag.
///
/// Implementations own the radio layer: anticollision, sector
/// authentication handshakes, and framing. The engine only sees whole
/// blocks and a pass/fail per operation.
pub trait TagIo {
    /// Authenticate to `block` with `auth_key` and read its 16 bytes.
    fn read_block(&mut self, block: u8, auth_key: &SectorKey)
    -> Result<[u8; BLOCK_SIZE], TagIoError>;

    /// Authenticate to `block` with `auth_key` and overwrite its 16 bytes.
    fn write_block(
        &mut self,
        block: u8,
        data: &[u8; BLOCK_SIZE],
        auth_key: &SectorKey,
    ) -> Result<(), TagIoError>;
}

/// A uniformly distributed random byte source.
///
/// May be rate-limited at the source; the call itself blocks until a byte
/// is available.
pub trait EntropySource {
    /// Draw one random byte.
    fn random_byte(&mut self) -> u8;
}

/// Byte-addressable persistent storage.
///
/// A fixed-size region used as the key store's persistence substrate.
/// Erased/fresh state reads as `0xFF` throughout, like real EEPROM.
pub trait Eeprom {
    /// Size of the region in bytes.
    fn capacity(&self) -> usize;

    /// Read one byte.
    ///
    /// # Invariants
    ///
    /// - `address < capacity()`, otherwise `EepromError::OutOfRange`
    fn read_byte(&mut self, address: usize) -> Result<u8, EepromError>;

    /// Write one byte.
    ///
    /// # Invariants
    ///
    /// - `address < capacity()`, otherwise `EepromError::OutOfRange`
    fn write_byte(&mut self, address: usize, value: u8) -> Result<(), EepromError>;

    /// Fill `buf` from consecutive addresses starting at `address`.
    fn read_bytes(&mut self, address: usize, buf: &mut [u8]) -> Result<(), EepromError> {
        for (offset, slot) in buf.iter_mut().enumerate() {
            *slot = self.read_byte(address + offset)?;
        }
        Ok(())
    }

    /// Write `bytes` to consecutive addresses starting at `address`.
    fn write_bytes(&mut self, address: usize, bytes: &[u8]) -> Result<(), EepromError> {
        for (offset, byte) in bytes.iter().enumerate() {
            self.write_byte(address + offset, *byte)?;
        }
        Ok(())
    }
}

// Mutable references delegate, so callers can lend a collaborator to the
// engine and keep inspecting it afterwards.
impl<T: TagIo + ?Sized> TagIo for &mut T {
    fn read_block(
        &mut self,
        block: u8,
        auth_key: &SectorKey,
    ) -> Result<[u8; BLOCK_SIZE], TagIoError> {
        (**self).read_block(block, auth_key)
    }

    fn write_block(
        &mut self,
        block: u8,
        data: &[u8; BLOCK_SIZE],
        auth_key: &SectorKey,
    ) -> Result<(), TagIoError> {
        (**self).write_block(block, data, auth_key)
    }
}

impl<E: EntropySource + ?Sized> EntropySource for &mut E {
    fn random_byte(&mut self) -> u8 {
        (**self).random_byte()
    }
}

impl<S: Eeprom + ?Sized> Eeprom for &mut S {
    fn capacity(&self) -> usize {
        (**self).capacity()
    }

    fn read_byte(&mut self, address: usize) -> Result<u8, EepromError> {
        (**self).read_byte(address)
    }

    fn write_byte(&mut self, address: usize, value: u8) -> Result<(), EepromError> {
        (**self).write_byte(address, value)
    }

    fn read_bytes(&mut self, address: usize, buf: &mut [u8]) -> Result<(), EepromError> {
        (**self).read_bytes(address, buf)
    }

    fn write_bytes(&mut self, address: usize, bytes: &[u8]) -> Result<(), EepromError> {
        (**self).write_bytes(address, bytes)
    }
}
