//! Key store: the reader's bounded set of currently-valid application keys.
//!
//! A fixed array of slots mirrored to a byte-addressable persistent region.
//! Slot `i` lives at byte offset `i * KEY_LEN`; validity is derived from the
//! byte pattern on load, so an erased region (all `0xFF`) deserializes to a
//! store of vacant slots rather than an error.
//!
//! After the slot region sits the rotation journal: a small record armed
//! before a rotation's tag write and cleared after the slot persist. It
//! closes the one window where a crash can leave the tag holding a key the
//! store never learned (see [`KeyStore::journal`]).

use tracing::debug;

use crate::{
    error::{EepromError, EngineError},
    hal::Eeprom,
    key::{AppKey, KEY_LEN},
};

/// Number of key slots (persistent slot region ÷ key length).
pub const SLOT_COUNT: usize = 8;

/// Bytes occupied by the slot region.
pub const SLOT_REGION_LEN: usize = SLOT_COUNT * KEY_LEN;

/// Total persistent region the store requires: slots + journal
/// (status byte, slot byte, candidate key).
pub const STORE_REGION_LEN: usize = SLOT_REGION_LEN + 2 + KEY_LEN;

/// Journal status byte meaning "a rotation is in flight".
const JOURNAL_ARMED: u8 = 0xA5;

const JOURNAL_STATUS_ADDR: usize = SLOT_REGION_LEN;
const JOURNAL_SLOT_ADDR: usize = SLOT_REGION_LEN + 1;
const JOURNAL_KEY_ADDR: usize = SLOT_REGION_LEN + 2;

/// In-memory mirror of the persisted key slots, plus the rotation journal.
///
/// # Invariants
///
/// - At most one slot holds any given byte pattern (enforced by the
///   rotation protocol's uniqueness re-draw, preserved by `replace`).
/// - `replace` is the only path that mutates persisted slot bytes, and each
///   write touches exactly one slot's byte range.
pub struct KeyStore<S: Eeprom> {
    slots: [AppKey; SLOT_COUNT],
    eeprom: S,
}

impl<S: Eeprom> KeyStore<S> {
    /// Create a store over `eeprom`. Slots start vacant; call
    /// [`load`](Self::load) to populate them from storage.
    pub fn new(eeprom: S) -> Self {
        Self { slots: std::array::from_fn(|_| AppKey::unprogrammed()), eeprom }
    }

    /// Load every slot from persistent storage, deriving validity from the
    /// byte pattern.
    ///
    /// Never fails on uninitialized storage: an erased region loads as all
    /// vacant slots. Idempotent when no writes intervene.
    pub fn load(&mut self) -> Result<(), EngineError> {
        let capacity = self.eeprom.capacity();
        if capacity < STORE_REGION_LEN {
            return Err(EngineError::RegionTooSmall { capacity, required: STORE_REGION_LEN });
        }

        for index in 0..SLOT_COUNT {
            let mut bytes = [0u8; KEY_LEN];
            self.eeprom.read_bytes(index * KEY_LEN, &mut bytes)?;
            self.slots[index] = AppKey::from_bytes(bytes);
        }

        debug!(active = self.active_count(), "key store loaded");
        Ok(())
    }

    /// First slot whose bytes equal `key`, skipping vacant slots.
    ///
    /// Equality is over the full key length; block padding never
    /// participates.
    pub fn find_match(&self, key: &AppKey) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.is_active() && slot.bytes() == key.bytes())
    }

    /// First vacant slot, in index order. Used only when provisioning a new
    /// tag.
    pub fn find_free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|slot| !slot.is_active())
    }

    /// Overwrite `slot` with `key`, persisting exactly that slot's bytes.
    ///
    /// # Invariants
    ///
    /// - Pre: the corresponding tag write has already succeeded (rotation
    ///   commits tag-first, store-second).
    pub fn replace(&mut self, slot: usize, key: AppKey) -> Result<(), EngineError> {
        self.check_slot(slot)?;
        self.eeprom.write_bytes(slot * KEY_LEN, key.bytes())?;
        self.slots[slot] = key;
        Ok(())
    }

    /// Persist the factory sentinel into `slot`, freeing it for reuse by
    /// [`find_free_slot`](Self::find_free_slot).
    pub fn invalidate(&mut self, slot: usize) -> Result<(), EngineError> {
        self.replace(slot, AppKey::unprogrammed())
    }

    /// Arm the rotation journal with the candidate about to be written to
    /// the tag.
    ///
    /// Armed before the tag write so that a crash after a successful tag
    /// write but before the slot persist leaves enough state to recover.
    pub fn arm_journal(&mut self, slot: usize, candidate: &AppKey) -> Result<(), EngineError> {
        self.check_slot(slot)?;
        self.eeprom.write_bytes(JOURNAL_KEY_ADDR, candidate.bytes())?;
        self.eeprom.write_byte(JOURNAL_SLOT_ADDR, slot as u8)?;
        self.eeprom.write_byte(JOURNAL_STATUS_ADDR, JOURNAL_ARMED)?;
        Ok(())
    }

    /// Disarm the rotation journal and scrub the whole record back to the
    /// erased pattern.
    ///
    /// Status first, so a fault mid-scrub still leaves the journal
    /// disarmed. Scrubbing the candidate bytes keeps rejected keys from
    /// lingering at rest.
    pub fn clear_journal(&mut self) -> Result<(), EepromError> {
        self.eeprom.write_byte(JOURNAL_STATUS_ADDR, 0xFF)?;
        self.eeprom.write_byte(JOURNAL_SLOT_ADDR, 0xFF)?;
        self.eeprom.write_bytes(JOURNAL_KEY_ADDR, &[0xFF; KEY_LEN])
    }

    /// The armed journal record `(slot, candidate)`, if any.
    ///
    /// Returns `None` when the journal is disarmed or holds an
    /// implausible record (slot out of range, sentinel candidate), which is
    /// how an erased region reads.
    pub fn journal(&mut self) -> Result<Option<(usize, AppKey)>, EepromError> {
        if self.eeprom.read_byte(JOURNAL_STATUS_ADDR)? != JOURNAL_ARMED {
            return Ok(None);
        }

        let slot = self.eeprom.read_byte(JOURNAL_SLOT_ADDR)? as usize;
        let mut bytes = [0u8; KEY_LEN];
        self.eeprom.read_bytes(JOURNAL_KEY_ADDR, &mut bytes)?;
        let candidate = AppKey::from_bytes(bytes);

        if slot >= SLOT_COUNT || !candidate.is_active() {
            return Ok(None);
        }

        Ok(Some((slot, candidate)))
    }

    /// The key occupying `slot`.
    pub fn slot(&self, slot: usize) -> Option<&AppKey> {
        self.slots.get(slot)
    }

    /// All slots, in index order.
    pub fn slots(&self) -> &[AppKey] {
        &self.slots
    }

    /// Total slot capacity.
    pub fn capacity(&self) -> usize {
        SLOT_COUNT
    }

    /// Number of slots currently holding an issued key.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_active()).count()
    }

    fn check_slot(&self, slot: usize) -> Result<(), EngineError> {
        if slot >= SLOT_COUNT {
            return Err(EngineError::SlotOutOfRange { slot, capacity: SLOT_COUNT });
        }
        Ok(())
    }
}
