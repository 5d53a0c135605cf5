//! The rolling authentication engine.
//!
//! One engine instance manages one physical sector across all tags presented
//! to the reader. Control flow per presented tag:
//!
//! ```text
//! authenticate_tag:  fetch ──► validate ──► rotate
//! setup_tag:         reserve slot ──► provision trailer ──► rotate
//! ```
//!
//! Rotation commits tag-first, store-second: the key store is only mutated
//! after the tag write has succeeded, so a transport failure can never
//! desynchronize tag and reader. The inverse window (tag written, store
//! persist lost) is covered by the rotation journal in
//! [`KeyStore`](crate::store::KeyStore).

use tracing::{debug, info, warn};

use crate::{
    error::EngineError,
    hal::{BLOCK_SIZE, BLOCKS_PER_SECTOR, Eeprom, EntropySource, SECTOR_KEY_LEN, SectorKey, TagIo},
    key::AppKey,
    standby::StandbyKey,
    store::KeyStore,
};

/// Access bytes written to a provisioned sector trailer.
///
/// Encode access bits `0 1 1` for the trailer block (transport keys not
/// readable, access bits writable by the owner) and `1 0 0` for the three
/// data blocks (read with key A, write with key B).
const ACCESS_BYTES: [u8; 4] = [0x78, 0x77, 0x88, 0x00];

/// Rolling Authentication Engine over one managed sector.
///
/// Parameterized at construction with the sector index and the two fixed
/// transport keys: key A reads the key block, key B writes it. Both are
/// installed into the sector trailer when a tag is provisioned.
///
/// Single-threaded, one tag at a time; the engine exclusively owns its key
/// store and standby buffer.
pub struct RollingAuthEngine<T, E, S>
where
    T: TagIo,
    E: EntropySource,
    S: Eeprom,
{
    tag: T,
    store: KeyStore<S>,
    standby: StandbyKey<E>,
    sector: u8,
    read_key: SectorKey,
    write_key: SectorKey,
}

impl<T, E, S> RollingAuthEngine<T, E, S>
where
    T: TagIo,
    E: EntropySource,
    S: Eeprom,
{
    /// Create an engine managing `sector` with the given transport keys.
    ///
    /// Call [`init`](Self::init) before the first protocol operation.
    pub fn new(
        tag: T,
        entropy: E,
        eeprom: S,
        sector: u8,
        read_key: SectorKey,
        write_key: SectorKey,
    ) -> Self {
        Self {
            tag,
            store: KeyStore::new(eeprom),
            standby: StandbyKey::new(entropy),
            sector,
            read_key,
            write_key,
        }
    }

    /// Load persisted keys and prime the standby buffer.
    ///
    /// Idempotent at startup; a second call without intervening writes
    /// yields an identical store.
    pub fn init(&mut self) -> Result<(), EngineError> {
        self.store.load()?;
        self.standby.prime();
        info!(sector = self.sector, active = self.store.active_count(), "engine initialized");
        Ok(())
    }

    /// Authenticate the presented tag and rotate its key.
    ///
    /// Fetches the tag's application key, matches it against the store, and
    /// on a match rotates both tag and slot to a fresh unique key. Denials
    /// ([`EngineError::is_denial`]) are normal outcomes; any failure leaves
    /// the tag holding its pre-rotation key and the store unchanged.
    pub fn authenticate_tag(&mut self) -> Result<(), EngineError> {
        let presented = self.fetch_key()?;

        let slot = match self.store.find_match(&presented) {
            Some(slot) => slot,
            None => self.adopt_journaled(&presented)?.ok_or(EngineError::UnknownKey)?,
        };

        self.rotate_into(slot)?;
        info!(slot, sector = self.sector, "tag authenticated, key rotated");
        Ok(())
    }

    /// Provision a factory-fresh tag for this reader.
    ///
    /// Reserves a free slot (failing with [`EngineError::StoreFull`] before
    /// any tag I/O), rewrites the sector trailer with this engine's
    /// transport keys and access policy, then rotates the first application
    /// key into the reserved slot.
    ///
    /// A trailer write failure leaves the tag unprovisioned and retryable.
    /// A rotation failure after a provisioned trailer is not blindly
    /// retryable as a fresh setup: the trailer already holds our keys, so
    /// the caller should re-check tag state first.
    pub fn setup_tag(&mut self) -> Result<(), EngineError> {
        let slot = self
            .store
            .find_free_slot()
            .ok_or(EngineError::StoreFull { capacity: self.store.capacity() })?;

        self.provision_sector()?;
        self.rotate_into(slot)?;
        info!(slot, sector = self.sector, "tag provisioned");
        Ok(())
    }

    /// Administratively revoke the key in `slot`.
    ///
    /// Invalidates the slot (persisting the factory sentinel) so it becomes
    /// reusable by provisioning. The physical tag is not required and its
    /// trailer is left provisioned; the tag is simply denied from now on.
    ///
    /// A journal armed for the revoked slot is disarmed first: otherwise a
    /// tag stranded mid-rotation could re-enter the freed slot through
    /// journal adoption, undoing the revocation.
    pub fn remove_tag(&mut self, slot: usize) -> Result<(), EngineError> {
        let occupied = self
            .store
            .slot(slot)
            .ok_or(EngineError::SlotOutOfRange { slot, capacity: self.store.capacity() })?;
        if !occupied.is_active() {
            return Err(EngineError::SlotVacant { slot });
        }

        if let Some((journaled, _)) = self.store.journal()? {
            if journaled == slot {
                self.store.clear_journal()?;
            }
        }

        self.store.invalidate(slot)?;
        info!(slot, "slot revoked");
        Ok(())
    }

    /// Read-only view of the key store.
    pub fn key_store(&self) -> &KeyStore<S> {
        &self.store
    }

    /// Absolute index of the managed sector's key block.
    pub fn key_block(&self) -> u8 {
        self.sector * BLOCKS_PER_SECTOR
    }

    /// Absolute index of the managed sector's trailer block.
    pub fn trailer_block(&self) -> u8 {
        self.sector * BLOCKS_PER_SECTOR + (BLOCKS_PER_SECTOR - 1)
    }

    /// Read the presented tag's application key.
    ///
    /// Denies with [`EngineError::UnprogrammedKey`] if the key block holds
    /// the factory sentinel.
    fn fetch_key(&mut self) -> Result<AppKey, EngineError> {
        let block = self.tag.read_block(self.key_block(), &self.read_key)?;
        let key = AppKey::from_block(&block);
        if !key.is_active() {
            return Err(EngineError::UnprogrammedKey);
        }
        Ok(key)
    }

    /// Advance `slot` (and the tag) to a fresh unique key.
    fn rotate_into(&mut self, slot: usize) -> Result<(), EngineError> {
        // Draw until the candidate collides with no stored slot. Rejected
        // draws are discarded, never persisted.
        let mut candidate = self.standby.take();
        while self.store.find_match(&candidate).is_some() {
            debug!(slot, "standby key collided with a stored slot, redrawing");
            candidate = self.standby.take();
        }

        self.store.arm_journal(slot, &candidate)?;

        let key_block = self.key_block();
        if let Err(err) = self.tag.write_block(key_block, &candidate.to_block(), &self.write_key) {
            // Tag unchanged, so the journal record is stale; disarm it.
            // A failed disarm leaves a record whose key is on no tag, which
            // the journal's plausibility check treats as noise.
            let _ = self.store.clear_journal();
            return Err(err.into());
        }

        self.store.replace(slot, candidate)?;
        self.store.clear_journal()?;
        debug!(slot, "application key rotated");
        Ok(())
    }

    /// Recover from a rotation interrupted between tag write and store
    /// persist.
    ///
    /// If the presented key equals the journaled candidate, the tag
    /// received a key the store never learned. Adopt it into the journaled
    /// slot and continue as a normal match.
    fn adopt_journaled(&mut self, presented: &AppKey) -> Result<Option<usize>, EngineError> {
        let Some((slot, pending)) = self.store.journal()? else {
            return Ok(None);
        };
        if pending.bytes() != presented.bytes() {
            return Ok(None);
        }

        warn!(slot, "adopting journaled key after interrupted rotation");
        self.store.replace(slot, pending)?;
        self.store.clear_journal()?;
        Ok(Some(slot))
    }

    /// Rewrite the factory-fresh sector trailer with this engine's keys and
    /// access policy.
    fn provision_sector(&mut self) -> Result<(), EngineError> {
        let mut trailer = [0u8; BLOCK_SIZE];
        trailer[..SECTOR_KEY_LEN].copy_from_slice(&self.read_key.0);
        trailer[SECTOR_KEY_LEN..SECTOR_KEY_LEN + ACCESS_BYTES.len()]
            .copy_from_slice(&ACCESS_BYTES);
        trailer[BLOCK_SIZE - SECTOR_KEY_LEN..].copy_from_slice(&self.write_key.0);

        self.tag.write_block(self.trailer_block(), &trailer, &SectorKey::FACTORY_DEFAULT)?;
        debug!(sector = self.sector, "sector trailer provisioned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{EepromError, TagIoError},
        key::KEY_LEN,
        store::STORE_REGION_LEN,
    };

    /// One-sector fake tag that accepts any transport key.
    struct FakeTag {
        blocks: [[u8; BLOCK_SIZE]; BLOCKS_PER_SECTOR as usize],
        fail_writes: usize,
    }

    impl FakeTag {
        fn new() -> Self {
            Self { blocks: [[0xFF; BLOCK_SIZE]; BLOCKS_PER_SECTOR as usize], fail_writes: 0 }
        }
    }

    impl TagIo for FakeTag {
        fn read_block(
            &mut self,
            block: u8,
            _auth_key: &SectorKey,
        ) -> Result<[u8; BLOCK_SIZE], TagIoError> {
            Ok(self.blocks[block as usize % 4])
        }

        fn write_block(
            &mut self,
            block: u8,
            data: &[u8; BLOCK_SIZE],
            _auth_key: &SectorKey,
        ) -> Result<(), TagIoError> {
            if self.fail_writes > 0 {
                self.fail_writes -= 1;
                return Err(TagIoError::Transfer { block });
            }
            self.blocks[block as usize % 4] = *data;
            Ok(())
        }
    }

    struct VecEeprom {
        bytes: Vec<u8>,
    }

    impl Eeprom for VecEeprom {
        fn capacity(&self) -> usize {
            self.bytes.len()
        }

        fn read_byte(&mut self, address: usize) -> Result<u8, EepromError> {
            self.bytes.get(address).copied().ok_or(EepromError::OutOfRange {
                address,
                capacity: self.bytes.len(),
            })
        }

        fn write_byte(&mut self, address: usize, value: u8) -> Result<(), EepromError> {
            let capacity = self.bytes.len();
            let slot = self
                .bytes
                .get_mut(address)
                .ok_or(EepromError::OutOfRange { address, capacity })?;
            *slot = value;
            Ok(())
        }
    }

    /// Cycles through a scripted byte list, perturbing each pass so
    /// successive draws never repeat a key forever.
    struct ScriptedEntropy {
        script: Vec<u8>,
        cursor: usize,
    }

    impl EntropySource for ScriptedEntropy {
        fn random_byte(&mut self) -> u8 {
            let round = (self.cursor / self.script.len()) as u8;
            let byte = self.script[self.cursor % self.script.len()].wrapping_add(round);
            self.cursor += 1;
            byte
        }
    }

    fn engine_with_script(
        script: &[u8],
    ) -> RollingAuthEngine<FakeTag, ScriptedEntropy, VecEeprom> {
        let mut engine = RollingAuthEngine::new(
            FakeTag::new(),
            ScriptedEntropy { script: script.to_vec(), cursor: 0 },
            VecEeprom { bytes: vec![0xFF; STORE_REGION_LEN] },
            1,
            SectorKey([0xA0; 6]),
            SectorKey([0xB0; 6]),
        );
        engine.init().unwrap();
        engine
    }

    #[test]
    fn sector_geometry() {
        let engine = engine_with_script(&[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(engine.key_block(), 4);
        assert_eq!(engine.trailer_block(), 7);
    }

    #[test]
    fn setup_installs_trailer_and_first_key() {
        let mut engine = engine_with_script(&[1, 2, 3, 4, 5, 6, 7, 8]);
        engine.setup_tag().unwrap();

        // Trailer: read key, access bytes, write key.
        let trailer = engine.tag.blocks[3];
        assert_eq!(&trailer[..6], &[0xA0; 6]);
        assert_eq!(&trailer[6..10], &ACCESS_BYTES);
        assert_eq!(&trailer[10..], &[0xB0; 6]);

        // Key block matches slot 0 and is zero-padded.
        let slot0 = engine.key_store().slot(0).unwrap().clone();
        assert!(slot0.is_active());
        assert_eq!(&engine.tag.blocks[0][..KEY_LEN], slot0.bytes());
        assert_eq!(&engine.tag.blocks[0][KEY_LEN..], &[0u8; BLOCK_SIZE - KEY_LEN]);
    }

    #[test]
    fn colliding_standby_draws_are_discarded() {
        // Script yields key [1;8] twice, then [2;8]: after setup installs
        // [1;8]... the buffered standby is also [1;8], so rotation must
        // discard it and land on [2;8].
        let mut script = Vec::new();
        script.extend_from_slice(&[1; KEY_LEN]);
        script.extend_from_slice(&[1; KEY_LEN]);
        script.extend_from_slice(&[2; KEY_LEN]);
        script.extend_from_slice(&[3; KEY_LEN]);
        script.extend_from_slice(&[4; KEY_LEN]);
        let mut engine = engine_with_script(&script);

        engine.setup_tag().unwrap();
        assert_eq!(engine.key_store().slot(0).unwrap().bytes(), &[1; KEY_LEN]);

        engine.authenticate_tag().unwrap();
        let rotated = engine.key_store().slot(0).unwrap().clone();
        assert_eq!(rotated.bytes(), &[2; KEY_LEN]);
        assert_eq!(&engine.tag.blocks[0][..KEY_LEN], rotated.bytes());
    }

    #[test]
    fn failed_tag_write_leaves_store_and_journal_clean() {
        let mut engine = engine_with_script(&[1, 2, 3, 4, 5, 6, 7, 8]);
        engine.setup_tag().unwrap();
        let before = engine.key_store().slot(0).unwrap().clone();

        engine.tag.fail_writes = 1;
        let err = engine.authenticate_tag().unwrap_err();
        assert!(matches!(err, EngineError::Tag(TagIoError::Transfer { .. })));

        assert_eq!(engine.key_store().slot(0).unwrap(), &before);
        assert_eq!(&engine.tag.blocks[0][..KEY_LEN], before.bytes());
        assert_eq!(engine.store.journal().unwrap(), None);

        // The same tag authenticates fine on retry.
        engine.authenticate_tag().unwrap();
    }

    #[test]
    fn journaled_key_is_adopted_after_interrupted_rotation() {
        let mut engine = engine_with_script(&[1, 2, 3, 4, 5, 6, 7, 8]);
        engine.setup_tag().unwrap();

        // Simulate a crash between tag write and slot persist: the tag
        // holds `pending`, the journal is armed, the slot still holds the
        // old key.
        let pending = AppKey::from_bytes([0xCC; KEY_LEN]);
        engine.store.arm_journal(0, &pending).unwrap();
        engine.tag.blocks[0] = pending.to_block();

        engine.authenticate_tag().unwrap();

        // The journaled key was adopted into slot 0, then rotated away.
        assert_eq!(engine.store.journal().unwrap(), None);
        let current = engine.key_store().slot(0).unwrap();
        assert_eq!(&engine.tag.blocks[0][..KEY_LEN], current.bytes());
        assert_ne!(current.bytes(), pending.bytes());
    }

    #[test]
    fn stale_journal_does_not_admit_unknown_keys() {
        let mut engine = engine_with_script(&[1, 2, 3, 4, 5, 6, 7, 8]);
        engine.setup_tag().unwrap();

        engine.store.arm_journal(0, &AppKey::from_bytes([0xCC; KEY_LEN])).unwrap();
        engine.tag.blocks[0] = AppKey::from_bytes([0xDD; KEY_LEN]).to_block();

        let err = engine.authenticate_tag().unwrap_err();
        assert_eq!(err, EngineError::UnknownKey);
    }

    #[test]
    fn revocation_disarms_a_journal_for_the_revoked_slot() {
        let mut engine = engine_with_script(&[1, 2, 3, 4, 5, 6, 7, 8]);
        engine.setup_tag().unwrap();

        // Crash mid-rotation: the tag holds the journaled candidate, the
        // slot persist never happened.
        let pending = AppKey::from_bytes([0xCC; KEY_LEN]);
        engine.store.arm_journal(0, &pending).unwrap();
        engine.tag.blocks[0] = pending.to_block();

        engine.remove_tag(0).unwrap();

        // The stranded tag cannot ride the journal back into the freed slot.
        assert_eq!(engine.store.journal().unwrap(), None);
        assert_eq!(engine.authenticate_tag().unwrap_err(), EngineError::UnknownKey);
    }

    #[test]
    fn revocation_preserves_a_journal_for_another_slot() {
        let mut engine = engine_with_script(&[1, 2, 3, 4, 5, 6, 7, 8]);
        engine.setup_tag().unwrap();
        engine.setup_tag().unwrap();

        let pending = AppKey::from_bytes([0xCC; KEY_LEN]);
        engine.store.arm_journal(1, &pending).unwrap();

        engine.remove_tag(0).unwrap();
        assert_eq!(engine.store.journal().unwrap(), Some((1, pending)));
    }

    #[test]
    fn remove_tag_rejects_vacant_and_out_of_range_slots() {
        let mut engine = engine_with_script(&[1, 2, 3, 4, 5, 6, 7, 8]);

        assert_eq!(engine.remove_tag(3).unwrap_err(), EngineError::SlotVacant { slot: 3 });
        assert_eq!(
            engine.remove_tag(99).unwrap_err(),
            EngineError::SlotOutOfRange { slot: 99, capacity: 8 }
        );
    }
}
