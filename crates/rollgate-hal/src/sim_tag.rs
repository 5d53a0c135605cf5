//! Simulated MIFARE Classic 1K tag.
//!
//! Deterministic stand-in for the radio layer: 16 sectors of 4 blocks,
//! per-sector transport keys taken from the trailer block, factory state
//! with open (all-`0xFF`) keys. Models just enough of the access-control
//! behavior for protocol testing: reads authenticate under either
//! transport key, writes under key B only, trailer reads mask the key
//! areas.

use tracing::debug;

use rollgate_core::{BLOCK_SIZE, BLOCKS_PER_SECTOR, SECTOR_KEY_LEN, SectorKey, TagIo, TagIoError};

const SECTORS: usize = 16;
const TOTAL_BLOCKS: usize = SECTORS * BLOCKS_PER_SECTOR as usize;

/// Offset of key B within a trailer block.
const KEY_B_OFFSET: usize = BLOCK_SIZE - SECTOR_KEY_LEN;

/// Factory trailer: open keys, transport configuration access bits.
const FACTORY_TRAILER: [u8; BLOCK_SIZE] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // key A
    0xFF, 0x07, 0x80, 0x69, // access bytes
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, // key B
];

/// In-memory MIFARE Classic 1K tag.
///
/// Includes presence toggling and scheduled write failures for exercising
/// the engine's transport-failure paths, and a write counter for asserting
/// that an operation performed no tag I/O.
pub struct SimTag {
    blocks: [[u8; BLOCK_SIZE]; TOTAL_BLOCKS],
    present: bool,
    fail_writes: usize,
    write_attempts: usize,
}

impl SimTag {
    /// A factory-fresh tag: zeroed data blocks, open trailers.
    pub fn new() -> Self {
        let mut blocks = [[0u8; BLOCK_SIZE]; TOTAL_BLOCKS];
        for sector in 0..SECTORS {
            blocks[Self::trailer_index(sector)] = FACTORY_TRAILER;
        }
        Self { blocks, present: true, fail_writes: 0, write_attempts: 0 }
    }

    /// Simulate the tag entering or leaving the reader field.
    pub fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    /// Fail the next `count` write attempts with a transfer error.
    pub fn inject_write_failures(&mut self, count: usize) {
        self.fail_writes = count;
    }

    /// Number of write attempts seen, including failed ones.
    pub fn write_attempts(&self) -> usize {
        self.write_attempts
    }

    /// Raw block contents, bypassing authentication. Test oracle only.
    pub fn raw_block(&self, block: u8) -> &[u8; BLOCK_SIZE] {
        &self.blocks[block as usize]
    }

    /// Overwrite raw block contents, bypassing authentication. Test
    /// fixture only.
    pub fn set_raw_block(&mut self, block: u8, data: [u8; BLOCK_SIZE]) {
        self.blocks[block as usize] = data;
    }

    fn trailer_index(sector: usize) -> usize {
        sector * BLOCKS_PER_SECTOR as usize + (BLOCKS_PER_SECTOR as usize - 1)
    }

    fn transport_keys(&self, block: u8) -> (SectorKey, SectorKey) {
        let sector = block as usize / BLOCKS_PER_SECTOR as usize;
        let trailer = &self.blocks[Self::trailer_index(sector)];

        let mut key_a = [0u8; SECTOR_KEY_LEN];
        key_a.copy_from_slice(&trailer[..SECTOR_KEY_LEN]);
        let mut key_b = [0u8; SECTOR_KEY_LEN];
        key_b.copy_from_slice(&trailer[KEY_B_OFFSET..]);

        (SectorKey(key_a), SectorKey(key_b))
    }

    fn check_block(&self, block: u8) -> Result<(), TagIoError> {
        if !self.present {
            return Err(TagIoError::TagLost);
        }
        if block as usize >= TOTAL_BLOCKS {
            return Err(TagIoError::Transfer { block });
        }
        Ok(())
    }

    fn is_trailer(block: u8) -> bool {
        block % BLOCKS_PER_SECTOR == BLOCKS_PER_SECTOR - 1
    }
}

impl Default for SimTag {
    fn default() -> Self {
        Self::new()
    }
}

impl TagIo for SimTag {
    fn read_block(
        &mut self,
        block: u8,
        auth_key: &SectorKey,
    ) -> Result<[u8; BLOCK_SIZE], TagIoError> {
        self.check_block(block)?;

        let (key_a, key_b) = self.transport_keys(block);
        if *auth_key != key_a && *auth_key != key_b {
            return Err(TagIoError::AuthRejected { block });
        }

        let mut data = self.blocks[block as usize];
        if Self::is_trailer(block) {
            // The tag never discloses its transport keys.
            data[..SECTOR_KEY_LEN].fill(0x00);
            data[KEY_B_OFFSET..].fill(0x00);
        }
        Ok(data)
    }

    fn write_block(
        &mut self,
        block: u8,
        data: &[u8; BLOCK_SIZE],
        auth_key: &SectorKey,
    ) -> Result<(), TagIoError> {
        self.write_attempts += 1;
        self.check_block(block)?;

        if self.fail_writes > 0 {
            self.fail_writes -= 1;
            return Err(TagIoError::Transfer { block });
        }

        let (_, key_b) = self.transport_keys(block);
        if *auth_key != key_b {
            return Err(TagIoError::AuthRejected { block });
        }

        self.blocks[block as usize] = *data;
        if Self::is_trailer(block) {
            debug!(block, "trailer rewritten, transport keys updated");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: [u8; BLOCK_SIZE] = [0x42; BLOCK_SIZE];

    #[test]
    fn factory_tag_accepts_factory_key() {
        let mut tag = SimTag::new();
        assert_eq!(tag.read_block(4, &SectorKey::FACTORY_DEFAULT).unwrap(), [0u8; BLOCK_SIZE]);
        tag.write_block(4, &DATA, &SectorKey::FACTORY_DEFAULT).unwrap();
        assert_eq!(tag.read_block(4, &SectorKey::FACTORY_DEFAULT).unwrap(), DATA);
    }

    #[test]
    fn provisioned_sector_enforces_transport_keys() {
        let mut tag = SimTag::new();
        let key_a = SectorKey([0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5]);
        let key_b = SectorKey([0xB0, 0xB1, 0xB2, 0xB3, 0xB4, 0xB5]);

        let mut trailer = [0u8; BLOCK_SIZE];
        trailer[..SECTOR_KEY_LEN].copy_from_slice(&key_a.0);
        trailer[SECTOR_KEY_LEN..SECTOR_KEY_LEN + 4].copy_from_slice(&[0x78, 0x77, 0x88, 0x00]);
        trailer[KEY_B_OFFSET..].copy_from_slice(&key_b.0);
        tag.write_block(7, &trailer, &SectorKey::FACTORY_DEFAULT).unwrap();

        // The factory key no longer authenticates.
        assert_eq!(
            tag.read_block(4, &SectorKey::FACTORY_DEFAULT).unwrap_err(),
            TagIoError::AuthRejected { block: 4 }
        );

        // Reads under either key, writes only under key B.
        tag.read_block(4, &key_a).unwrap();
        tag.read_block(4, &key_b).unwrap();
        assert_eq!(
            tag.write_block(4, &DATA, &key_a).unwrap_err(),
            TagIoError::AuthRejected { block: 4 }
        );
        tag.write_block(4, &DATA, &key_b).unwrap();
    }

    #[test]
    fn trailer_reads_mask_transport_keys() {
        let mut tag = SimTag::new();
        let data = tag.read_block(3, &SectorKey::FACTORY_DEFAULT).unwrap();

        assert_eq!(&data[..SECTOR_KEY_LEN], &[0x00; SECTOR_KEY_LEN]);
        assert_eq!(&data[SECTOR_KEY_LEN..SECTOR_KEY_LEN + 4], &[0xFF, 0x07, 0x80, 0x69]);
        assert_eq!(&data[KEY_B_OFFSET..], &[0x00; SECTOR_KEY_LEN]);
    }

    #[test]
    fn absent_tag_fails_all_io() {
        let mut tag = SimTag::new();
        tag.set_present(false);

        assert_eq!(
            tag.read_block(4, &SectorKey::FACTORY_DEFAULT).unwrap_err(),
            TagIoError::TagLost
        );
        assert_eq!(
            tag.write_block(4, &DATA, &SectorKey::FACTORY_DEFAULT).unwrap_err(),
            TagIoError::TagLost
        );
    }

    #[test]
    fn injected_failures_consume_then_clear() {
        let mut tag = SimTag::new();
        tag.inject_write_failures(1);

        assert_eq!(
            tag.write_block(4, &DATA, &SectorKey::FACTORY_DEFAULT).unwrap_err(),
            TagIoError::Transfer { block: 4 }
        );
        tag.write_block(4, &DATA, &SectorKey::FACTORY_DEFAULT).unwrap();
        assert_eq!(tag.write_attempts(), 2);
    }

    #[test]
    fn out_of_range_block_is_a_transfer_error() {
        let mut tag = SimTag::new();
        assert_eq!(
            tag.read_block(64, &SectorKey::FACTORY_DEFAULT).unwrap_err(),
            TagIoError::Transfer { block: 64 }
        );
    }
}
