//! Application key model.
//!
//! A tag's rotating application key is [`KEY_LEN`] bytes stored in the first
//! bytes of the managed sector's key block. Validity is derived, not stored:
//! the all-`0xFF` pattern is the factory/erased sentinel and is never a real
//! key, everything else issued by the engine is.

use zeroize::Zeroize;

use crate::hal::BLOCK_SIZE;

/// Length in bytes of a rotating application key.
pub const KEY_LEN: usize = 8;

/// Factory/erased byte pattern. A key block or EEPROM slot holding this
/// pattern has never been programmed by the engine.
const FACTORY_SENTINEL: [u8; KEY_LEN] = [0xFF; KEY_LEN];

/// Derived validity of an application key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Factory/erased sentinel; never accepted, never issued.
    Unprogrammed,
    /// A real key issued by this engine.
    Active,
}

/// A rotating application key: [`KEY_LEN`] bytes plus derived [`KeyState`].
///
/// The state is a single comparison against the factory sentinel, computed
/// at construction. Key bytes are zeroized on drop and redacted from
/// `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct AppKey {
    bytes: [u8; KEY_LEN],
    state: KeyState,
}

impl AppKey {
    /// Build a key from raw bytes, deriving its state.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        let state =
            if bytes == FACTORY_SENTINEL { KeyState::Unprogrammed } else { KeyState::Active };
        Self { bytes, state }
    }

    /// The factory/erased placeholder occupying an unused slot.
    pub fn unprogrammed() -> Self {
        Self { bytes: FACTORY_SENTINEL, state: KeyState::Unprogrammed }
    }

    /// Extract the key carried in a tag's key block (first [`KEY_LEN`]
    /// bytes; the remainder of the block is padding).
    pub fn from_block(block: &[u8; BLOCK_SIZE]) -> Self {
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&block[..KEY_LEN]);
        Self::from_bytes(bytes)
    }

    /// Render the key as a full tag block, padded with `0x00`.
    pub fn to_block(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        block[..KEY_LEN].copy_from_slice(&self.bytes);
        block
    }

    /// Raw key bytes.
    pub fn bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Derived state.
    pub fn state(&self) -> KeyState {
        self.state
    }

    /// Whether this is a real, engine-issued key.
    pub fn is_active(&self) -> bool {
        self.state == KeyState::Active
    }
}

impl std::fmt::Debug for AppKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key bytes must not leak into logs or panic messages.
        f.debug_struct("AppKey").field("state", &self.state).field("bytes", &"<redacted>").finish()
    }
}

impl Drop for AppKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}
