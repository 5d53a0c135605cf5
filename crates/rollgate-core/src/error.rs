//! Error types for the rolling-key engine.
//!
//! Strongly-typed errors per layer: tag transport, EEPROM persistence, and
//! the protocol itself. Denials (a tag that simply isn't valid) are normal
//! outcomes and are distinguished from faults via
//! [`EngineError::is_denial`].

use thiserror::Error;

/// Errors surfaced by the tag block I/O collaborator.
///
/// The engine treats all variants as equally fatal for the current protocol
/// step; the split exists for diagnostics only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TagIoError {
    /// Sector authentication with the supplied key was rejected.
    #[error("authentication to block {block} rejected")]
    AuthRejected {
        /// Absolute block index the reader tried to authenticate to.
        block: u8,
    },

    /// No tag in the field, or the tag left mid-operation.
    #[error("tag not present")]
    TagLost,

    /// Read/write transfer failed (communication or checksum error).
    #[error("transfer to block {block} failed")]
    Transfer {
        /// Absolute block index the transfer targeted.
        block: u8,
    },
}

/// Errors surfaced by the persistent byte storage collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EepromError {
    /// Address falls outside the fixed storage region.
    #[error("address {address} out of range (capacity {capacity})")]
    OutOfRange {
        /// Offending address.
        address: usize,
        /// Size of the region in bytes.
        capacity: usize,
    },

    /// Underlying storage I/O failure.
    #[error("storage io error: {0}")]
    Io(String),
}

/// Errors from the engine's public surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Tag transport failure; recoverable by re-presenting the tag.
    #[error("tag io: {0}")]
    Tag(#[from] TagIoError),

    /// Key store persistence failure.
    #[error("key store persistence: {0}")]
    Eeprom(#[from] EepromError),

    /// The presented tag's key block holds the factory sentinel.
    #[error("tag presented an unprogrammed key block")]
    UnprogrammedKey,

    /// The presented key matches no stored slot.
    #[error("presented key matches no stored slot")]
    UnknownKey,

    /// No free slot remains for provisioning a new tag.
    #[error("key store full ({capacity} slots)")]
    StoreFull {
        /// Total slot capacity of the store.
        capacity: usize,
    },

    /// Slot index outside the store.
    #[error("slot {slot} out of range (capacity {capacity})")]
    SlotOutOfRange {
        /// Requested slot index.
        slot: usize,
        /// Total slot capacity of the store.
        capacity: usize,
    },

    /// Operation requires an in-use slot but the slot is unprogrammed.
    #[error("slot {slot} is vacant")]
    SlotVacant {
        /// Requested slot index.
        slot: usize,
    },

    /// The persistent region is smaller than the key store layout needs.
    #[error("storage region too small: {capacity} bytes, need {required}")]
    RegionTooSmall {
        /// Size of the region in bytes.
        capacity: usize,
        /// Minimum size the store layout requires.
        required: usize,
    },
}

impl EngineError {
    /// Returns true if this is a normal "access denied" outcome rather than
    /// a fault.
    ///
    /// Denials mean the presented tag is simply not valid for this reader.
    /// Everything else (transport, persistence, capacity) indicates a
    /// condition the operator may need to act on.
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::UnprogrammedKey | Self::UnknownKey)
    }
}
