//! Rollgate: rolling-key mutual authentication for MIFARE Classic tags.
//!
//! Every successful authentication rotates the tag's secret application
//! key, so a captured or cloned tag cannot be replayed indefinitely. The
//! reader keeps a bounded, persisted store of currently-valid keys.
//!
//! # Key lifecycle
//!
//! ```text
//! Entropy ──► Standby Key (buffered one ahead)
//!                  │ take, re-draw until unique
//!                  ▼
//!          Rotation candidate
//!                  │ 1. arm journal
//!                  │ 2. write tag key block   (transport key B)
//!                  │ 3. persist store slot
//!                  │ 4. clear journal
//!                  ▼
//!          Current tag key ──► matched on next presentation (key A read)
//! ```
//!
//! The commit order is tag-first, store-second: a failed tag write leaves
//! both sides on the old key. The inverse window (tag written, persist
//! lost) is closed by the rotation journal, which lets the next
//! authentication adopt the key the tag already holds.
//!
//! # Collaborators
//!
//! The engine is generic over three hardware-facing traits in [`hal`]:
//! authenticated tag block I/O, an entropy feed, and a byte-addressable
//! persistent region. Implementations live in `rollgate-hal`.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod engine;
pub mod error;
pub mod hal;
pub mod key;
pub mod standby;
pub mod store;

pub use engine::RollingAuthEngine;
pub use error::{EepromError, EngineError, TagIoError};
pub use hal::{BLOCK_SIZE, BLOCKS_PER_SECTOR, Eeprom, EntropySource, SECTOR_KEY_LEN, SectorKey, TagIo};
pub use key::{AppKey, KEY_LEN, KeyState};
pub use standby::StandbyKey;
pub use store::{KeyStore, SLOT_COUNT, STORE_REGION_LEN};
