//! Hardware-abstraction implementations for the rollgate engine.
//!
//! Concrete collaborators behind the traits in `rollgate-core::hal`:
//!
//! - [`MemoryEeprom`]: Arc-shared in-memory region for tests and
//!   simulation.
//! - [`RedbEeprom`]: durable region backed by redb transactions.
//! - [`ChaoticEeprom`]: fault-injecting wrapper for chaos testing.
//! - [`SimTag`]: simulated MIFARE Classic 1K tag with trailer-derived
//!   transport keys.
//! - [`OsEntropy`] / [`SeededEntropy`]: OS and deterministic randomness.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod chaotic;
pub mod entropy;
pub mod memory;
pub mod redb;
pub mod sim_tag;

pub use chaotic::ChaoticEeprom;
pub use entropy::{OsEntropy, SeededEntropy};
pub use memory::MemoryEeprom;
pub use sim_tag::SimTag;

pub use self::redb::RedbEeprom;
