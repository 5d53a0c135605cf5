//! Standby key generation.
//!
//! True-random bits arrive slowly (tens of bits per second on typical
//! entropy hardware), so the engine never generates a key on the
//! authentication path. One candidate is always buffered ahead of need;
//! taking it immediately queues generation of the next.

use crate::{
    hal::EntropySource,
    key::{AppKey, KEY_LEN},
};

/// Holds the next key to be issued and the entropy source that refills it.
///
/// # Invariants
///
/// - After [`prime`](Self::prime) (or the first [`take`](Self::take)), the
///   buffer always holds an active key, never the factory sentinel.
pub struct StandbyKey<E: EntropySource> {
    entropy: E,
    buffered: AppKey,
}

impl<E: EntropySource> StandbyKey<E> {
    /// Create an unprimed buffer over `entropy`.
    pub fn new(entropy: E) -> Self {
        Self { entropy, buffered: AppKey::unprogrammed() }
    }

    /// Fill the buffer if it is empty. Idempotent; called once at engine
    /// startup.
    pub fn prime(&mut self) {
        if !self.buffered.is_active() {
            self.buffered = Self::generate(&mut self.entropy);
        }
    }

    /// Hand out the buffered key and immediately buffer a fresh one.
    ///
    /// The returned key is always active. Uniqueness against the key store
    /// is *not* checked here; the rotation protocol re-takes until unique.
    pub fn take(&mut self) -> AppKey {
        self.prime();
        std::mem::replace(&mut self.buffered, Self::generate(&mut self.entropy))
    }

    /// Draw a full key's worth of random bytes, redrawing whole keys until
    /// the result is not the factory sentinel.
    fn generate(entropy: &mut E) -> AppKey {
        loop {
            let mut bytes = [0u8; KEY_LEN];
            for byte in &mut bytes {
                *byte = entropy.random_byte();
            }

            let key = AppKey::from_bytes(bytes);
            if key.is_active() {
                return key;
            }
            // All eight bytes came up 0xFF: the one draw that collides with
            // the factory sentinel. Discard it whole.
        }
    }
}
