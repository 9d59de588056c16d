//! State Digests
//!
//! Provides a stable fingerprint of a game snapshot for:
//! - Convergence checks between the two peers
//! - Compact state identifiers in logs

use sha2::{Sha256, Digest};

/// Digest output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Domain separator for game state digests.
pub const STATE_DOMAIN: &[u8] = b"VOCAB_DUEL_STATE_V1";

/// Hasher with a domain separator.
///
/// Wraps SHA-256. Order of updates matters.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for game state.
    pub fn for_game_state() -> Self {
        Self::new(STATE_DOMAIN)
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Digest a bincode-encodable value under the game state domain.
///
/// The encoded length is hashed ahead of the bytes so that two encodings
/// sharing a prefix never collide trivially.
pub fn digest_encoded<T: serde::Serialize>(value: &T) -> Result<StateHash, bincode::Error> {
    let bytes = bincode::serialize(value)?;
    let mut hasher = StateHasher::for_game_state();
    hasher.update_u32(bytes.len() as u32);
    hasher.update_bytes(&bytes);
    Ok(hasher.finalize())
}

/// Short hex prefix of a digest, for log lines.
pub fn short_hex(hash: &StateHash) -> String {
    hex::encode(&hash[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable() {
        let a = digest_encoded(&("ANA", 3u32)).unwrap();
        let b = digest_encoded(&("ANA", 3u32)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_digest_changes_with_value() {
        let a = digest_encoded(&("ANA", 3u32)).unwrap();
        let b = digest_encoded(&("ANA", 4u32)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_domain_separation() {
        let mut h1 = StateHasher::new(b"A");
        h1.update_bytes(b"data");
        let mut h2 = StateHasher::new(b"B");
        h2.update_bytes(b"data");
        assert_ne!(h1.finalize(), h2.finalize());
    }

    #[test]
    fn test_short_hex_length() {
        let hash = [0xab; 32];
        assert_eq!(short_hex(&hash), "abababababab");
    }
}
