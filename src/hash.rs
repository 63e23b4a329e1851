//! Key hashing used for shard routing and index lookups.

use xxhash_rust::xxh3::xxh3_64;

/// Deterministic 64-bit hash of a key. Collision resistance is not assumed; the shard's
/// collision-check mode is the actual defence against hash collisions.
pub trait Hasher: Send + Sync {
    fn sum64(&self, key: &[u8]) -> u64;
}

/// Default hasher: xxh3, matching the non-cryptographic fast hash the teacher's
/// dependency stack already carries for cache routing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Xxh3Hasher;

impl Hasher for Xxh3Hasher {
    fn sum64(&self, key: &[u8]) -> u64 {
        xxh3_64(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let h = Xxh3Hasher;
        assert_eq!(h.sum64(b"hello"), h.sum64(b"hello"));
        assert_ne!(h.sum64(b"hello"), h.sum64(b"world"));
    }
}
