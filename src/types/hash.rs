//! 32-byte SHA3-256 digest used to seal program images.

use crate::types::encoding::EncodeSink;
use provrb_derive::BinaryCodec;
use sha3::{Digest, Sha3_256};
use std::fmt;

/// SHA3-256 digest length in bytes.
pub const HASH_LEN: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, BinaryCodec, Default)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Creates an incremental SHA3-256 builder.
    pub fn sha3() -> HashBuilder {
        HashBuilder::new()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Incremental SHA3-256 hash builder.
///
/// Implements [`EncodeSink`] so encodable values can be hashed directly.
pub struct HashBuilder {
    hasher: Sha3_256,
}

impl HashBuilder {
    pub fn new() -> Self {
        Self {
            hasher: Sha3_256::new(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

impl Default for HashBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeSink for HashBuilder {
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_matches_reference_digest() {
        let hash = Hash::sha3().finalize();
        assert_eq!(
            hash.to_string(),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    #[test]
    fn chunked_updates_match_single_update() {
        let mut chunked = Hash::sha3();
        chunked.update(b"a");
        chunked.update(b"bc");
        let chunked = chunked.finalize();

        let mut whole = Hash::sha3();
        whole.update(b"abc");
        assert_eq!(chunked, whole.finalize());
        assert_eq!(
            chunked.to_string(),
            "3a985da74fe225b2045c172d6bd390bd855f086e3e9d525b46bfe24511431532"
        );
    }
}
