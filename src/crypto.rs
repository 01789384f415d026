//! Hash primitives consumed by the ledger.
//!
//! Signatures and address checksums belong to the wallet layer; the ledger
//! only needs SHA-256 rendered as lowercase hex.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest. Used for block hashes, transaction ids and
/// merkle nodes.
pub type HashHex = String;

/// Number of hex characters in a SHA-256 digest.
pub const HASH_HEX_LEN: usize = 64;

pub fn sha256_hex(data: &[u8]) -> HashHex {
    hex::encode(Sha256::digest(data))
}

/// Finish a running hasher and hex-encode the digest.
pub fn finalize_hex(hasher: Sha256) -> HashHex {
    hex::encode(hasher.finalize())
}

/// Feed a length-prefixed string so adjacent fields cannot run together.
pub fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(sha256_hex(b"").len(), HASH_HEX_LEN);
    }

    #[test]
    fn test_length_prefix_disambiguates() {
        let mut a = Sha256::new();
        update_str(&mut a, "ab");
        update_str(&mut a, "c");
        let mut b = Sha256::new();
        update_str(&mut b, "a");
        update_str(&mut b, "bc");
        assert_ne!(finalize_hex(a), finalize_hex(b));
    }
}
