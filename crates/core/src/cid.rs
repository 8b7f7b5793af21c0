//! Content identifiers
//!
//! Every persisted blob is keyed by the SHA-256 of its bytes. CIDs are kept
//! binary (32 bytes); hex is a display concern only.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 32-byte binary SHA-256 content identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cid(pub [u8; 32]);

impl Cid {
    /// Hash `bytes` into a CID.
    pub fn digest(bytes: &[u8]) -> Cid {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Cid(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Parse a CID from a 32-byte slice.
    pub fn from_slice(bytes: &[u8]) -> Option<Cid> {
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Cid(arr))
    }
}

impl std::fmt::Display for Cid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Cid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Full hex is noise in traces; the first 8 bytes identify a blob
        // as well as the loader's cache hash does.
        write!(f, "Cid({}..)", hex::encode(&self.0[..8]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_matches_sha256() {
        // sha256("abc")
        let cid = Cid::digest(b"abc");
        assert_eq!(
            cid.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_is_deterministic() {
        assert_eq!(Cid::digest(b"weft"), Cid::digest(b"weft"));
        assert_ne!(Cid::digest(b"weft"), Cid::digest(b"warp"));
    }

    #[test]
    fn test_from_slice_length_check() {
        assert!(Cid::from_slice(&[0u8; 32]).is_some());
        assert!(Cid::from_slice(&[0u8; 31]).is_none());
    }
}
