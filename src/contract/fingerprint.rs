//! Content fingerprints for change detection.
//!
//! A fingerprint is the length plus SHA-256 of the file contents, so
//! rewriting identical bytes is not a change while any content edit is.

use std::fmt;

use sha2::{Digest, Sha256};

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    len: u64,
    digest: [u8; 32],
}

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(bytes));
        Self {
            len: bytes.len() as u64,
            digest,
        }
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.len, hex::encode(&self.digest[..6]))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_bytes_same_fingerprint() {
        assert_eq!(Fingerprint::of(b"contract-v1"), Fingerprint::of(b"contract-v1"));
        assert_ne!(Fingerprint::of(b"contract-v1"), Fingerprint::of(b"contract-v2"));
    }

    #[test]
    fn test_display_is_short() {
        let rendered = Fingerprint::of(b"").to_string();
        assert_eq!(rendered, "0:e3b0c44298fc");
        assert!(Fingerprint::of(b"").is_empty());
    }
}
