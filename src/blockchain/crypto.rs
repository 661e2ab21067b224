use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;

use std::fmt;

/// Length in characters of a hex-encoded SHA-256 digest
pub const SHA256_HEX_LEN: usize = 64;

/// One-way digest used to seal blocks
///
/// Implementations must be deterministic and return lowercase hex so that
/// the proof-of-work prefix check is meaningful.
pub trait HashFunction: fmt::Debug + Send + Sync {
    /// Hashes the given bytes and returns the hex-encoded digest
    fn digest(&self, data: &[u8]) -> String;

    /// Number of characters every digest produced by this function has
    fn digest_len(&self) -> usize;
}

/// SHA-256 backed hash function
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Hasher;

impl HashFunction for Sha256Hasher {
    fn digest(&self, data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    fn digest_len(&self) -> usize {
        SHA256_HEX_LEN
    }
}

/// Represents a participant address on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Address(pub String);

impl Address {
    /// Creates an address from anything string-like
    pub fn new(address: impl Into<String>) -> Self {
        Address(address.into())
    }

    /// Returns the address as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        let digest = Sha256Hasher.digest(b"abc");
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(digest.len(), Sha256Hasher.digest_len());
    }

    #[test]
    fn test_digest_is_deterministic() {
        let first = Sha256Hasher.digest(b"ledger");
        let second = Sha256Hasher.digest(b"ledger");
        assert_eq!(first, second);
        assert_ne!(first, Sha256Hasher.digest(b"ledger!"));
    }

    #[test]
    fn test_address_conversions() {
        let address: Address = "andrew".into();
        assert_eq!(address.as_str(), "andrew");
        assert_eq!(address.to_string(), "andrew");
        assert_eq!(address, Address::new(String::from("andrew")));
        assert!(Address::new("  ").is_empty());
    }
}
