//! Content hashing for stored objects.
//!
//! An object's identifier is the SHA-256 of its canonical serialization. The
//! canonical form is the `serde_json` encoding of the value: struct fields in
//! declaration order, no maps, integer timestamps. Stores keep exactly these
//! bytes, so any reader can re-verify an object against its key.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// 256-bit content digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hash([u8; 32]);

impl Hash {
    /// SHA-256 of raw bytes
    pub fn digest(content: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content);
        Hash(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex chars, for log lines and CLI output
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid hash '{0}': expected 64 hex characters")]
pub struct ParseHashError(String);

impl FromStr for Hash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| ParseHashError(s.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ParseHashError(s.to_string()))?;
        Ok(Hash(bytes))
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Canonical byte encoding of a value.
///
/// Serialization of the crate's own object types cannot fail; an error here
/// means a type with non-string map keys or similar was passed in, which is a
/// programming error.
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("object types always serialize to JSON")
}

/// Hash of a value's canonical serialization.
pub fn hash_value<T: Serialize + ?Sized>(value: &T) -> Hash {
    Hash::digest(&canonical_bytes(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_known_value() {
        // Known SHA-256 of "Hello, World!"
        let hash = Hash::digest(b"Hello, World!");
        assert_eq!(
            hash.to_hex(),
            "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
        );
        assert_eq!(hash.short(), "dffd6021");
    }

    #[test]
    fn test_parse_and_display() {
        let hash = Hash::digest(b"abc");
        let parsed: Hash = hash.to_string().parse().unwrap();
        assert_eq!(parsed, hash);

        assert!("xyz".parse::<Hash>().is_err());
        assert!("abcd".parse::<Hash>().is_err());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hash = Hash::digest(b"abc");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));

        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_hash_value_is_deterministic() {
        let a = hash_value(&vec!["x", "y"]);
        let b = hash_value(&vec!["x", "y"]);
        let c = hash_value(&vec!["y", "x"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
