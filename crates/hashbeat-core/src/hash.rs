//! One-way digest functions and the chain value type
//!
//! Both sides of the protocol must agree on the algorithm; a node hashing with
//! SHA-256 can never be verified by an access point configured for BLAKE2b.

use blake2::{digest::consts::U32, Blake2b};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::{HashbeatError, Result};

/// Digest length in bytes for every supported algorithm
pub const DIGEST_LEN: usize = 32;

type Blake2b256 = Blake2b<U32>;

/// Hash function used for chain links and authenticators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// SHA-256 (matches the reference sender)
    #[default]
    #[serde(rename = "sha256")]
    Sha256,
    /// BLAKE2b truncated to 256 bits
    #[serde(rename = "blake2b-256")]
    Blake2b256,
}

impl HashAlgorithm {
    /// Configuration identifier for this algorithm
    pub fn identifier(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Blake2b256 => "blake2b-256",
        }
    }

    /// H(data)
    pub fn hash(&self, data: &[u8]) -> ChainValue {
        self.hash_parts(&[data])
    }

    /// H(parts[0] || parts[1] || ...) without building the concatenation
    pub fn hash_parts(&self, parts: &[&[u8]]) -> ChainValue {
        match self {
            HashAlgorithm::Sha256 => ChainValue(digest_parts::<Sha256>(parts)),
            HashAlgorithm::Blake2b256 => ChainValue(digest_parts::<Blake2b256>(parts)),
        }
    }

    /// H(H(data)), used to detect a single lost heartbeat
    pub fn double_hash(&self, data: &[u8]) -> ChainValue {
        let once = self.hash(data);
        self.hash(once.as_bytes())
    }
}

fn digest_parts<D: Digest>(parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&hasher.finalize()[..DIGEST_LEN]);
    out
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for HashAlgorithm {
    type Err = HashbeatError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "blake2b-256" | "blake2b256" => Ok(HashAlgorithm::Blake2b256),
            other => Err(HashbeatError::UnsupportedHashAlgorithm(other.to_string())),
        }
    }
}

/// A single 256-bit value on a hash chain
///
/// Also used for authenticators, which share the digest width.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainValue([u8; DIGEST_LEN]);

impl ChainValue {
    /// Wrap raw digest bytes
    pub const fn new(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse from a slice that must be exactly 32 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| {
            HashbeatError::MalformedMessage(format!(
                "chain value must be {} bytes, got {}",
                DIGEST_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Parse from exactly 64 hex characters
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != DIGEST_LEN * 2 {
            return Err(HashbeatError::MalformedMessage(format!(
                "chain value must be {} hex characters, got {}",
                DIGEST_LEN * 2,
                s.len()
            )));
        }
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }

    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Whether `H(self) == anchor`, i.e. `self` immediately precedes `anchor`
    pub fn links_to(&self, anchor: &ChainValue, algorithm: HashAlgorithm) -> bool {
        algorithm.hash(&self.0) == *anchor
    }
}

impl AsRef<[u8]> for ChainValue {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; DIGEST_LEN]> for ChainValue {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ChainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ChainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainValue({})", self.to_hex())
    }
}
