//! Hash chain generation and validation
//!
//! A chain of length `N` holds `N + 1` values: `v0` is the secret seed and
//! `v_{k+1} = H(v_k)`. The terminal value `v_N` is the public key. Heartbeat
//! `i` (1-based) reveals `v_{N - i}`, so the chain supports exactly `N`
//! heartbeats.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{HashbeatError, Result};
use crate::hash::{ChainValue, HashAlgorithm, DIGEST_LEN};

/// A fully materialised hash chain, seed first
#[derive(Clone)]
pub struct HashChain {
    algorithm: HashAlgorithm,
    values: Vec<ChainValue>,
}

impl std::fmt::Debug for HashChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashChain")
            .field("algorithm", &self.algorithm)
            .field("length", &self.length())
            .field("public_key", &self.public_key())
            .field("seed", &"[redacted]")
            .finish()
    }
}

impl HashChain {
    /// Build a chain of `length` links from an explicit seed
    pub fn generate(seed: ChainValue, length: usize, algorithm: HashAlgorithm) -> Result<Self> {
        if length == 0 {
            return Err(HashbeatError::InvalidChain(
                "chain length must be at least 1".into(),
            ));
        }

        let mut values = Vec::with_capacity(length + 1);
        values.push(seed);
        for _ in 0..length {
            let next = algorithm.hash(values[values.len() - 1].as_bytes());
            values.push(next);
        }

        Ok(Self { algorithm, values })
    }

    /// Build a chain from a random 256-bit seed drawn from the OS RNG
    pub fn random(length: usize, algorithm: HashAlgorithm) -> Result<Self> {
        let mut seed = [0u8; DIGEST_LEN];
        OsRng.fill_bytes(&mut seed);
        Self::generate(ChainValue::new(seed), length, algorithm)
    }

    /// Adopt existing values (seed first), checking every link
    pub fn from_values(values: Vec<ChainValue>, algorithm: HashAlgorithm) -> Result<Self> {
        if values.len() < 2 {
            return Err(HashbeatError::InvalidChain(format!(
                "a chain needs at least 2 values, got {}",
                values.len()
            )));
        }

        for (k, pair) in values.windows(2).enumerate() {
            if !pair[0].links_to(&pair[1], algorithm) {
                return Err(HashbeatError::InvalidChain(format!(
                    "value {} is not the hash of value {}",
                    k + 1,
                    k
                )));
            }
        }

        Ok(Self { algorithm, values })
    }

    /// Parse the on-disk format: concatenated 32-byte values, seed first
    pub fn from_bytes(bytes: &[u8], algorithm: HashAlgorithm) -> Result<Self> {
        if bytes.len() % DIGEST_LEN != 0 {
            return Err(HashbeatError::InvalidChain(format!(
                "chain data size {} is not a multiple of {}",
                bytes.len(),
                DIGEST_LEN
            )));
        }

        let values = bytes
            .chunks_exact(DIGEST_LEN)
            .map(ChainValue::from_slice)
            .collect::<Result<Vec<_>>>()?;

        Self::from_values(values, algorithm)
    }

    /// Serialize to the on-disk format
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.values.len() * DIGEST_LEN);
        for value in &self.values {
            out.extend_from_slice(value.as_bytes());
        }
        out
    }

    /// Number of links, which is also the number of heartbeats available
    pub fn length(&self) -> usize {
        self.values.len() - 1
    }

    /// Hash algorithm used to build the chain
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// The secret origin value `v0`
    pub fn seed(&self) -> &ChainValue {
        &self.values[0]
    }

    /// The terminal value `v_N`, registered with the access point
    pub fn public_key(&self) -> &ChainValue {
        &self.values[self.values.len() - 1]
    }

    /// Value at chain position `k` (`0` is the seed)
    pub fn value(&self, k: usize) -> Option<&ChainValue> {
        self.values.get(k)
    }

    /// Value revealed by heartbeat `i`, for `i` in `1..=length`
    pub fn reveal(&self, i: usize) -> Option<&ChainValue> {
        if i == 0 || i > self.length() {
            return None;
        }
        self.values.get(self.length() - i)
    }

    /// All values, seed first
    pub fn values(&self) -> &[ChainValue] {
        &self.values
    }
}
