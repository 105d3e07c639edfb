//! Chain files on disk
//!
//! The chain file holds every value concatenated in generation order, seed
//! first. The public key file holds the terminal value as one hex line so it
//! can be handed to an operator or pasted into a registration request.

use hashbeat_core::{ChainValue, HashAlgorithm, HashChain};
use std::path::Path;
use tracing::debug;

use crate::error::Result;

/// Write `chain` to `path`, replacing any existing file
pub async fn save_chain(path: impl AsRef<Path>, chain: &HashChain) -> Result<()> {
    let path = path.as_ref();
    tokio::fs::write(path, chain.to_bytes()).await?;
    debug!(path = %path.display(), length = chain.length(), "Chain saved");
    Ok(())
}

/// Read and verify a chain file
pub async fn load_chain(path: impl AsRef<Path>, algorithm: HashAlgorithm) -> Result<HashChain> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    Ok(HashChain::from_bytes(&bytes, algorithm)?)
}

/// Write a public key as a hex line
pub async fn save_public_key(path: impl AsRef<Path>, public_key: &ChainValue) -> Result<()> {
    tokio::fs::write(path.as_ref(), format!("{}\n", public_key.to_hex())).await?;
    Ok(())
}

/// Read a public key written by [`save_public_key`]
pub async fn load_public_key(path: impl AsRef<Path>) -> Result<ChainValue> {
    let text = tokio::fs::read_to_string(path.as_ref()).await?;
    Ok(ChainValue::from_hex(text.trim())?)
}
