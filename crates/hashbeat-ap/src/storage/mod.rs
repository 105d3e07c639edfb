//! Persistent key store abstraction
//!
//! The access point keeps session state in memory; the key store only records
//! each registered node's public key so that a restart does not force every
//! node to re-register. Any durable key-value backend that can put, get and
//! delete a 32-byte value by client id satisfies the contract.

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::MemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

use async_trait::async_trait;
use hashbeat_core::{ChainValue, HashbeatError};
use std::fmt::Debug;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl From<StorageError> for HashbeatError {
    fn from(err: StorageError) -> Self {
        HashbeatError::StorageFailure(err.to_string())
    }
}

/// Storage backend for registered public keys
///
/// Implementations must be thread-safe and support concurrent access.
#[async_trait]
pub trait KeyStore: Send + Sync + Debug {
    /// Store a node's public key, replacing any previous value
    async fn put(&self, client_id: &str, public_key: &ChainValue) -> Result<(), StorageError>;

    /// Fetch a node's public key
    async fn get(&self, client_id: &str) -> Result<Option<ChainValue>, StorageError>;

    /// Remove a node's public key; returns whether a value existed
    async fn delete(&self, client_id: &str) -> Result<bool, StorageError>;
}
