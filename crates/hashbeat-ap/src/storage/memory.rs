//! In-memory storage backend
//!
//! Default key store using a hashmap. Suitable for development and tests;
//! data is lost on restart.

use async_trait::async_trait;
use hashbeat_core::ChainValue;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

use super::{KeyStore, StorageError};

/// In-memory key store implementation
#[derive(Debug, Default)]
pub struct MemoryStore {
    keys: RwLock<HashMap<String, ChainValue>>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyStore for MemoryStore {
    async fn put(&self, client_id: &str, public_key: &ChainValue) -> Result<(), StorageError> {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        debug!(client_id = %client_id, "Storing public key");
        keys.insert(client_id.to_string(), *public_key);
        Ok(())
    }

    async fn get(&self, client_id: &str) -> Result<Option<ChainValue>, StorageError> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.get(client_id).copied())
    }

    async fn delete(&self, client_id: &str) -> Result<bool, StorageError> {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        let removed = keys.remove(client_id).is_some();
        if removed {
            debug!(client_id = %client_id, "Deleted public key");
        }
        Ok(removed)
    }
}
