//! In-memory `BlobStore`.

use std::collections::HashMap;
use std::sync::RwLock;

use labtrail_contracts::error::{LabtrailError, LabtrailResult};

use crate::traits::BlobStore;

/// Keeps blobs in a map. Writing an existing key replaces its bytes.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored keys in lexical order.
    pub fn keys(&self) -> LabtrailResult<Vec<String>> {
        let blobs = self.blobs.read().map_err(|e| LabtrailError::Storage {
            reason: format!("blob store lock poisoned: {}", e),
        })?;
        let mut keys: Vec<String> = blobs.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

impl BlobStore for InMemoryBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> LabtrailResult<()> {
        let mut blobs = self.blobs.write().map_err(|e| LabtrailError::Storage {
            reason: format!("blob store lock poisoned: {}", e),
        })?;
        blobs.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> LabtrailResult<Option<Vec<u8>>> {
        let blobs = self.blobs.read().map_err(|e| LabtrailError::Storage {
            reason: format!("blob store lock poisoned: {}", e),
        })?;
        Ok(blobs.get(key).cloned())
    }
}
