//! In-memory artifact store for tests

use crate::{validate_key, StoreError};
use quarry_domain::traits::ArtifactStore;
use quarry_domain::ArtifactKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Artifact store backed by a map of JSON strings
///
/// Artifacts go through a real serde round trip, so tests see the same
/// encoding behavior as the file and SQLite backends.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    artifacts: Mutex<HashMap<ArtifactKey, String>>,
}

impl MemoryArtifactStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw text at `key`, bypassing serialization
    pub fn insert_raw(&self, key: ArtifactKey, body: impl Into<String>) -> Result<(), StoreError> {
        self.artifacts
            .lock()
            .map_err(|_| StoreError::Lock)?
            .insert(key, body.into());
        Ok(())
    }

    /// Remove an artifact
    pub fn remove(&self, key: &ArtifactKey) -> Result<bool, StoreError> {
        Ok(self
            .artifacts
            .lock()
            .map_err(|_| StoreError::Lock)?
            .remove(key)
            .is_some())
    }

    /// Number of stored artifacts
    pub fn len(&self) -> usize {
        self.artifacts.lock().map(|a| a.len()).unwrap_or(0)
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for MemoryArtifactStore {
    type Error = StoreError;

    fn save<T: Serialize>(&self, key: &ArtifactKey, record: &T) -> Result<(), Self::Error> {
        validate_key(key)?;
        let body = serde_json::to_string(record)?;
        self.insert_raw(key.clone(), body)
    }

    fn load<T: DeserializeOwned>(&self, key: &ArtifactKey) -> Result<Option<T>, Self::Error> {
        validate_key(key)?;
        let artifacts = self.artifacts.lock().map_err(|_| StoreError::Lock)?;
        match artifacts.get(key) {
            Some(body) => Ok(Some(serde_json::from_str(body)?)),
            None => Ok(None),
        }
    }

    fn exists(&self, key: &ArtifactKey) -> Result<bool, Self::Error> {
        validate_key(key)?;
        Ok(self
            .artifacts
            .lock()
            .map_err(|_| StoreError::Lock)?
            .contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_domain::RowRange;

    #[test]
    fn test_corrupt_artifact_is_an_error() {
        let store = MemoryArtifactStore::new();
        let key = ArtifactKey::chunk("S", RowRange::new(0, 30));
        store.insert_raw(key.clone(), "{ not json").unwrap();

        let result: Result<Option<Vec<u8>>, _> = store.load(&key);
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[test]
    fn test_remove() {
        let store = MemoryArtifactStore::new();
        let key = ArtifactKey::metadata("S");
        store.save(&key, &"x").unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.remove(&key).unwrap());
        assert!(store.is_empty());
    }
}
