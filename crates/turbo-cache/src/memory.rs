//! In-process store backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::store::{PersistentStore, Record, Transform};
use crate::StoreError;

/// Store backed by a process-local map.
///
/// Every [`atomic_update`](PersistentStore::atomic_update) runs under a single
/// lock, so updates to the same key are fully serialized. Useful for local
/// development and as the backend in tests.
///
/// # Example
///
/// ```rust,ignore
/// let store = MemoryStore::new();
/// store.set("player:1", record);
/// let record = store.read("player:1").await?;
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Record>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the record under `key`.
    pub fn get(&self, key: &str) -> Option<Record> {
        self.records().get(key).cloned()
    }

    /// Unconditionally store `record` under `key`.
    pub fn set(&self, key: impl Into<String>, record: Record) {
        self.records().insert(key.into(), record);
    }

    /// Delete the record under `key`, returning it if present.
    pub fn delete(&self, key: &str) -> Option<Record> {
        self.records().remove(key)
    }

    /// Check if a key exists in the store.
    pub fn exists(&self, key: &str) -> bool {
        self.records().contains_key(key)
    }

    /// Get all keys in the store, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.records().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, Record>> {
        // A panicking transform can't leave a half-written record behind.
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PersistentStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.get(key))
    }

    async fn atomic_update(
        &self,
        key: &str,
        transform: &Transform<'_>,
    ) -> Result<Record, StoreError> {
        let mut records = self.records();
        let current = records.get(key).cloned().unwrap_or_default();
        let next = transform(current);
        records.insert(key.to_string(), next.clone());
        Ok(next)
    }
}
