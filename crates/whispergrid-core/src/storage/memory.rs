//! In-memory storage implementation.
//!
//! The reference [`Storage`](super::Storage) backend: a `HashMap` behind an
//! `Arc<Mutex<..>>`. Clones share state, so a client and a test harness can
//! observe the same records. Suitable for tests and ephemeral sessions;
//! durable backends implement the same trait over a real store.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::{Storage, StorageError, keys::StorageKey};

/// Shared-state in-memory key-value store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    records: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.records.lock().map_err(|_| StorageError::Io("storage mutex poisoned".to_string()))
    }
}

impl Storage for MemoryStorage {
    fn has(&self, key: &StorageKey) -> Result<bool, StorageError> {
        Ok(self.lock()?.contains_key(&key.to_string()))
    }

    fn get(&self, key: &StorageKey) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(&key.to_string()).cloned())
    }

    fn set(&self, key: &StorageKey, value: String) -> Result<(), StorageError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.lock()?.remove(&key.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use whispergrid_crypto::Thumbprint;

    fn key() -> StorageKey {
        StorageKey::Invitations(Thumbprint::parse("id-test").unwrap())
    }

    #[test]
    fn set_get_has_delete() {
        let storage = MemoryStorage::new();
        assert!(!storage.has(&key()).unwrap());

        storage.set(&key(), "value".to_string()).unwrap();
        assert!(storage.has(&key()).unwrap());
        assert_eq!(storage.get(&key()).unwrap().as_deref(), Some("value"));

        storage.delete(&key()).unwrap();
        assert!(!storage.has(&key()).unwrap());
        assert_eq!(storage.get(&key()).unwrap(), None);
    }

    #[test]
    fn clones_share_state() {
        let storage = MemoryStorage::new();
        let clone = storage.clone();

        storage.set(&key(), "shared".to_string()).unwrap();
        assert_eq!(clone.get(&key()).unwrap().as_deref(), Some("shared"));
    }

    #[test]
    fn append_grows_an_ordered_list() {
        let storage = MemoryStorage::new();
        storage.append(&key(), "a".to_string(), false).unwrap();
        storage.append(&key(), "b".to_string(), false).unwrap();
        storage.append(&key(), "a".to_string(), false).unwrap();

        assert_eq!(storage.get_list(&key()).unwrap(), vec!["a", "b", "a"]);
    }

    #[test]
    fn unique_append_skips_duplicates() {
        let storage = MemoryStorage::new();
        storage.append(&key(), "a".to_string(), true).unwrap();
        storage.append(&key(), "a".to_string(), true).unwrap();
        storage.append(&key(), "b".to_string(), true).unwrap();

        assert_eq!(storage.get_list(&key()).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn missing_list_reads_empty() {
        let storage = MemoryStorage::new();
        assert!(storage.get_list(&key()).unwrap().is_empty());
    }
}
