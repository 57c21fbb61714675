//! Storage abstraction for the WhisperGrid engine.
//!
//! A namespaced key-value contract: the protocol engine reads and writes
//! everything (identity records, invitations, thread state, message logs)
//! through this narrow interface, so any backend (browser storage, an
//! embedded database, a test harness map) can host a grid.
//!
//! The trait is synchronous: every engine operation is a sequential
//! computation and the contract stays Sans-IO. Values are strings (JSON
//! text for structured records), matching what every deployed backend
//! stores.

mod error;
mod keys;
mod memory;

pub use error::StorageError;
pub use keys::StorageKey;
pub use memory::MemoryStorage;

/// Namespaced key-value store.
///
/// # Clone semantics
///
/// Implementations share internal state across clones (typically via
/// `Arc`), so a client and its caller can observe one store.
///
/// # Invariants
///
/// - `set` then `get` of the same key returns the stored value.
/// - `append` treats the value under a key as a growable ordered list;
///   with `unique`, a value already present is not appended again.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Whether a key holds a value.
    fn has(&self, key: &StorageKey) -> Result<bool, StorageError>;

    /// Read a value.
    fn get(&self, key: &StorageKey) -> Result<Option<String>, StorageError>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &StorageKey, value: String) -> Result<(), StorageError>;

    /// Remove a key.
    fn delete(&self, key: &StorageKey) -> Result<(), StorageError>;

    /// Append to the ordered list stored under `key`.
    ///
    /// The list is stored as a JSON array of strings. With `unique`, an
    /// already-present value is left alone (no duplicate entry).
    fn append(&self, key: &StorageKey, value: String, unique: bool) -> Result<(), StorageError> {
        let mut list = self.get_list(key)?;
        if unique && list.contains(&value) {
            return Ok(());
        }
        list.push(value);
        self.set(key, serde_json::to_string(&list)?)
    }

    /// Read the ordered list stored under `key`; missing keys read empty.
    fn get_list(&self, key: &StorageKey) -> Result<Vec<String>, StorageError> {
        match self.get(key)? {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(Vec::new()),
        }
    }
}
