//! Key-Value Storage
//!
//! Persistent string storage backing the token store, with in-memory and
//! mock implementations.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{ClientError, StorageError};

/// Persistent key-value storage interface.
///
/// Implementations must apply `set_many` and `remove_many` as one unit: a
/// concurrent reader sees either none or all of the changes.
pub trait KeyValueStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Result<Option<String>, ClientError>;

    /// Write several values together.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), ClientError>;

    /// Remove several keys together. Missing keys are ignored.
    fn remove_many(&self, keys: &[&str]) -> Result<(), ClientError>;

    /// Write a single value.
    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.set_many(&[(key, value)])
    }

    /// Remove a single key.
    fn remove(&self, key: &str) -> Result<(), ClientError> {
        self.remove_many(&[key])
    }
}

/// In-memory storage. State lives as long as the store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    /// Create new in-memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), ClientError> {
        let mut map = self.entries();
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), ClientError> {
        let mut map = self.entries();
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// A recorded write against a [`MockStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    Set(Vec<(String, String)>),
    Remove(Vec<String>),
}

/// Mock storage for testing.
#[derive(Default)]
pub struct MockStore {
    entries: Mutex<HashMap<String, String>>,
    write_history: Mutex<Vec<StoreWrite>>,
    read_history: Mutex<Vec<String>>,
    next_error: Mutex<Option<ClientError>>,
    should_fail: Mutex<bool>,
}

impl MockStore {
    /// Create new mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set next error to return.
    pub fn set_next_error(&self, error: ClientError) -> &Self {
        *self.next_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error);
        self
    }

    /// Set storage to fail all operations.
    pub fn set_should_fail(&self, should_fail: bool) -> &Self {
        *self.should_fail.lock().unwrap_or_else(PoisonError::into_inner) = should_fail;
        self
    }

    /// Pre-populate a value without recording a write.
    pub fn add_entry(&self, key: &str, value: &str) -> &Self {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        self
    }

    /// Get write history.
    pub fn get_write_history(&self) -> Vec<StoreWrite> {
        self.write_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `set_many` calls that touched `key`.
    pub fn writes_to(&self, key: &str) -> usize {
        self.get_write_history()
            .iter()
            .filter(|w| match w {
                StoreWrite::Set(entries) => entries.iter().any(|(k, _)| k == key),
                StoreWrite::Remove(_) => false,
            })
            .count()
    }

    /// Get read history.
    pub fn get_read_history(&self) -> Vec<String> {
        self.read_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check_error(&self) -> Result<(), ClientError> {
        if *self.should_fail.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(ClientError::Storage(StorageError::Unavailable {
                message: "Mock storage failure".to_string(),
            }));
        }

        if let Some(error) = self
            .next_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            return Err(error);
        }

        Ok(())
    }
}

impl KeyValueStore for MockStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        self.check_error()?;

        self.read_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.to_string());
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), ClientError> {
        self.check_error()?;

        let owned: Vec<(String, String)> = entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in &owned {
            map.insert(key.clone(), value.clone());
        }
        self.write_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoreWrite::Set(owned));
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), ClientError> {
        self.check_error()?;

        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            map.remove(*key);
        }
        self.write_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoreWrite::Remove(
                keys.iter().map(|k| (*k).to_string()).collect(),
            ));
        Ok(())
    }
}

/// Create in-memory storage.
pub fn create_in_memory_store() -> InMemoryStore {
    InMemoryStore::new()
}

/// Create mock storage for testing.
pub fn create_mock_store() -> MockStore {
    MockStore::new()
}
