//! Cache Store Module
//!
//! Contract for the shared key-value store backing the cache, plus an
//! in-process implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::cache::{MAX_KEY_LENGTH, MAX_VALUE_SIZE};
use crate::error::{CacheError, Result};

// == Cache Store Trait ==
/// Shared store holding cache records and guard markers.
///
/// Implementations must make [`CacheStore::compare_and_swap`] atomic with
/// respect to every other operation on the same key. All coordination between
/// callers and refresh workers relies on it.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the value under `key`, if any.
    async fn read(&self, key: &str) -> Result<Option<String>>;

    /// Overwrites the value under `key`.
    async fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Replaces the value under `key` with `new` only if it currently equals
    /// `expected`. `None` stands for "absent" on either side.
    ///
    /// Returns whether the swap happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> Result<bool>;

    /// Writes `value` only if `key` is absent.
    async fn write_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        self.compare_and_swap(key, None, Some(value)).await
    }
}

// == Memory Store ==
/// In-process store backed by a HashMap behind an async RwLock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // == Length ==
    /// Returns the number of keys currently stored.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    // == Is Empty ==
    /// Returns true if the store holds no keys.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    fn validate(key: &str, value: Option<&str>) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::InvalidRequest("Key cannot be empty".to_string()));
        }

        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::InvalidRequest(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }

        if value.is_some_and(|value| value.len() > MAX_VALUE_SIZE) {
            return Err(CacheError::InvalidRequest(format!(
                "Value exceeds maximum size of {} bytes",
                MAX_VALUE_SIZE
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        Self::validate(key, Some(value))?;
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> Result<bool> {
        Self::validate(key, new)?;

        // Check and swap under one write lock
        let mut entries = self.entries.write().await;
        if entries.get(key).map(String::as_str) != expected {
            return Ok(false);
        }

        match new {
            Some(value) => {
                entries.insert(key.to_string(), value.to_string());
            }
            None => {
                entries.remove(key);
            }
        }
        Ok(true)
    }
}
