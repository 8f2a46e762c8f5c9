//! Named cache generations.
//!
//! `CacheStorage` mirrors the browser cache-storage subsystem: a set of named
//! caches, each mapping request keys to responses. Lookups across all caches
//! check them in creation order.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{CacheError, Result};

use super::types::Response;

#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create `name` if it does not exist.
    async fn open(&self, name: &str) -> Result<(), CacheError>;

    /// Names of all caches, oldest first.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Delete `name`; false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, CacheError>;

    /// Store `response` under `key` in `name`, creating the cache if needed.
    async fn put(&self, name: &str, key: &str, response: Response) -> Result<(), CacheError>;

    /// Exact-key lookup in one cache.
    async fn match_in(&self, name: &str, key: &str) -> Result<Option<Response>, CacheError>;

    /// Exact-key lookup across every cache.
    async fn match_any(&self, key: &str) -> Result<Option<Response>, CacheError>;
}

/// In-memory `CacheStorage`.
#[derive(Default)]
pub struct MemoryCacheStorage {
    caches: Mutex<Vec<(String, HashMap<String, Response>)>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in `name` (0 if missing).
    pub fn len_of(&self, name: &str) -> usize {
        self.caches
            .lock()
            .iter()
            .find(|(n, _)| n == name)
            .map_or(0, |(_, entries)| entries.len())
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<(), CacheError> {
        let mut caches = self.caches.lock();
        if !caches.iter().any(|(n, _)| n == name) {
            caches.push((name.to_string(), HashMap::new()));
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.caches.lock().iter().map(|(n, _)| n.clone()).collect())
    }

    async fn delete(&self, name: &str) -> Result<bool, CacheError> {
        let mut caches = self.caches.lock();
        let before = caches.len();
        caches.retain(|(n, _)| n != name);
        Ok(caches.len() != before)
    }

    async fn put(&self, name: &str, key: &str, response: Response) -> Result<(), CacheError> {
        let mut caches = self.caches.lock();
        match caches.iter_mut().find(|(n, _)| n == name) {
            Some((_, entries)) => {
                entries.insert(key.to_string(), response);
            }
            None => {
                let mut entries = HashMap::new();
                entries.insert(key.to_string(), response);
                caches.push((name.to_string(), entries));
            }
        }
        Ok(())
    }

    async fn match_in(&self, name: &str, key: &str) -> Result<Option<Response>, CacheError> {
        Ok(self
            .caches
            .lock()
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, entries)| entries.get(key).cloned()))
    }

    async fn match_any(&self, key: &str) -> Result<Option<Response>, CacheError> {
        Ok(self
            .caches
            .lock()
            .iter()
            .find_map(|(_, entries)| entries.get(key).cloned()))
    }
}
