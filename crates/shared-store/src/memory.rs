//! # In-Memory Store
//!
//! Reference backend for [`SharedStore`]. Every command takes the lock once,
//! which gives the same per-command atomicity the real store guarantees.

use crate::store::{pattern_matches, SharedStore, StoreError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Inner {
    values: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
    queues: HashMap<String, VecDeque<Vec<u8>>>,
}

impl Inner {
    /// Union of all live keys, whatever kind of value they hold.
    fn all_keys(&self) -> impl Iterator<Item = &String> {
        self.values
            .keys()
            .chain(self.hashes.keys())
            .chain(self.queues.keys())
    }
}

/// In-memory implementation of the shared store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Command("store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Command("store lock poisoned".into()))
    }
}

#[async_trait]
impl SharedStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read()?.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write()?.values.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .all_keys()
            .filter(|k| pattern_matches(pattern, k))
            .cloned()
            .collect())
    }

    async fn hget(&self, hash: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .read()?
            .hashes
            .get(hash)
            .and_then(|h| h.get(field))
            .cloned())
    }

    async fn hset(&self, hash: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.write()?
            .hashes
            .entry(hash.to_owned())
            .or_default()
            .insert(field.to_owned(), value.to_owned());
        Ok(())
    }

    async fn hvals(&self, hash: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .read()?
            .hashes
            .get(hash)
            .map(|h| h.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn lpush(&self, queue: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.write()?
            .queues
            .entry(queue.to_owned())
            .or_default()
            .push_front(value);
        Ok(())
    }

    async fn rpush(&self, queue: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.write()?
            .queues
            .entry(queue.to_owned())
            .or_default()
            .push_back(value);
        Ok(())
    }

    async fn lpop(&self, queue: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut inner = self.write()?;
        let Some(q) = inner.queues.get_mut(queue) else {
            return Ok(None);
        };
        let value = q.pop_front();
        if q.is_empty() {
            // An empty queue and a missing queue are indistinguishable.
            inner.queues.remove(queue);
        }
        Ok(value)
    }

    async fn del(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        for key in keys {
            inner.values.remove(key);
            inner.hashes.remove(key);
            inner.queues.remove(key);
        }
        Ok(())
    }
}
