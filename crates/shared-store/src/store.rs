//! # Store Port
//!
//! Command-level interface to the shared key-value store.

use async_trait::async_trait;
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Store unreachable: {0}")]
    Unreachable(String),

    /// A command failed on the store side.
    #[error("Store command failed: {0}")]
    Command(String),
}

/// The store commands the orchestration core consumes.
///
/// Key patterns accepted by [`keys`](SharedStore::keys) use `*` as the only
/// wildcard (the forms actually issued are `<name>:*` and `*:<pid>`). A key
/// is visible to `keys` regardless of whether it holds a plain value, a hash,
/// or a queue.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Get a plain value.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Set a plain value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// List keys matching a `*`-wildcard pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Get one field of a hash.
    async fn hget(&self, hash: &str, field: &str) -> Result<Option<String>, StoreError>;

    /// Set one field of a hash.
    async fn hset(&self, hash: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// All values of a hash, in unspecified order.
    async fn hvals(&self, hash: &str) -> Result<Vec<String>, StoreError>;

    /// Push to the head of a queue.
    async fn lpush(&self, queue: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Push to the tail of a queue.
    async fn rpush(&self, queue: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Pop from the head of a queue, `None` when empty.
    async fn lpop(&self, queue: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Delete keys of any kind. Unknown keys are ignored.
    async fn del(&self, keys: &[String]) -> Result<(), StoreError>;
}

/// Match a key against a `*`-wildcard pattern.
///
/// `*` matches any run of characters, including the empty run.
#[must_use]
pub(crate) fn pattern_matches(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == key;
    }

    let mut rest = key;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(tail) => rest = tail,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(pos) => rest = &rest[pos + part.len()..],
                None => return false,
            }
        }
    }
    // Pattern ended with `*`.
    true
}
