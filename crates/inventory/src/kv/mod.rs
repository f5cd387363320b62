//! Minimal key-value capability the inventory is written against.
//!
//! The shape follows what a Redis server offers (strings, hashes, lists and a
//! cursor-based keyspace scan) so that [`RedisStore`] is a thin adapter and
//! [`MemoryStore`] can stand in for it in tests and local runs.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StoreError;

pub mod memory;
pub mod redis_backend;

pub use self::memory::MemoryStore;
pub use self::redis_backend::RedisStore;

/// Cursor value that starts a scan and that marks a completed one.
pub const SCAN_START: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    None,
    String,
    Hash,
    List,
}

impl KeyType {
    /// Parses the reply of the Redis `TYPE` command.
    pub fn from_redis(name: &str) -> Self {
        match name {
            "string" => KeyType::String,
            "hash" => KeyType::Hash,
            "list" => KeyType::List,
            _ => KeyType::None,
        }
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// All fields of a hash; empty when the key does not exist.
    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    /// Overwrites the given fields, leaving the others untouched.
    async fn set_hash(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Returns true when a key was actually removed.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Appends to the tail of a list and returns the new length.
    async fn list_append(&self, key: &str, value: &str) -> Result<usize, StoreError>;

    /// Inclusive range; negative indices count from the tail (`0, -1` is the whole list).
    async fn list_range(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError>;

    /// One page of keys starting with `prefix`.
    ///
    /// Start with [`SCAN_START`] and keep feeding the returned cursor back in
    /// until it comes back as [`SCAN_START`]. A page may be empty while the
    /// scan is still in progress.
    async fn scan_prefix(
        &self,
        prefix: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StoreError>;

    async fn key_type(&self, key: &str) -> Result<KeyType, StoreError>;
}

/// Drains a prefix scan to completion.
pub async fn scan_all(store: &dyn KvStore, prefix: &str, page: usize) -> Result<Vec<String>, StoreError> {
    let mut cursor = SCAN_START;
    let mut keys = Vec::new();
    loop {
        let (next, batch) = store.scan_prefix(prefix, cursor, page).await?;
        keys.extend(batch);
        if next == SCAN_START {
            break;
        }
        cursor = next;
    }
    Ok(keys)
}

/// Resolves Redis-style inclusive range bounds against a list length.
pub(crate) fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_bounds_follow_redis_semantics() {
        assert_eq!(resolve_range(5, 0, -1), Some((0, 4)));
        assert_eq!(resolve_range(5, 1, 2), Some((1, 2)));
        assert_eq!(resolve_range(5, -2, -1), Some((3, 4)));
        assert_eq!(resolve_range(5, 3, 100), Some((3, 4)));
        assert_eq!(resolve_range(5, 4, 2), None);
        assert_eq!(resolve_range(0, 0, -1), None);
        assert_eq!(resolve_range(3, 7, 9), None);
    }

    #[test]
    fn redis_type_names_map_to_key_types() {
        assert_eq!(KeyType::from_redis("hash"), KeyType::Hash);
        assert_eq!(KeyType::from_redis("list"), KeyType::List);
        assert_eq!(KeyType::from_redis("string"), KeyType::String);
        assert_eq!(KeyType::from_redis("none"), KeyType::None);
        assert_eq!(KeyType::from_redis("zset"), KeyType::None);
    }
}
