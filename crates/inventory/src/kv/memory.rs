use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;

use super::{resolve_range, KeyType, KvStore, SCAN_START};
use crate::error::StoreError;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    List(Vec<String>),
}

/// Open cursors kept before the oldest is forgotten.
const MAX_OPEN_SCANS: usize = 1024;

#[derive(Default)]
struct ScanCursors {
    next_id: u64,
    // cursor id -> last key handed out; ids only grow, so the first entry is the oldest
    resume_after: BTreeMap<u64, String>,
}

/// In-process [`KvStore`] for tests and single-node dev runs.
///
/// Scan cursors remember the last key returned, so keys added or removed
/// between pages never cause a surviving key to be skipped. Only the most
/// recent open scans are remembered; resuming an evicted cursor fails with
/// a backend error.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<String, Value>>,
    cursors: Mutex<ScanCursors>,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("memory store lock poisoned".to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        self.data.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let data = self.data.read().map_err(poisoned)?;
        match data.get(key) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(poisoned)?;
        data.insert(key.to_string(), Value::Str(value.to_string()));
        Ok(())
    }

    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let data = self.data.read().map_err(poisoned)?;
        match data.get(key) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(h)) => Ok(h.clone()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn set_hash(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        let mut data = self.data.write().map_err(poisoned)?;
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(HashMap::new()));
        let Value::Hash(hash) = entry else {
            return Err(StoreError::WrongType(key.to_string()));
        };
        for (field, value) in fields {
            hash.insert((*field).to_string(), value.clone());
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(data.contains_key(key))
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut data = self.data.write().map_err(poisoned)?;
        Ok(data.remove(key).is_some())
    }

    async fn list_append(&self, key: &str, value: &str) -> Result<usize, StoreError> {
        let mut data = self.data.write().map_err(poisoned)?;
        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| Value::List(Vec::new()));
        let Value::List(list) = entry else {
            return Err(StoreError::WrongType(key.to_string()));
        };
        list.push(value.to_string());
        Ok(list.len())
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        let data = self.data.read().map_err(poisoned)?;
        let list = match data.get(key) {
            None => return Ok(Vec::new()),
            Some(Value::List(list)) => list,
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
        };
        Ok(match resolve_range(list.len(), start, stop) {
            Some((from, to)) => list[from..=to].to_vec(),
            None => Vec::new(),
        })
    }

    async fn scan_prefix(
        &self,
        prefix: &str,
        cursor: u64,
        count: usize,
    ) -> Result<(u64, Vec<String>), StoreError> {
        let count = count.max(1);
        let resume_after = if cursor == SCAN_START {
            None
        } else {
            let cursors = self.cursors.lock().map_err(poisoned)?;
            match cursors.resume_after.get(&cursor) {
                Some(key) => Some(key.clone()),
                None => return Err(StoreError::Backend(format!("unknown scan cursor {cursor}"))),
            }
        };

        let (keys, more) = {
            let data = self.data.read().map_err(poisoned)?;
            let lower = match &resume_after {
                Some(key) => Bound::Excluded(key.clone()),
                None => Bound::Included(prefix.to_string()),
            };
            let mut matching = data
                .range((lower, Bound::Unbounded))
                .map(|(k, _)| k)
                .take_while(|k| k.starts_with(prefix));
            let keys: Vec<String> = matching.by_ref().take(count).cloned().collect();
            let more = matching.next().is_some();
            (keys, more)
        };

        let mut cursors = self.cursors.lock().map_err(poisoned)?;
        if cursor != SCAN_START {
            cursors.resume_after.remove(&cursor);
        }
        if !more {
            return Ok((SCAN_START, keys));
        }
        cursors.next_id += 1;
        let next = cursors.next_id;
        if let Some(last) = keys.last() {
            while cursors.resume_after.len() >= MAX_OPEN_SCANS {
                cursors.resume_after.pop_first();
            }
            cursors.resume_after.insert(next, last.clone());
        }
        Ok((next, keys))
    }

    async fn key_type(&self, key: &str) -> Result<KeyType, StoreError> {
        let data = self.data.read().map_err(poisoned)?;
        Ok(match data.get(key) {
            None => KeyType::None,
            Some(Value::Str(_)) => KeyType::String,
            Some(Value::Hash(_)) => KeyType::Hash,
            Some(Value::List(_)) => KeyType::List,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::scan_all;

    #[tokio::test]
    async fn hash_fields_merge_on_write() {
        let store = MemoryStore::new();
        store
            .set_hash("h", &[("a", "1".to_string()), ("b", "2".to_string())])
            .await
            .unwrap();
        store.set_hash("h", &[("b", "3".to_string())]).await.unwrap();

        let hash = store.get_hash("h").await.unwrap();
        assert_eq!(hash.get("a").map(String::as_str), Some("1"));
        assert_eq!(hash.get("b").map(String::as_str), Some("3"));
        assert!(store.get_hash("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn wrong_type_access_is_rejected() {
        let store = MemoryStore::new();
        store.list_append("l", "x").await.unwrap();
        assert!(matches!(store.get_hash("l").await, Err(StoreError::WrongType(_))));
        assert!(matches!(
            store.set_hash("l", &[("f", "v".to_string())]).await,
            Err(StoreError::WrongType(_))
        ));
        assert!(matches!(store.get("l").await, Err(StoreError::WrongType(_))));
    }

    #[tokio::test]
    async fn list_keeps_insertion_order() {
        let store = MemoryStore::new();
        for v in ["a", "b", "c"] {
            store.list_append("l", v).await.unwrap();
        }
        assert_eq!(store.list_range("l", 0, -1).await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.list_range("l", 1, 1).await.unwrap(), vec!["b"]);
        assert!(store.list_range("nope", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn scan_pages_until_cursor_returns_to_start() {
        let store = MemoryStore::new();
        for i in 0..7 {
            store.set(&format!("p:{i}"), "v").await.unwrap();
        }
        store.set("other", "v").await.unwrap();
        store.set("q:0", "v").await.unwrap();

        let (cursor, first) = store.scan_prefix("p:", SCAN_START, 3).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_ne!(cursor, SCAN_START);

        let keys = scan_all(&store, "p:", 3).await.unwrap();
        assert_eq!(keys.len(), 7);
        assert!(keys.iter().all(|k| k.starts_with("p:")));
    }

    #[tokio::test]
    async fn scan_survives_deletes_between_pages() {
        let store = MemoryStore::new();
        for i in 0..6 {
            store.set(&format!("p:{i}"), "v").await.unwrap();
        }
        let (cursor, first) = store.scan_prefix("p:", SCAN_START, 2).await.unwrap();
        assert_eq!(first, vec!["p:0", "p:1"]);
        store.delete("p:0").await.unwrap();
        store.delete("p:1").await.unwrap();

        let mut rest = Vec::new();
        let mut cursor = cursor;
        while cursor != SCAN_START {
            let (next, batch) = store.scan_prefix("p:", cursor, 2).await.unwrap();
            rest.extend(batch);
            cursor = next;
        }
        assert_eq!(rest, vec!["p:2", "p:3", "p:4", "p:5"]);
    }

    #[tokio::test]
    async fn abandoned_scans_are_bounded() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store.set(&format!("p:{i}"), "v").await.unwrap();
        }
        let (oldest, _) = store.scan_prefix("p:", SCAN_START, 1).await.unwrap();
        let mut newest = oldest;
        for _ in 0..MAX_OPEN_SCANS {
            newest = store.scan_prefix("p:", SCAN_START, 1).await.unwrap().0;
        }
        assert_eq!(store.cursors.lock().unwrap().resume_after.len(), MAX_OPEN_SCANS);
        assert!(matches!(
            store.scan_prefix("p:", oldest, 1).await,
            Err(StoreError::Backend(_))
        ));
        let (_, page) = store.scan_prefix("p:", newest, 5).await.unwrap();
        assert_eq!(page, vec!["p:1", "p:2"]);
    }

    #[tokio::test]
    async fn key_type_and_delete() {
        let store = MemoryStore::new();
        store.set("s", "v").await.unwrap();
        store.list_append("l", "v").await.unwrap();
        assert_eq!(store.key_type("s").await.unwrap(), KeyType::String);
        assert_eq!(store.key_type("l").await.unwrap(), KeyType::List);
        assert_eq!(store.key_type("x").await.unwrap(), KeyType::None);

        assert!(store.delete("s").await.unwrap());
        assert!(!store.delete("s").await.unwrap());
        assert!(!store.exists("s").await.unwrap());
        assert_eq!(store.len(), 1);
    }
}
