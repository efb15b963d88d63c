//! In-memory key/value store.
//!
//! Used where no durable file is wanted (previews, tests). Supports fault
//! injection so callers can exercise partial-commit and failed-teardown paths.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{KeyValueStore, Result, StorageError};

/// A mutating operation observed by the store, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Set(String),
    Remove(String),
    RemoveAll(Vec<String>),
    Clear,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, String>,
    failing_keys: HashSet<String>,
    fail_everything: bool,
    ops: Vec<StoreOp>,
}

impl Inner {
    fn check(&self, key: &str) -> Result<()> {
        if self.fail_everything || self.failing_keys.contains(key) {
            return Err(StorageError::Unavailable(format!("injected failure on '{}'", key)));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryKeyValueStore {
    inner: Mutex<Inner>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation touching `key` fail with `StorageError::Unavailable`
    pub fn fail_on(&self, key: &str) {
        self.inner.lock().failing_keys.insert(key.to_string());
    }

    /// Make every operation fail
    pub fn fail_everything(&self, enabled: bool) {
        self.inner.lock().fail_everything = enabled;
    }

    /// Stop injecting failures
    pub fn heal(&self) {
        let mut inner = self.inner.lock();
        inner.failing_keys.clear();
        inner.fail_everything = false;
    }

    /// Mutations performed so far, including ones that were rejected
    pub fn ops(&self) -> Vec<StoreOp> {
        self.inner.lock().ops.clone()
    }

    /// Number of `set` calls performed so far
    pub fn write_count(&self) -> usize {
        self.inner
            .lock()
            .ops
            .iter()
            .filter(|op| matches!(op, StoreOp::Set(_)))
            .count()
    }

    /// Sorted snapshot of the stored keys
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let inner = self.inner.lock();
        inner.check(key)?;
        Ok(inner.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ops.push(StoreOp::Set(key.to_string()));
        inner.check(key)?;
        inner.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ops.push(StoreOp::Remove(key.to_string()));
        inner.check(key)?;
        inner.entries.remove(key);
        Ok(())
    }

    async fn remove_all(&self, keys: &[&str]) -> Result<()> {
        let mut inner = self.inner.lock();
        inner
            .ops
            .push(StoreOp::RemoveAll(keys.iter().map(|k| k.to_string()).collect()));
        for key in keys {
            inner.check(key)?;
        }
        for key in keys {
            inner.entries.remove(*key);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.ops.push(StoreOp::Clear);
        if inner.fail_everything {
            return Err(StorageError::Unavailable("injected failure on clear".into()));
        }
        inner.entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_failure_is_scoped_to_key() {
        let store = MemoryKeyValueStore::new();
        store.fail_on("role");

        assert!(store.set("role", "tenant").await.is_err());
        store.set("name", "Amy").await.unwrap();
        assert_eq!(store.get("name").await.unwrap().as_deref(), Some("Amy"));

        store.heal();
        store.set("role", "tenant").await.unwrap();
        assert_eq!(store.write_count(), 3);
    }

    #[tokio::test]
    async fn test_remove_all_is_all_or_nothing_on_failure() {
        let store = MemoryKeyValueStore::new();
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();
        store.fail_on("b");

        assert!(store.remove_all(&["a", "b"]).await.is_err());
        store.heal();
        assert_eq!(store.keys(), vec!["a".to_string(), "b".to_string()]);
    }
}
