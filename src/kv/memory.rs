//! In-memory KV store.
//!
//! Backs tests and the dev fallback when no hosted store is configured.
//! State is gone at process exit; `serve` logs a warning when running on it.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{KvError, KvStore};

#[derive(Default)]
struct Inner {
    sets: HashMap<String, HashSet<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
    counters: HashMap<String, i64>,
}

/// Process-local store with the same per-key semantics as the hosted one.
#[derive(Default)]
pub struct MemoryKv {
    inner: Mutex<Inner>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, KvError> {
        self.inner
            .lock()
            .map_err(|_| KvError::Protocol("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn is_member(&self, set_key: &str, value: &str) -> Result<bool, KvError> {
        let inner = self.lock()?;
        Ok(inner
            .sets
            .get(set_key)
            .is_some_and(|s| s.contains(value)))
    }

    async fn add_member(&self, set_key: &str, value: &str) -> Result<(), KvError> {
        let mut inner = self.lock()?;
        inner
            .sets
            .entry(set_key.to_string())
            .or_default()
            .insert(value.to_string());
        Ok(())
    }

    async fn get_all_members(&self, set_key: &str) -> Result<Vec<String>, KvError> {
        let inner = self.lock()?;
        Ok(inner
            .sets
            .get(set_key)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn write_fields(
        &self,
        hash_key: &str,
        fields: &[(String, String)],
    ) -> Result<(), KvError> {
        let mut inner = self.lock()?;
        let hash = inner.hashes.entry(hash_key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn read_fields(&self, hash_key: &str) -> Result<HashMap<String, String>, KvError> {
        let inner = self.lock()?;
        Ok(inner.hashes.get(hash_key).cloned().unwrap_or_default())
    }

    async fn increment(&self, counter_key: &str) -> Result<i64, KvError> {
        let mut inner = self.lock()?;
        let counter = inner.counters.entry(counter_key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn get(&self, counter_key: &str) -> Result<Option<i64>, KvError> {
        let inner = self.lock()?;
        Ok(inner.counters.get(counter_key).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_add_is_idempotent() {
        let kv = MemoryKv::new();
        kv.add_member("s", "a").await.unwrap();
        kv.add_member("s", "a").await.unwrap();
        assert_eq!(kv.get_all_members("s").await.unwrap(), vec!["a"]);
        assert!(kv.is_member("s", "a").await.unwrap());
        assert!(!kv.is_member("s", "b").await.unwrap());
    }

    #[tokio::test]
    async fn counter_starts_absent_then_counts() {
        let kv = MemoryKv::new();
        assert_eq!(kv.get("c").await.unwrap(), None);
        assert_eq!(kv.increment("c").await.unwrap(), 1);
        assert_eq!(kv.increment("c").await.unwrap(), 2);
        assert_eq!(kv.get("c").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn hash_read_of_missing_key_is_empty() {
        let kv = MemoryKv::new();
        assert!(kv.read_fields("h").await.unwrap().is_empty());
        kv.write_fields("h", &[("f".into(), "v".into())])
            .await
            .unwrap();
        assert_eq!(
            kv.read_fields("h").await.unwrap().get("f").map(String::as_str),
            Some("v")
        );
    }
}
