//! In-process store honouring TTLs.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sentinel_common::SentinelError;
use tokio::sync::RwLock;

use super::KvStore;

struct Entry {
    value: String,
    ttl_secs: Option<u64>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Store backed by a `HashMap`, used as the test double for Redis
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// TTL the key was written with, if it is live
    pub async fn ttl_of(&self, key: &str) -> Option<u64> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|e| e.is_live(Instant::now()))
            .and_then(|e| e.ttl_secs)
    }

    /// Live keys, sorted
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_live(now))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Drop a key as if its TTL had elapsed
    pub async fn expire(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SentinelError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(Instant::now()))
            .map(|e| e.value.clone()))
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        ttl_secs: Option<u64>,
    ) -> Result<(), SentinelError> {
        let entry = Entry {
            value: value.to_string(),
            ttl_secs,
            expires_at: ttl_secs.map(|ttl| Instant::now() + Duration::from_secs(ttl)),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<bool, SentinelError> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                ttl_secs: Some(ttl_secs),
                expires_at: Some(now + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), SentinelError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        assert_ok!(store.put("a", "1", None).await);
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.ttl_of("a").await, None);

        assert_ok!(store.delete("a").await);
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let store = MemoryStore::new();
        store.put("gone", "x", Some(0)).await.unwrap();
        assert_eq!(store.get("gone").await.unwrap(), None);
        assert!(store.keys().await.is_empty());
    }

    #[tokio::test]
    async fn test_put_if_absent_only_once() {
        let store = MemoryStore::new();
        assert!(store.put_if_absent("claim", "1", 60).await.unwrap());
        assert!(!store.put_if_absent("claim", "2", 60).await.unwrap());
        assert_eq!(store.get("claim").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.ttl_of("claim").await, Some(60));

        store.delete("claim").await.unwrap();
        assert!(store.put_if_absent("claim", "3", 60).await.unwrap());
    }
}
