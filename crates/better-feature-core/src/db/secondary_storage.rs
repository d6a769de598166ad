// Secondary storage: a key-value store with TTL, used for ephemeral data
// such as rate-limit counters when `rateLimit.storage` is `secondary-storage`.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::Result;

#[async_trait]
pub trait SecondaryStorage: Send + Sync + std::fmt::Debug {
    /// `None` when the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// `ttl` is in seconds; `None` never expires.
    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Process-local secondary storage. Entries expire lazily on read.
#[derive(Debug, Default)]
pub struct MemorySecondaryStorage {
    store: Mutex<HashMap<String, Entry>>,
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemorySecondaryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SecondaryStorage for MemorySecondaryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut store = self.store.lock().await;
        let expired = match store.get(key) {
            Some(entry) => entry.expires_at.is_some_and(|at| Instant::now() >= at),
            None => return Ok(None),
        };
        if expired {
            store.remove(key);
            return Ok(None);
        }
        Ok(store.get(key).map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<u64>) -> Result<()> {
        let expires_at = ttl.map(|secs| Instant::now() + Duration::from_secs(secs));
        self.store.lock().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.store.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let storage = MemorySecondaryStorage::new();
        storage.set("k", "v", None).await.unwrap();
        assert_eq!(storage.get("k").await.unwrap().as_deref(), Some("v"));
        storage.delete("k").await.unwrap();
        assert_eq!(storage.get("k").await.unwrap(), None);
        assert!(storage.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let storage = MemorySecondaryStorage::new();
        storage.set("k", "v", Some(10)).await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(storage.get("k").await.unwrap(), None);
    }
}
