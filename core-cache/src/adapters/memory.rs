//! In-memory key-value store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use bridge_traits::{error::Result, store::KeyValueStore};

/// Non-durable [`KeyValueStore`] backed by a map.
///
/// Used by tests to substitute the device store without touching disk, and
/// usable as a real backend for hosts that do not need persistence.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    data: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.data.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.data.lock().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.data.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.data
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.data.lock().await.remove(key);
        Ok(())
    }

    async fn clear(&self, keys: &[&str]) -> Result<()> {
        let mut data = self.data.lock().await;
        for key in keys {
            data.remove(*key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip_and_clear() {
        let store = MemoryKeyValueStore::new();
        store.set("a", "1").await.unwrap();
        store.set("b", "2").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("1".to_string()));
        assert!(store.has_key("b").await.unwrap());

        store.clear(&["a", "missing"]).await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        assert_eq!(store.len().await, 1);

        store.remove("b").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let store = MemoryKeyValueStore::new();
        store.set("k", "old").await.unwrap();
        store.set("k", "new").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("new".to_string()));
    }
}
