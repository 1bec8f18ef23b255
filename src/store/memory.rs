//! In-process snapshot store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StorageError;

use super::traits::SnapshotStore;

/// Non-durable store backed by a map. Useful for tests and for hosts that
/// do their own persistence.
#[derive(Default)]
pub struct MemoryStore {
    slots: RwLock<HashMap<String, serde_json::Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots.
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError> {
        Ok(self.slots.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError> {
        self.slots
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.slots.write().await.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_get_delete() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);
        assert!(store.get("k").await.unwrap().is_none());

        store.set("k", &json!({ "a": 1 })).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({ "a": 1 })));
        assert_eq!(store.len().await, 1);

        store.set("k", &json!({ "a": 2 })).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({ "a": 2 })));

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
    }
}
