//! `SnapshotStore` trait: async key-value interface for snapshot persistence.

use async_trait::async_trait;

use crate::error::StorageError;

/// Backend-agnostic durable slot storage.
///
/// Values are JSON documents addressed by a string key.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the value under `key`, or `None` if nothing is stored.
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StorageError>;

    /// Insert or replace the value under `key`.
    async fn set(&self, key: &str, value: &serde_json::Value) -> Result<(), StorageError>;

    /// Remove `key`. Returns whether a value existed.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;
}
