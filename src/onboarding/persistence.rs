//! Persistence adapter: snapshots `OnboardingState` into a durable slot.
//!
//! Failures never propagate: they are logged and reported as an outcome so
//! in-memory state is never touched by a failed write or a corrupt read.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::store::SnapshotStore;

use super::state::OnboardingState;

/// Upper bound on a single store write.
const SAVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a save attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The snapshot predates a reset and was dropped.
    Stale,
    Failed,
}

/// Reads and writes the onboarding snapshot under a fixed key.
///
/// Writes and deletes are serialized by an internal lock. Every reset bumps
/// the generation, and a save carrying an older generation is discarded,
/// so a delete always wins over an in-flight save of pre-reset data.
pub struct PersistenceAdapter {
    store: Arc<dyn SnapshotStore>,
    key: String,
    generation: AtomicU64,
    write_lock: Mutex<()>,
}

impl PersistenceAdapter {
    pub fn new(store: Arc<dyn SnapshotStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            generation: AtomicU64::new(0),
            write_lock: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current generation. Capture it together with the snapshot.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Write `snapshot` if no reset happened since `generation` was read.
    pub async fn save(&self, snapshot: &OnboardingState, generation: u64) -> SaveOutcome {
        let value = match serde_json::to_value(snapshot) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to serialize onboarding state: {}", e);
                return SaveOutcome::Failed;
            }
        };

        let _guard = self.write_lock.lock().await;
        if generation != self.generation() {
            debug!(
                snapshot_generation = generation,
                current_generation = self.generation(),
                "Discarding stale onboarding snapshot"
            );
            return SaveOutcome::Stale;
        }

        match tokio::time::timeout(SAVE_TIMEOUT, self.store.set(&self.key, &value)).await {
            Ok(Ok(())) => {
                debug!(key = %self.key, "Onboarding state saved");
                SaveOutcome::Saved
            }
            Ok(Err(e)) => {
                warn!("Failed to persist onboarding state: {}", e);
                SaveOutcome::Failed
            }
            Err(_) => {
                warn!(timeout = ?SAVE_TIMEOUT, "Timed out persisting onboarding state");
                SaveOutcome::Failed
            }
        }
    }

    /// Read the stored snapshot. `None` when missing, unreadable, or corrupt.
    pub async fn load(&self) -> Option<OnboardingState> {
        let value = match self.store.get(&self.key).await {
            Ok(Some(v)) => v,
            Ok(None) => {
                debug!(key = %self.key, "No onboarding snapshot stored");
                return None;
            }
            Err(e) => {
                warn!("Failed to read onboarding snapshot: {}", e);
                return None;
            }
        };

        match serde_json::from_value::<OnboardingState>(value) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Ignoring corrupt onboarding snapshot: {}", e);
                None
            }
        }
    }

    /// Delete the stored snapshot and invalidate in-flight saves.
    pub async fn reset(&self) {
        let _guard = self.write_lock.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        match self.store.delete(&self.key).await {
            Ok(existed) => info!(existed, "Onboarding snapshot cleared"),
            Err(e) => warn!("Failed to clear onboarding snapshot: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::onboarding::model::Catalog;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    /// Store whose every operation fails.
    struct UnavailableStore;

    #[async_trait]
    impl SnapshotStore for UnavailableStore {
        async fn get(&self, _key: &str) -> Result<Option<serde_json::Value>, StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }
        async fn set(&self, _key: &str, _value: &serde_json::Value) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }
        async fn delete(&self, _key: &str) -> Result<bool, StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }
    }

    fn state() -> OnboardingState {
        OnboardingState::initial(&Catalog::default(), chrono::Utc::now())
    }

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let adapter = PersistenceAdapter::new(Arc::new(MemoryStore::new()), "onboarding_state");
        let mut snapshot = state();
        snapshot.business_info = serde_json::json!({ "companyName": "Acme" });
        snapshot.progress.time_spent = 7.125;

        let outcome = adapter.save(&snapshot, adapter.generation()).await;
        assert_eq!(outcome, SaveOutcome::Saved);
        assert_eq!(adapter.load().await, Some(snapshot));
    }

    #[tokio::test]
    async fn load_without_snapshot_is_none() {
        let adapter = PersistenceAdapter::new(Arc::new(MemoryStore::new()), "onboarding_state");
        assert!(adapter.load().await.is_none());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        store
            .set("onboarding_state", &serde_json::json!({ "currentStep": "three" }))
            .await
            .unwrap();
        let adapter = PersistenceAdapter::new(store, "onboarding_state");
        assert!(adapter.load().await.is_none());
    }

    #[tokio::test]
    async fn reset_discards_stale_save() {
        let store = Arc::new(MemoryStore::new());
        let adapter = PersistenceAdapter::new(store.clone(), "onboarding_state");
        let stale_generation = adapter.generation();
        adapter.save(&state(), stale_generation).await;

        adapter.reset().await;
        assert!(store.is_empty().await);

        let outcome = adapter.save(&state(), stale_generation).await;
        assert_eq!(outcome, SaveOutcome::Stale);
        assert!(adapter.load().await.is_none());

        // Snapshots taken after the reset are written normally
        let outcome = adapter.save(&state(), adapter.generation()).await;
        assert_eq!(outcome, SaveOutcome::Saved);
    }

    #[tokio::test]
    async fn storage_failures_are_absorbed() {
        let adapter = PersistenceAdapter::new(Arc::new(UnavailableStore), "onboarding_state");
        assert_eq!(
            adapter.save(&state(), adapter.generation()).await,
            SaveOutcome::Failed
        );
        assert!(adapter.load().await.is_none());
        adapter.reset().await;
        assert_eq!(adapter.generation(), 1);
    }
}
