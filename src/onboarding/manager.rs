//! OnboardingManager: coordinates onboarding state, transitions,
//! persistence, and auto-save.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::store::SnapshotStore;

use super::achievements::total_points;
use super::model::Catalog;
use super::persistence::{PersistenceAdapter, SaveOutcome};
use super::progress::{
    calculate_overall_progress, derive_milestones, estimated_minutes_remaining,
    unmet_dependencies,
};
use super::state::{OnboardingState, StatePatch};
use super::transitions::{OnboardingEvent, Transition, TransitionContext};
use super::validation::{StepValidation, validate_step};

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Handle owning the onboarding state.
///
/// Every mutation and its derivation pass run under one write lock, so
/// readers never observe a half-derived state.
pub struct OnboardingManager {
    catalog: Arc<Catalog>,
    state: RwLock<OnboardingState>,
    persistence: PersistenceAdapter,
    idle_threshold: chrono::Duration,
    /// Set on every mutation, cleared by a successful save.
    dirty: AtomicBool,
    tx: broadcast::Sender<OnboardingEvent>,
}

impl OnboardingManager {
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn SnapshotStore>, config: &EngineConfig) -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        let state = OnboardingState::initial(&catalog, Utc::now());
        let idle_threshold = chrono::Duration::from_std(config.idle_threshold)
            .unwrap_or_else(|_| chrono::Duration::minutes(30));
        Self {
            catalog,
            state: RwLock::new(state),
            persistence: PersistenceAdapter::new(store, config.storage_key.clone()),
            idle_threshold,
            dirty: AtomicBool::new(false),
            tx,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<OnboardingEvent> {
        self.tx.subscribe()
    }

    /// Read-only snapshot of the current state.
    pub async fn get_state(&self) -> OnboardingState {
        self.state.read().await.clone()
    }

    /// Apply one transition atomically and broadcast its events.
    pub async fn apply(&self, transition: Transition) -> Vec<OnboardingEvent> {
        if matches!(transition, Transition::Reset) {
            return self.reset_progress().await;
        }

        let events = {
            let mut state = self.state.write().await;
            let ctx = TransitionContext::new(&self.catalog, Utc::now(), self.idle_threshold);
            let events = transition.apply(&mut state, &ctx);
            self.dirty.store(true, Ordering::SeqCst);
            events
        };
        self.broadcast(&events);
        events
    }

    pub async fn next_step(&self) {
        self.apply(Transition::NextStep).await;
    }

    pub async fn previous_step(&self) {
        self.apply(Transition::PreviousStep).await;
    }

    pub async fn go_to_step(&self, index: usize) {
        self.apply(Transition::GoToStep(index)).await;
    }

    /// Mark a step in progress without moving the pointer.
    pub async fn start_step(&self, step_id: &str) {
        self.apply(Transition::StartStep(step_id.to_string())).await;
    }

    pub async fn complete_step(&self, step_id: &str) {
        self.apply(Transition::CompleteStep(step_id.to_string())).await;
    }

    pub async fn skip_step(&self, step_id: &str) {
        self.apply(Transition::SkipStep(step_id.to_string())).await;
    }

    /// Shallow-merge `patch`. A patch that pauses saves like `set_paused`.
    pub async fn update_state(&self, patch: StatePatch) {
        let events = self.apply(Transition::UpdateState(patch)).await;
        self.save_if_paused(&events).await;
    }

    /// Pause or resume. Pausing saves once immediately.
    pub async fn set_paused(&self, paused: bool) {
        let events = self.apply(Transition::SetPaused(paused)).await;
        self.save_if_paused(&events).await;
    }

    async fn save_if_paused(&self, events: &[OnboardingEvent]) {
        if events.contains(&OnboardingEvent::Paused) {
            self.save_progress().await;
        }
    }

    /// Claim a milestone reward. Returns whether the claim took effect.
    pub async fn claim_reward(&self, milestone_id: &str, reward_id: &str) -> bool {
        let events = self
            .apply(Transition::ClaimReward {
                milestone_id: milestone_id.to_string(),
                reward_id: reward_id.to_string(),
            })
            .await;
        !events.is_empty()
    }

    /// Restore the initial snapshot and delete the stored one.
    ///
    /// The state lock is held across the delete so no save can snapshot
    /// pre-reset data after the generation bump.
    pub async fn reset_progress(&self) -> Vec<OnboardingEvent> {
        let events = {
            let mut state = self.state.write().await;
            let ctx = TransitionContext::new(&self.catalog, Utc::now(), self.idle_threshold);
            let events = Transition::Reset.apply(&mut state, &ctx);
            self.persistence.reset().await;
            self.dirty.store(false, Ordering::SeqCst);
            events
        };
        self.broadcast(&events);
        events
    }

    /// Save the current state. Returns whether the snapshot was written.
    ///
    /// `lastSavedAt` is only updated after a successful write, and never
    /// when a reset landed while the write was in flight.
    pub async fn save_progress(&self) -> bool {
        let saved_at = Utc::now();
        let (snapshot, generation) = {
            let state = self.state.read().await;
            let mut snapshot = state.clone();
            snapshot.last_saved_at = Some(saved_at);
            // Cleared while mutations are locked out; later ones re-mark it
            self.dirty.store(false, Ordering::SeqCst);
            (snapshot, self.persistence.generation())
        };

        match self.persistence.save(&snapshot, generation).await {
            SaveOutcome::Saved => {
                {
                    let mut state = self.state.write().await;
                    if self.persistence.generation() != generation {
                        debug!("Reset during save; not stamping lastSavedAt");
                        return false;
                    }
                    state.last_saved_at = Some(saved_at);
                }
                self.broadcast(&[OnboardingEvent::Saved { at: saved_at }]);
                true
            }
            SaveOutcome::Stale => false,
            SaveOutcome::Failed => {
                self.dirty.store(true, Ordering::SeqCst);
                false
            }
        }
    }

    /// Replace the in-memory state with the stored snapshot, if any.
    ///
    /// Missing or corrupt snapshots leave the current state untouched.
    /// Milestones are re-derived so snapshots written without them get
    /// their unlock state back, dated at the snapshot's last activity.
    pub async fn load_progress(&self) -> bool {
        let Some(mut loaded) = self.persistence.load().await else {
            return false;
        };

        let total = self.catalog.total_steps();
        if loaded.total_steps != total {
            debug!(
                stored = loaded.total_steps,
                catalog = total,
                "Snapshot step count differs from catalog"
            );
            loaded.total_steps = total;
        }
        loaded.current_step_index = loaded.current_step_index.min(loaded.max_step_index());
        let last_activity = loaded.progress.last_activity_at;
        let restored = derive_milestones(&mut loaded, &self.catalog, last_activity);
        if !restored.is_empty() {
            debug!(milestones = ?restored, "Milestone state rebuilt from snapshot");
        }

        *self.state.write().await = loaded;
        self.dirty.store(false, Ordering::SeqCst);
        info!("Onboarding progress restored");
        self.broadcast(&[OnboardingEvent::Loaded]);
        true
    }

    /// Overall completion percentage over required steps.
    pub async fn calculate_progress(&self) -> u8 {
        calculate_overall_progress(&*self.state.read().await, &self.catalog)
    }

    pub async fn total_points(&self) -> u32 {
        total_points(&*self.state.read().await)
    }

    pub async fn estimated_minutes_remaining(&self) -> u32 {
        estimated_minutes_remaining(&*self.state.read().await, &self.catalog)
    }

    /// Advisory list of incomplete dependencies of `step_id`.
    pub async fn unmet_dependencies(&self, step_id: &str) -> Vec<String> {
        let state = self.state.read().await;
        unmet_dependencies(&state, &self.catalog, step_id)
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Run the step's validity check against the current state.
    pub async fn validate_step(&self, step_id: &str) -> StepValidation {
        validate_step(step_id, &*self.state.read().await)
    }

    /// Whether there are changes not yet written to the store.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// One auto-save tick: save if active and dirty. Returns whether a
    /// snapshot was written.
    pub async fn autosave_tick(&self) -> bool {
        {
            let state = self.state.read().await;
            if state.is_completed || state.is_paused {
                return false;
            }
        }
        if !self.is_dirty() {
            return false;
        }
        self.save_progress().await
    }

    fn broadcast(&self, events: &[OnboardingEvent]) {
        for event in events {
            // Ok if no receivers are listening
            let _ = self.tx.send(event.clone());
        }
    }
}

/// Owns the auto-save task. Stopping or dropping the handle cancels it.
pub struct AutoSaveHandle {
    handle: JoinHandle<()>,
}

impl AutoSaveHandle {
    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for AutoSaveHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Spawn a background task that saves dirty state every `interval`.
pub fn spawn_autosave_task(manager: Arc<OnboardingManager>, interval: Duration) -> AutoSaveHandle {
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if manager.autosave_tick().await {
                debug!("Auto-saved onboarding progress");
            }
        }
    });
    AutoSaveHandle { handle }
}
