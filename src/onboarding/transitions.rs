//! Transition engine: the only code that mutates `OnboardingState`.
//!
//! Every operation is total: indices are clamped, unknown step ids get a
//! fresh record. Each operation runs its derivation pass before returning,
//! so callers holding the state lock never expose a half-derived state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::achievements::evaluate_achievements;
use super::model::Catalog;
use super::progress::{calculate_overall_progress, derive_milestones};
use super::state::{OnboardingState, StatePatch, StepStatus};

/// Inputs shared by every transition.
#[derive(Debug, Clone, Copy)]
pub struct TransitionContext<'a> {
    pub catalog: &'a Catalog,
    pub now: DateTime<Utc>,
    /// Gaps between activities longer than this are not counted as time spent.
    pub idle_threshold: Duration,
}

impl<'a> TransitionContext<'a> {
    pub fn new(catalog: &'a Catalog, now: DateTime<Utc>, idle_threshold: Duration) -> Self {
        Self {
            catalog,
            now,
            idle_threshold,
        }
    }
}

/// Something observable that a transition caused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OnboardingEvent {
    StepChanged { index: usize },
    StepStarted { step_id: String },
    StepCompleted { step_id: String },
    StepSkipped { step_id: String },
    MilestoneUnlocked { milestone_id: String },
    AchievementUnlocked { achievement_id: String, points: u32 },
    RewardClaimed { milestone_id: String, reward_id: String },
    OnboardingCompleted,
    StateUpdated,
    Paused,
    Resumed,
    ProgressReset,
    Saved { at: DateTime<Utc> },
    Loaded,
}

/// One engine operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    NextStep,
    PreviousStep,
    GoToStep(usize),
    CompleteStep(String),
    SkipStep(String),
    StartStep(String),
    UpdateState(StatePatch),
    SetPaused(bool),
    ClaimReward {
        milestone_id: String,
        reward_id: String,
    },
    Reset,
}

impl Transition {
    /// Apply the operation and its derivations to `state`.
    pub fn apply(self, state: &mut OnboardingState, ctx: &TransitionContext<'_>) -> Vec<OnboardingEvent> {
        match self {
            Self::NextStep => next_step(state, ctx),
            Self::PreviousStep => previous_step(state, ctx),
            Self::GoToStep(index) => go_to_step(state, ctx, index),
            Self::CompleteStep(id) => complete_step(state, ctx, &id),
            Self::SkipStep(id) => skip_step(state, ctx, &id),
            Self::StartStep(id) => start_step(state, ctx, &id),
            Self::UpdateState(patch) => update_state(state, ctx, patch),
            Self::SetPaused(paused) => set_paused(state, ctx, paused),
            Self::ClaimReward {
                milestone_id,
                reward_id,
            } => {
                if claim_reward(state, &milestone_id, &reward_id) {
                    vec![OnboardingEvent::RewardClaimed {
                        milestone_id,
                        reward_id,
                    }]
                } else {
                    Vec::new()
                }
            }
            Self::Reset => reset(state, ctx),
        }
    }

    /// Whether this operation can change milestone or achievement state.
    pub fn affects_derivations(&self) -> bool {
        matches!(
            self,
            Self::CompleteStep(_) | Self::SkipStep(_) | Self::UpdateState(_) | Self::Reset
        )
    }
}

/// Update `lastActivityAt`, crediting the elapsed gap to `timeSpent` unless
/// paused or idle for too long.
fn record_activity(state: &mut OnboardingState, ctx: &TransitionContext<'_>) {
    let gap = ctx.now - state.progress.last_activity_at;
    if !state.is_paused && gap > Duration::zero() && gap <= ctx.idle_threshold {
        state.progress.time_spent += gap.num_milliseconds() as f64 / 60_000.0;
    }
    state.progress.last_activity_at = ctx.now;
}

/// Move the step pointer to `index` (already clamped).
fn move_to(
    state: &mut OnboardingState,
    ctx: &TransitionContext<'_>,
    index: usize,
) -> Vec<OnboardingEvent> {
    record_activity(state, ctx);
    if index == state.current_step_index {
        return Vec::new();
    }
    state.current_step_index = index;
    debug!(index, "Step pointer moved");

    let mut events = vec![OnboardingEvent::StepChanged { index }];
    if let Some(step) = ctx.catalog.step_at(index) {
        let id = step.id.clone();
        events.extend(start_step(state, ctx, &id));
    }
    events
}

/// Advance one step, clamped at the last step.
pub fn next_step(state: &mut OnboardingState, ctx: &TransitionContext<'_>) -> Vec<OnboardingEvent> {
    let index = (state.current_step_index + 1).min(state.max_step_index());
    move_to(state, ctx, index)
}

/// Go back one step, clamped at 0.
pub fn previous_step(state: &mut OnboardingState, ctx: &TransitionContext<'_>) -> Vec<OnboardingEvent> {
    let index = state.current_step_index.saturating_sub(1);
    move_to(state, ctx, index)
}

/// Jump to `index`, clamped into `[0, totalSteps - 1]`.
pub fn go_to_step(
    state: &mut OnboardingState,
    ctx: &TransitionContext<'_>,
    index: usize,
) -> Vec<OnboardingEvent> {
    let index = index.min(state.max_step_index());
    move_to(state, ctx, index)
}

/// Mark a step in progress. Never downgrades a step that already has a
/// status other than not-started.
pub fn start_step(
    state: &mut OnboardingState,
    ctx: &TransitionContext<'_>,
    step_id: &str,
) -> Vec<OnboardingEvent> {
    record_activity(state, ctx);
    if state.step_status(step_id) != StepStatus::NotStarted {
        return Vec::new();
    }
    state.upsert_step(step_id, StepStatus::InProgress, None);
    vec![OnboardingEvent::StepStarted {
        step_id: step_id.to_string(),
    }]
}

/// Mark a step completed with a fresh timestamp. Completing twice only
/// refreshes `completedAt`.
pub fn complete_step(
    state: &mut OnboardingState,
    ctx: &TransitionContext<'_>,
    step_id: &str,
) -> Vec<OnboardingEvent> {
    record_activity(state, ctx);
    if ctx.catalog.step(step_id).is_none() {
        debug!(step_id, "Completing step not in catalog");
    }
    state.upsert_step(step_id, StepStatus::Completed, Some(ctx.now));
    info!(step_id, "Step completed");

    let mut events = vec![OnboardingEvent::StepCompleted {
        step_id: step_id.to_string(),
    }];
    events.extend(derive(state, ctx));
    events
}

/// Mark a step skipped.
///
/// Optionality is the caller's responsibility; skipping a required step is
/// accepted and only logged.
pub fn skip_step(
    state: &mut OnboardingState,
    ctx: &TransitionContext<'_>,
    step_id: &str,
) -> Vec<OnboardingEvent> {
    record_activity(state, ctx);
    if let Some(step) = ctx.catalog.step(step_id)
        && !step.is_optional
    {
        warn!(step_id, "Skipping a required step");
    }
    state.upsert_step(step_id, StepStatus::Skipped, None);
    info!(step_id, "Step skipped");

    let mut events = vec![OnboardingEvent::StepSkipped {
        step_id: step_id.to_string(),
    }];
    events.extend(derive(state, ctx));
    events
}

/// Shallow-merge `patch` into the top-level state.
pub fn update_state(
    state: &mut OnboardingState,
    ctx: &TransitionContext<'_>,
    patch: StatePatch,
) -> Vec<OnboardingEvent> {
    record_activity(state, ctx);
    if patch.is_empty() {
        return Vec::new();
    }

    let mut events = vec![OnboardingEvent::StateUpdated];

    if let Some(index) = patch.current_step_index {
        state.current_step_index = index.min(state.max_step_index());
    }
    if let Some(paused) = patch.is_paused {
        events.extend(set_paused(state, ctx, paused));
    }
    // Completion is only ever cleared by reset
    match patch.is_completed {
        Some(true) if !state.is_completed => {
            state.is_completed = true;
            events.push(OnboardingEvent::OnboardingCompleted);
        }
        Some(false) if state.is_completed => {
            debug!("Ignoring patch that clears the completion flag");
        }
        _ => {}
    }
    if let Some(value) = patch.business_info {
        state.business_info = value;
    }
    if let Some(value) = patch.industry_selection {
        state.industry_selection = value;
    }
    if let Some(value) = patch.feature_configuration {
        state.feature_configuration = value;
    }

    events.extend(achievement_events(state, ctx));
    events
}

/// Pause or resume the wizard. Paused time is not counted.
pub fn set_paused(
    state: &mut OnboardingState,
    ctx: &TransitionContext<'_>,
    paused: bool,
) -> Vec<OnboardingEvent> {
    record_activity(state, ctx);
    if state.is_paused == paused {
        return Vec::new();
    }
    state.is_paused = paused;
    info!(paused, "Onboarding pause toggled");
    if paused {
        vec![OnboardingEvent::Paused]
    } else {
        vec![OnboardingEvent::Resumed]
    }
}

/// Claim a reward of an unlocked milestone. Returns false when the milestone
/// is locked or unknown, the reward is unknown, or it was already claimed.
pub fn claim_reward(state: &mut OnboardingState, milestone_id: &str, reward_id: &str) -> bool {
    let Some(milestone) = state
        .progress
        .milestones
        .iter_mut()
        .find(|m| m.id == milestone_id)
    else {
        return false;
    };
    if !milestone.is_unlocked() {
        debug!(milestone_id, reward_id, "Reward claim on locked milestone");
        return false;
    }
    match milestone.rewards.iter_mut().find(|r| r.id == reward_id) {
        Some(reward) if !reward.claimed => {
            reward.claimed = true;
            info!(milestone_id, reward_id, "Reward claimed");
            true
        }
        _ => false,
    }
}

/// Replace the state with the initial snapshot, keeping `totalSteps`.
pub fn reset(state: &mut OnboardingState, ctx: &TransitionContext<'_>) -> Vec<OnboardingEvent> {
    let total_steps = state.total_steps;
    *state = OnboardingState::initial(ctx.catalog, ctx.now);
    state.total_steps = total_steps;
    info!("Onboarding progress reset");
    vec![OnboardingEvent::ProgressReset]
}

/// Milestone, completion, and achievement derivation after a step status
/// change.
fn derive(state: &mut OnboardingState, ctx: &TransitionContext<'_>) -> Vec<OnboardingEvent> {
    let mut events: Vec<OnboardingEvent> = derive_milestones(state, ctx.catalog, ctx.now)
        .into_iter()
        .map(|milestone_id| {
            info!(milestone = %milestone_id, "Milestone unlocked");
            OnboardingEvent::MilestoneUnlocked { milestone_id }
        })
        .collect();

    if !state.is_completed && calculate_overall_progress(state, ctx.catalog) == 100 {
        state.is_completed = true;
        info!("All required steps completed");
        events.push(OnboardingEvent::OnboardingCompleted);
    }

    events.extend(achievement_events(state, ctx));
    events
}

fn achievement_events(state: &mut OnboardingState, ctx: &TransitionContext<'_>) -> Vec<OnboardingEvent> {
    evaluate_achievements(state, ctx.catalog, ctx.now)
        .into_iter()
        .map(|a| OnboardingEvent::AchievementUnlocked {
            achievement_id: a.id,
            points: a.points,
        })
        .collect()
}
