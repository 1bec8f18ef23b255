//! Onboarding state store: the aggregate root mutated by transitions.
//!
//! Field names and nesting mirror the persisted snapshot format exactly
//! (camelCase JSON). Fields added later are `#[serde(default)]` so older
//! snapshots keep loading.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::model::{AchievementCategory, AchievementRarity, Catalog};

/// Per-step lifecycle status.
///
/// A step without a record is implicitly `NotStarted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    NotStarted,
    InProgress,
    Completed,
    Skipped,
}

impl StepStatus {
    /// Whether the step no longer needs attention.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }
}

impl Default for StepStatus {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "not-started",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// Status record for one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub id: String,
    pub status: StepStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Snapshot of the milestone currently in focus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentMilestone {
    pub id: String,
    pub progress: u8,
}

/// Claim flag for one milestone reward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardState {
    pub id: String,
    pub claimed: bool,
}

/// Derived progress of one catalog milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneState {
    pub id: String,
    pub progress: u8,
    /// Set the first time progress reaches 100. Never cleared.
    #[serde(default)]
    pub unlocked_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rewards: Vec<RewardState>,
}

impl MilestoneState {
    pub fn is_unlocked(&self) -> bool {
        self.unlocked_at.is_some()
    }
}

/// An achievement that has been earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockedAchievement {
    pub id: String,
    pub unlocked_at: DateTime<Utc>,
    pub points: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<AchievementCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<AchievementRarity>,
}

/// Progress sub-record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    /// Status records for every step that left `NotStarted`.
    pub completed_steps: Vec<StepRecord>,
    /// `None` only when the catalog has no milestones.
    pub current_milestone: Option<CurrentMilestone>,
    /// Append-only.
    pub achievements: Vec<UnlockedAchievement>,
    /// Minutes of active time.
    pub time_spent: f64,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub milestones: Vec<MilestoneState>,
}

/// The onboarding aggregate root.
///
/// Stored in the `settings` table under key `"onboarding_state"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingState {
    #[serde(rename = "currentStep")]
    pub current_step_index: usize,
    pub total_steps: usize,
    pub is_completed: bool,
    pub is_paused: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
    #[serde(default = "empty_object")]
    pub business_info: serde_json::Value,
    #[serde(default = "empty_object")]
    pub industry_selection: serde_json::Value,
    #[serde(default = "empty_object")]
    pub feature_configuration: serde_json::Value,
    pub progress: ProgressRecord,
}

fn empty_object() -> serde_json::Value {
    serde_json::json!({})
}

impl OnboardingState {
    /// The fixed initial snapshot for a catalog.
    pub fn initial(catalog: &Catalog, now: DateTime<Utc>) -> Self {
        let mut state = Self {
            current_step_index: 0,
            total_steps: catalog.total_steps(),
            is_completed: false,
            is_paused: false,
            last_saved_at: None,
            business_info: empty_object(),
            industry_selection: empty_object(),
            feature_configuration: empty_object(),
            progress: ProgressRecord {
                completed_steps: Vec::new(),
                current_milestone: None,
                achievements: Vec::new(),
                time_spent: 0.0,
                last_activity_at: now,
                milestones: Vec::new(),
            },
        };
        super::progress::derive_milestones(&mut state, catalog, now);
        state
    }

    /// Highest valid step index.
    pub fn max_step_index(&self) -> usize {
        self.total_steps.saturating_sub(1)
    }

    pub fn step_record(&self, step_id: &str) -> Option<&StepRecord> {
        self.progress.completed_steps.iter().find(|r| r.id == step_id)
    }

    /// Status of a step; absent records read as `NotStarted`.
    pub fn step_status(&self, step_id: &str) -> StepStatus {
        self.step_record(step_id)
            .map(|r| r.status)
            .unwrap_or_default()
    }

    pub fn is_step_completed(&self, step_id: &str) -> bool {
        self.step_status(step_id) == StepStatus::Completed
    }

    /// Number of steps with status `Completed`.
    pub fn completed_count(&self) -> usize {
        self.progress
            .completed_steps
            .iter()
            .filter(|r| r.status == StepStatus::Completed)
            .count()
    }

    pub fn has_achievement(&self, achievement_id: &str) -> bool {
        self.progress
            .achievements
            .iter()
            .any(|a| a.id == achievement_id)
    }

    pub fn milestone_state(&self, milestone_id: &str) -> Option<&MilestoneState> {
        self.progress.milestones.iter().find(|m| m.id == milestone_id)
    }

    /// Insert or overwrite the record for `step_id`. Keeps at most one
    /// record per id.
    pub(crate) fn upsert_step(
        &mut self,
        step_id: &str,
        status: StepStatus,
        completed_at: Option<DateTime<Utc>>,
    ) {
        match self
            .progress
            .completed_steps
            .iter_mut()
            .find(|r| r.id == step_id)
        {
            Some(record) => {
                record.status = status;
                record.completed_at = completed_at;
            }
            None => self.progress.completed_steps.push(StepRecord {
                id: step_id.to_string(),
                status,
                completed_at,
            }),
        }
    }
}

/// A partial update shallow-merged into the top-level state.
///
/// Each present field replaces the corresponding state field wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatePatch {
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "currentStep")]
    pub current_step_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_paused: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_info: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry_selection: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_configuration: Option<serde_json::Value>,
}

impl StatePatch {
    pub fn business_info(value: serde_json::Value) -> Self {
        Self {
            business_info: Some(value),
            ..Default::default()
        }
    }

    pub fn industry_selection(value: serde_json::Value) -> Self {
        Self {
            industry_selection: Some(value),
            ..Default::default()
        }
    }

    pub fn feature_configuration(value: serde_json::Value) -> Self {
        Self {
            feature_configuration: Some(value),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
