//! Onboarding system: multi-step setup wizard driver.
//!
//! The wizard walks a new business through a fixed catalog of steps. Step
//! completion drives milestone progress and achievement unlocks, and the
//! whole state is snapshotted to a durable slot so a session can resume.

pub mod achievements;
pub mod manager;
pub mod model;
pub mod persistence;
pub mod progress;
pub mod state;
pub mod transitions;
pub mod validation;

pub use manager::{AutoSaveHandle, OnboardingManager, spawn_autosave_task};
pub use model::{
    AchievementCategory, AchievementDefinition, AchievementRarity, Catalog, MilestoneDefinition,
    StepDefinition, StepType,
};
pub use persistence::{PersistenceAdapter, SaveOutcome};
pub use state::{OnboardingState, StatePatch, StepRecord, StepStatus};
pub use transitions::{OnboardingEvent, Transition, TransitionContext};
pub use validation::StepValidation;
