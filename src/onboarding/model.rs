//! Catalog models: step, milestone, and achievement definitions.
//!
//! Catalogs are static data. They are built once at startup and shared
//! read-only between the manager and the derivation routines.

use serde::{Deserialize, Serialize};

use super::achievements;
use super::state::OnboardingState;

/// The kind of work a step represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Information,
    Configuration,
    Integration,
    Verification,
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Information => "information",
            Self::Configuration => "configuration",
            Self::Integration => "integration",
            Self::Verification => "verification",
        };
        write!(f, "{s}")
    }
}

/// One page of the onboarding wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepDefinition {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    pub estimated_duration_minutes: u32,
    /// Steps expected to be completed first. Advisory only: the engine
    /// reports unmet dependencies but never blocks on them.
    pub dependencies: Vec<String>,
    pub is_optional: bool,
}

impl StepDefinition {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        step_type: StepType,
        estimated_duration_minutes: u32,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            step_type,
            estimated_duration_minutes: estimated_duration_minutes.max(1),
            dependencies: Vec::new(),
            is_optional: false,
        }
    }

    /// Builder: set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder: set dependencies.
    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    /// Builder: mark the step as optional (skippable).
    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }
}

/// A named reward attached to a milestone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDefinition {
    pub id: String,
    pub title: String,
}

/// A grouping of steps whose completion unlocks rewards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneDefinition {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Step ids, in display order.
    pub requirements: Vec<String>,
    pub rewards: Vec<RewardDefinition>,
}

impl MilestoneDefinition {
    pub fn new(id: impl Into<String>, title: impl Into<String>, requirements: &[&str]) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            requirements: requirements.iter().map(|r| r.to_string()).collect(),
            rewards: Vec::new(),
        }
    }

    /// Builder: set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder: attach a reward.
    pub fn with_reward(mut self, id: impl Into<String>, title: impl Into<String>) -> Self {
        self.rewards.push(RewardDefinition {
            id: id.into(),
            title: title.into(),
        });
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementCategory {
    Progress,
    Setup,
    Integration,
    Speed,
    Mastery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementRarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

/// Predicate deciding whether an achievement is earned.
///
/// Must be total: absent nested fields are a non-match, never a panic.
pub type AchievementCondition = fn(&OnboardingState) -> bool;

/// A one-time unlockable badge.
#[derive(Debug, Clone)]
pub struct AchievementDefinition {
    pub id: String,
    pub title: String,
    pub description: String,
    pub category: AchievementCategory,
    pub rarity: AchievementRarity,
    pub points: u32,
    pub condition: AchievementCondition,
}

impl AchievementDefinition {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        category: AchievementCategory,
        rarity: AchievementRarity,
        points: u32,
        condition: AchievementCondition,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            category,
            rarity,
            points,
            condition,
        }
    }

    /// Builder: set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Ids of the steps in the default catalog.
pub mod step_ids {
    pub const WELCOME: &str = "welcome";
    pub const BUSINESS_INFO: &str = "business-info";
    pub const INDUSTRY_SELECTION: &str = "industry-selection";
    pub const FEATURE_CONFIGURATION: &str = "feature-configuration";
    pub const DATA_IMPORT: &str = "data-import";
    pub const TEAM_SETUP: &str = "team-setup";
    pub const INTEGRATIONS: &str = "integrations";
    pub const VERIFICATION: &str = "verification";
    pub const COMPLETION: &str = "completion";

    /// All default steps in wizard order.
    pub const ALL: &[&str] = &[
        WELCOME,
        BUSINESS_INFO,
        INDUSTRY_SELECTION,
        FEATURE_CONFIGURATION,
        DATA_IMPORT,
        TEAM_SETUP,
        INTEGRATIONS,
        VERIFICATION,
        COMPLETION,
    ];

    /// Default steps that count toward overall progress.
    pub const REQUIRED: &[&str] = &[
        WELCOME,
        BUSINESS_INFO,
        INDUSTRY_SELECTION,
        FEATURE_CONFIGURATION,
        DATA_IMPORT,
        VERIFICATION,
        COMPLETION,
    ];
}

/// Settings keys used for onboarding persistence.
pub mod settings_keys {
    /// Key for the OnboardingState JSON blob in the settings table.
    pub const ONBOARDING_STATE: &str = "onboarding_state";
    /// Default user ID (single-user system).
    pub const DEFAULT_USER: &str = "default";
}

/// The full set of static definitions driving one wizard.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub steps: Vec<StepDefinition>,
    pub milestones: Vec<MilestoneDefinition>,
    pub achievements: Vec<AchievementDefinition>,
}

impl Catalog {
    pub fn new(
        steps: Vec<StepDefinition>,
        milestones: Vec<MilestoneDefinition>,
        achievements: Vec<AchievementDefinition>,
    ) -> Self {
        Self {
            steps,
            milestones,
            achievements,
        }
    }

    pub fn step(&self, id: &str) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_at(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    pub fn milestone(&self, id: &str) -> Option<&MilestoneDefinition> {
        self.milestones.iter().find(|m| m.id == id)
    }

    pub fn achievement(&self, id: &str) -> Option<&AchievementDefinition> {
        self.achievements.iter().find(|a| a.id == id)
    }

    pub fn total_steps(&self) -> usize {
        self.steps.len()
    }

    /// Steps that gate the overall completion percentage.
    pub fn required_steps(&self) -> impl Iterator<Item = &StepDefinition> {
        self.steps.iter().filter(|s| !s.is_optional)
    }
}

impl Default for Catalog {
    /// The business onboarding wizard: nine steps, seven of them required.
    fn default() -> Self {
        use step_ids::*;
        use StepType::*;

        let steps = vec![
            StepDefinition::new(WELCOME, "Welcome", Information, 2)
                .with_description("Overview of the setup process"),
            StepDefinition::new(BUSINESS_INFO, "Business information", Configuration, 5)
                .with_description("Company name, contact details and address")
                .with_dependencies(&[WELCOME]),
            StepDefinition::new(INDUSTRY_SELECTION, "Industry", Configuration, 3)
                .with_description("Primary industry and business model")
                .with_dependencies(&[BUSINESS_INFO]),
            StepDefinition::new(FEATURE_CONFIGURATION, "Features", Configuration, 8)
                .with_description("Enable inventory, order and customer modules")
                .with_dependencies(&[INDUSTRY_SELECTION]),
            StepDefinition::new(DATA_IMPORT, "Data import", Integration, 10)
                .with_description("Bring in existing products and customers")
                .with_dependencies(&[FEATURE_CONFIGURATION]),
            StepDefinition::new(TEAM_SETUP, "Team", Configuration, 5)
                .with_description("Invite team members and assign roles")
                .with_dependencies(&[BUSINESS_INFO])
                .optional(),
            StepDefinition::new(INTEGRATIONS, "Integrations", Integration, 10)
                .with_description("Connect payment, shipping and accounting services")
                .with_dependencies(&[FEATURE_CONFIGURATION])
                .optional(),
            StepDefinition::new(VERIFICATION, "Verification", Verification, 5)
                .with_description("Review the configuration before launch")
                .with_dependencies(&[DATA_IMPORT]),
            StepDefinition::new(COMPLETION, "Launch", Information, 1)
                .with_description("Finish setup and open the dashboard")
                .with_dependencies(&[VERIFICATION]),
        ];

        let milestones = vec![
            MilestoneDefinition::new("getting-started", "Getting started", &[WELCOME])
                .with_description("Start the setup journey")
                .with_reward("welcome-badge", "Welcome badge"),
            MilestoneDefinition::new(
                "business-setup",
                "Business setup",
                &[BUSINESS_INFO, INDUSTRY_SELECTION],
            )
            .with_description("Describe your business")
            .with_reward("profile-badge", "Business profile badge")
            .with_reward("industry-templates", "Industry templates"),
            MilestoneDefinition::new(
                "platform-configuration",
                "Platform configuration",
                &[FEATURE_CONFIGURATION, INTEGRATIONS],
            )
            .with_description("Tailor the platform to your workflow")
            .with_reward("power-user-tips", "Power user tips"),
            MilestoneDefinition::new("data-ready", "Data ready", &[DATA_IMPORT, VERIFICATION])
                .with_description("Import and verify your data")
                .with_reward("priority-support", "Priority support trial"),
            MilestoneDefinition::new("launch", "Launch", &[COMPLETION])
                .with_description("Go live")
                .with_reward("launch-certificate", "Launch certificate"),
        ];

        Self::new(steps, milestones, achievements::default_achievements())
    }
}
