//! Achievement evaluation and the default achievement catalog.

use chrono::{DateTime, Utc};
use tracing::info;

use super::model::{
    AchievementCategory, AchievementDefinition, AchievementRarity, Catalog, step_ids,
};
use super::state::{OnboardingState, UnlockedAchievement};
use super::validation::{has_items, has_text};

/// Time budget for the speed-runner badge, in minutes.
const SPEED_RUN_MINUTES: f64 = 30.0;

/// Evaluate every achievement that is not unlocked yet and append the ones
/// whose condition holds.
///
/// Append-only: already unlocked achievements are neither re-evaluated nor
/// removed. Returns the newly unlocked records.
pub fn evaluate_achievements(
    state: &mut OnboardingState,
    catalog: &Catalog,
    now: DateTime<Utc>,
) -> Vec<UnlockedAchievement> {
    let snapshot: &OnboardingState = state;
    let unlocked: Vec<UnlockedAchievement> = catalog
        .achievements
        .iter()
        .filter(|def| !snapshot.has_achievement(&def.id))
        .filter(|def| (def.condition)(snapshot))
        .map(|def| UnlockedAchievement {
            id: def.id.clone(),
            unlocked_at: now,
            points: def.points,
            title: def.title.clone(),
            category: Some(def.category),
            rarity: Some(def.rarity),
        })
        .collect();

    for achievement in &unlocked {
        info!(
            achievement = %achievement.id,
            points = achievement.points,
            "Achievement unlocked"
        );
    }

    state.progress.achievements.extend(unlocked.iter().cloned());
    unlocked
}

/// Sum of points over unlocked achievements. Derived on read, never stored.
pub fn total_points(state: &OnboardingState) -> u32 {
    state.progress.achievements.iter().map(|a| a.points).sum()
}

fn first_step(state: &OnboardingState) -> bool {
    state.completed_count() >= 1
}

fn quick_starter(state: &OnboardingState) -> bool {
    state.completed_count() >= 3
}

fn business_profile(state: &OnboardingState) -> bool {
    has_text(&state.business_info, "companyName") && has_text(&state.business_info, "contactEmail")
}

fn industry_expert(state: &OnboardingState) -> bool {
    has_text(&state.industry_selection, "primaryIndustry")
}

fn connector(state: &OnboardingState) -> bool {
    has_items(&state.feature_configuration, "integrations")
}

fn team_player(state: &OnboardingState) -> bool {
    state.is_step_completed(step_ids::TEAM_SETUP)
}

fn completionist(state: &OnboardingState) -> bool {
    step_ids::ALL.iter().all(|id| state.is_step_completed(id))
}

/// Earned by finishing the required steps, not by flagging completion.
fn speed_runner(state: &OnboardingState) -> bool {
    state.is_completed
        && step_ids::REQUIRED.iter().all(|id| state.is_step_completed(id))
        && state.progress.time_spent <= SPEED_RUN_MINUTES
}

/// Achievements of the default catalog.
pub fn default_achievements() -> Vec<AchievementDefinition> {
    use AchievementCategory::*;
    use AchievementRarity::*;

    vec![
        AchievementDefinition::new("first-step", "First step", Progress, Common, 10, first_step)
            .with_description("Complete your first onboarding step"),
        AchievementDefinition::new(
            "quick-starter",
            "Quick starter",
            Progress,
            Common,
            25,
            quick_starter,
        )
        .with_description("Complete three onboarding steps"),
        AchievementDefinition::new(
            "business-profile",
            "Open for business",
            Setup,
            Uncommon,
            20,
            business_profile,
        )
        .with_description("Fill in company name and contact email"),
        AchievementDefinition::new(
            "industry-expert",
            "Industry expert",
            Setup,
            Uncommon,
            15,
            industry_expert,
        )
        .with_description("Choose a primary industry"),
        AchievementDefinition::new("connector", "Connector", Integration, Rare, 30, connector)
            .with_description("Configure at least one integration"),
        AchievementDefinition::new(
            "team-player",
            "Team player",
            Setup,
            Rare,
            30,
            team_player,
        )
        .with_description("Set up your team"),
        AchievementDefinition::new(
            "completionist",
            "Completionist",
            Mastery,
            Legendary,
            100,
            completionist,
        )
        .with_description("Complete every step, optional ones included"),
        AchievementDefinition::new(
            "speed-runner",
            "Speed runner",
            Speed,
            Epic,
            50,
            speed_runner,
        )
        .with_description("Finish onboarding within 30 minutes of active time"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::state::StepStatus;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        "2026-03-01T09:00:00Z".parse().unwrap()
    }

    fn setup() -> (Catalog, OnboardingState) {
        let catalog = Catalog::default();
        let state = OnboardingState::initial(&catalog, now());
        (catalog, state)
    }

    fn complete(state: &mut OnboardingState, id: &str) {
        state.upsert_step(id, StepStatus::Completed, Some(now()));
    }

    #[test]
    fn nothing_unlocks_on_initial_state() {
        let (catalog, mut state) = setup();
        assert!(evaluate_achievements(&mut state, &catalog, now()).is_empty());
        assert_eq!(total_points(&state), 0);
    }

    #[test]
    fn quick_starter_needs_three_steps() {
        let (catalog, mut state) = setup();
        complete(&mut state, step_ids::WELCOME);
        complete(&mut state, step_ids::BUSINESS_INFO);
        evaluate_achievements(&mut state, &catalog, now());
        assert!(state.has_achievement("first-step"));
        assert!(!state.has_achievement("quick-starter"));

        complete(&mut state, step_ids::INDUSTRY_SELECTION);
        let unlocked = evaluate_achievements(&mut state, &catalog, now());
        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].id, "quick-starter");
        assert_eq!(unlocked[0].points, 25);
        assert_eq!(unlocked[0].rarity, Some(AchievementRarity::Common));
        assert_eq!(total_points(&state), 35);
    }

    #[test]
    fn unlocked_achievements_are_never_revoked() {
        let (catalog, mut state) = setup();
        for id in &step_ids::ALL[..3] {
            complete(&mut state, id);
        }
        evaluate_achievements(&mut state, &catalog, now());
        assert!(state.has_achievement("quick-starter"));
        let first = state.progress.achievements.clone();

        // Predicate now evaluates false
        state.progress.completed_steps.clear();
        let later = now() + chrono::Duration::minutes(1);
        assert!(evaluate_achievements(&mut state, &catalog, later).is_empty());
        assert_eq!(state.progress.achievements, first);
    }

    #[test]
    fn predicates_tolerate_missing_nested_state() {
        let (catalog, mut state) = setup();
        state.business_info = serde_json::Value::Null;
        state.industry_selection = json!([1, 2, 3]);
        state.feature_configuration = json!({ "integrations": null });
        assert!(evaluate_achievements(&mut state, &catalog, now()).is_empty());
    }

    #[test]
    fn data_driven_predicates() {
        let (catalog, mut state) = setup();
        state.business_info = json!({ "companyName": "Acme", "contactEmail": "ops@acme.test" });
        state.industry_selection = json!({ "primaryIndustry": "retail" });
        state.feature_configuration = json!({ "integrations": ["stripe"] });
        let ids: Vec<String> = evaluate_achievements(&mut state, &catalog, now())
            .into_iter()
            .map(|a| a.id)
            .collect();
        assert_eq!(ids, vec!["business-profile", "industry-expert", "connector"]);
    }

    #[test]
    fn completionist_requires_every_step() {
        let (catalog, mut state) = setup();
        for id in step_ids::ALL {
            complete(&mut state, id);
        }
        state.upsert_step(step_ids::TEAM_SETUP, StepStatus::Skipped, None);
        evaluate_achievements(&mut state, &catalog, now());
        assert!(!state.has_achievement("completionist"));

        complete(&mut state, step_ids::TEAM_SETUP);
        evaluate_achievements(&mut state, &catalog, now());
        assert!(state.has_achievement("completionist"));
        assert!(state.has_achievement("team-player"));
    }

    fn finish_required(state: &mut OnboardingState) {
        for id in step_ids::REQUIRED {
            complete(state, id);
        }
        state.is_completed = true;
    }

    #[test]
    fn speed_runner_respects_time_budget() {
        let (catalog, mut state) = setup();
        finish_required(&mut state);
        state.progress.time_spent = 45.0;
        evaluate_achievements(&mut state, &catalog, now());
        assert!(!state.has_achievement("speed-runner"));

        let (catalog, mut state) = setup();
        finish_required(&mut state);
        state.progress.time_spent = 12.5;
        evaluate_achievements(&mut state, &catalog, now());
        assert!(state.has_achievement("speed-runner"));
    }

    #[test]
    fn speed_runner_needs_required_steps_not_just_the_flag() {
        let (catalog, mut state) = setup();
        state.is_completed = true;
        state.progress.time_spent = 0.0;
        evaluate_achievements(&mut state, &catalog, now());
        assert!(!state.has_achievement("speed-runner"));
    }
}
