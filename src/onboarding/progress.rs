//! Progress and milestone derivation.
//!
//! Everything here is a pure function of `progress.completedSteps` plus the
//! catalog. Milestones are recomputed in full on every call; only the
//! sticky `unlockedAt` timestamps and reward claims carry over.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::model::{Catalog, MilestoneDefinition};
use super::state::{CurrentMilestone, MilestoneState, OnboardingState, RewardState, StepStatus};

/// Overall completion percentage over required steps, rounded.
///
/// Optional steps never count. Returns 0 when the catalog has no required
/// steps.
pub fn calculate_overall_progress(state: &OnboardingState, catalog: &Catalog) -> u8 {
    let (total, completed) = catalog
        .required_steps()
        .fold((0usize, 0usize), |(total, completed), step| {
            let done = state.is_step_completed(&step.id) as usize;
            (total + 1, completed + done)
        });
    if total == 0 {
        return 0;
    }
    ((completed as f64 / total as f64) * 100.0).round() as u8
}

/// Progress of one milestone, 0..=100.
///
/// Floors instead of rounding so that 100 means every requirement is
/// completed. Empty requirements count as 100.
pub fn milestone_progress(milestone: &MilestoneDefinition, state: &OnboardingState) -> u8 {
    let total = milestone.requirements.len();
    if total == 0 {
        return 100;
    }
    let completed = milestone
        .requirements
        .iter()
        .filter(|id| state.is_step_completed(id))
        .count();
    (completed * 100 / total) as u8
}

/// Recompute every milestone and the current milestone.
///
/// Returns the ids of milestones unlocked by this pass.
pub fn derive_milestones(
    state: &mut OnboardingState,
    catalog: &Catalog,
    now: DateTime<Utc>,
) -> Vec<String> {
    let mut newly_unlocked = Vec::new();
    let mut derived = Vec::with_capacity(catalog.milestones.len());

    for def in &catalog.milestones {
        let progress = milestone_progress(def, state);
        let previous = state.milestone_state(&def.id);

        let unlocked_at = match previous.and_then(|m| m.unlocked_at) {
            Some(at) => Some(at),
            None if progress >= 100 => {
                newly_unlocked.push(def.id.clone());
                Some(now)
            }
            None => None,
        };

        let rewards = def
            .rewards
            .iter()
            .map(|reward| RewardState {
                id: reward.id.clone(),
                claimed: previous
                    .and_then(|m| m.rewards.iter().find(|r| r.id == reward.id))
                    .is_some_and(|r| r.claimed),
            })
            .collect();

        derived.push(MilestoneState {
            id: def.id.clone(),
            progress,
            unlocked_at,
            rewards,
        });
    }

    let current = derived
        .iter()
        .find(|m| m.progress < 100)
        .or_else(|| derived.last())
        .map(|m| CurrentMilestone {
            id: m.id.clone(),
            progress: m.progress,
        });

    debug!(
        current = current.as_ref().map(|m| m.id.as_str()).unwrap_or("none"),
        unlocked = newly_unlocked.len(),
        "Derived milestones"
    );

    state.progress.milestones = derived;
    state.progress.current_milestone = current;
    newly_unlocked
}

/// Estimated minutes left: durations of steps neither completed nor skipped.
pub fn estimated_minutes_remaining(state: &OnboardingState, catalog: &Catalog) -> u32 {
    catalog
        .steps
        .iter()
        .filter(|s| !state.step_status(&s.id).is_resolved())
        .map(|s| s.estimated_duration_minutes)
        .sum()
}

/// Dependencies of `step_id` that are not completed yet.
///
/// Advisory only; transitions never consult this. Unknown ids have no
/// dependencies.
pub fn unmet_dependencies<'a>(
    state: &OnboardingState,
    catalog: &'a Catalog,
    step_id: &str,
) -> Vec<&'a str> {
    catalog
        .step(step_id)
        .map(|step| {
            step.dependencies
                .iter()
                .filter(|dep| state.step_status(dep) != StepStatus::Completed)
                .map(String::as_str)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onboarding::model::{StepDefinition, StepType, step_ids};

    fn now() -> DateTime<Utc> {
        "2026-03-01T09:00:00Z".parse().unwrap()
    }

    fn complete(state: &mut OnboardingState, id: &str) {
        state.upsert_step(id, StepStatus::Completed, Some(now()));
    }

    #[test]
    fn required_progress_rounds() {
        let catalog = Catalog::default();
        let mut state = OnboardingState::initial(&catalog, now());
        assert_eq!(calculate_overall_progress(&state, &catalog), 0);

        for id in &step_ids::ALL[..4] {
            complete(&mut state, id);
        }
        // 4 of 7 required
        assert_eq!(calculate_overall_progress(&state, &catalog), 57);
    }

    #[test]
    fn optional_steps_do_not_count() {
        let catalog = Catalog::default();
        let mut state = OnboardingState::initial(&catalog, now());
        complete(&mut state, step_ids::TEAM_SETUP);
        complete(&mut state, step_ids::INTEGRATIONS);
        assert_eq!(calculate_overall_progress(&state, &catalog), 0);

        for step in catalog.required_steps() {
            complete(&mut state, &step.id);
        }
        assert_eq!(calculate_overall_progress(&state, &catalog), 100);
    }

    #[test]
    fn all_required_is_100_with_optional_skipped() {
        let catalog = Catalog::default();
        let mut state = OnboardingState::initial(&catalog, now());
        state.upsert_step(step_ids::TEAM_SETUP, StepStatus::Skipped, None);
        for step in catalog.required_steps() {
            complete(&mut state, &step.id);
        }
        assert_eq!(calculate_overall_progress(&state, &catalog), 100);
    }

    #[test]
    fn no_required_steps_is_zero() {
        let catalog = Catalog::new(
            vec![StepDefinition::new("tour", "Tour", StepType::Information, 2).optional()],
            Vec::new(),
            Vec::new(),
        );
        let mut state = OnboardingState::initial(&catalog, now());
        complete(&mut state, "tour");
        assert_eq!(calculate_overall_progress(&state, &catalog), 0);
    }

    #[test]
    fn skipped_requirement_does_not_count() {
        let catalog = Catalog::default();
        let mut state = OnboardingState::initial(&catalog, now());
        state.upsert_step(step_ids::BUSINESS_INFO, StepStatus::Skipped, None);
        let def = catalog.milestone("business-setup").unwrap();
        assert_eq!(milestone_progress(def, &state), 0);
    }

    #[test]
    fn business_setup_milestone_progress() {
        let catalog = Catalog::default();
        let mut state = OnboardingState::initial(&catalog, now());

        complete(&mut state, step_ids::BUSINESS_INFO);
        let unlocked = derive_milestones(&mut state, &catalog, now());
        assert!(unlocked.is_empty());
        let m = state.milestone_state("business-setup").unwrap();
        assert_eq!(m.progress, 50);
        assert!(m.unlocked_at.is_none());

        complete(&mut state, step_ids::INDUSTRY_SELECTION);
        let unlocked = derive_milestones(&mut state, &catalog, now());
        assert_eq!(unlocked, vec!["business-setup".to_string()]);
        let m = state.milestone_state("business-setup").unwrap();
        assert_eq!(m.progress, 100);
        assert_eq!(m.unlocked_at, Some(now()));

        // Later passes keep the original timestamp and report nothing new
        let later = now() + chrono::Duration::minutes(5);
        let unlocked = derive_milestones(&mut state, &catalog, later);
        assert!(unlocked.is_empty());
        let m = state.milestone_state("business-setup").unwrap();
        assert_eq!(m.unlocked_at, Some(now()));
    }

    #[test]
    fn unlock_is_sticky_when_requirement_regresses() {
        let catalog = Catalog::default();
        let mut state = OnboardingState::initial(&catalog, now());
        complete(&mut state, step_ids::WELCOME);
        derive_milestones(&mut state, &catalog, now());

        state.upsert_step(step_ids::WELCOME, StepStatus::Skipped, None);
        derive_milestones(&mut state, &catalog, now());
        let m = state.milestone_state("getting-started").unwrap();
        assert_eq!(m.progress, 0);
        assert!(m.is_unlocked());
    }

    #[test]
    fn current_milestone_is_first_incomplete() {
        let catalog = Catalog::default();
        let mut state = OnboardingState::initial(&catalog, now());
        complete(&mut state, step_ids::WELCOME);
        complete(&mut state, step_ids::DATA_IMPORT);
        complete(&mut state, step_ids::VERIFICATION);
        derive_milestones(&mut state, &catalog, now());
        let current = state.progress.current_milestone.as_ref().unwrap();
        assert_eq!(current.id, "business-setup");
    }

    #[test]
    fn current_milestone_is_last_when_all_complete() {
        let catalog = Catalog::default();
        let mut state = OnboardingState::initial(&catalog, now());
        for id in step_ids::ALL {
            complete(&mut state, id);
        }
        derive_milestones(&mut state, &catalog, now());
        let current = state.progress.current_milestone.as_ref().unwrap();
        assert_eq!(current.id, "launch");
        assert_eq!(current.progress, 100);
        assert!(state.progress.milestones.iter().all(|m| m.is_unlocked()));
    }

    #[test]
    fn empty_requirements_are_complete() {
        let catalog = Catalog::new(
            vec![StepDefinition::new("a", "A", StepType::Information, 1)],
            vec![
                MilestoneDefinition::new("free", "Free", &[]),
                MilestoneDefinition::new("a-done", "A done", &["a"]),
            ],
            Vec::new(),
        );
        let state = OnboardingState::initial(&catalog, now());
        let free = state.milestone_state("free").unwrap();
        assert_eq!(free.progress, 100);
        assert!(free.is_unlocked());
        assert_eq!(state.progress.current_milestone.as_ref().unwrap().id, "a-done");
    }

    #[test]
    fn progress_floors_below_100() {
        let reqs: Vec<String> = (0..200).map(|i| format!("s{i}")).collect();
        let reqs_ref: Vec<&str> = reqs.iter().map(String::as_str).collect();
        let def = MilestoneDefinition::new("big", "Big", &reqs_ref);
        let catalog = Catalog::new(Vec::new(), vec![def.clone()], Vec::new());
        let mut state = OnboardingState::initial(&catalog, now());
        for id in &reqs[..199] {
            complete(&mut state, id);
        }
        assert_eq!(milestone_progress(&def, &state), 99);
    }

    #[test]
    fn no_milestones_means_no_current() {
        let catalog = Catalog::new(Vec::new(), Vec::new(), Vec::new());
        let state = OnboardingState::initial(&catalog, now());
        assert!(state.progress.current_milestone.is_none());
    }

    #[test]
    fn remaining_minutes_excludes_resolved_steps() {
        let catalog = Catalog::default();
        let mut state = OnboardingState::initial(&catalog, now());
        let total: u32 = catalog.steps.iter().map(|s| s.estimated_duration_minutes).sum();
        assert_eq!(estimated_minutes_remaining(&state, &catalog), total);

        complete(&mut state, step_ids::WELCOME); // 2
        state.upsert_step(step_ids::INTEGRATIONS, StepStatus::Skipped, None); // 10
        state.upsert_step(step_ids::TEAM_SETUP, StepStatus::InProgress, None);
        assert_eq!(estimated_minutes_remaining(&state, &catalog), total - 12);
    }

    #[test]
    fn unmet_dependencies_are_advisory() {
        let catalog = Catalog::default();
        let mut state = OnboardingState::initial(&catalog, now());
        assert_eq!(
            unmet_dependencies(&state, &catalog, step_ids::INDUSTRY_SELECTION),
            vec![step_ids::BUSINESS_INFO]
        );
        complete(&mut state, step_ids::BUSINESS_INFO);
        assert!(unmet_dependencies(&state, &catalog, step_ids::INDUSTRY_SELECTION).is_empty());
        assert!(unmet_dependencies(&state, &catalog, "no-such-step").is_empty());
    }
}
