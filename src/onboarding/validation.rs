//! Step validation gate.
//!
//! Screens run these presence checks before calling `complete_step`. The
//! transition engine itself accepts completion unconditionally.

use serde::Serialize;
use serde_json::Value;

use super::model::step_ids;
use super::state::OnboardingState;

/// Outcome of a step validity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepValidation {
    pub step_id: String,
    pub errors: Vec<String>,
}

impl StepValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Whether `value[key]` is a string with non-whitespace content.
pub(crate) fn has_text(value: &Value, key: &str) -> bool {
    value
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

/// Whether `value[key]` is a non-empty array.
pub(crate) fn has_items(value: &Value, key: &str) -> bool {
    value
        .get(key)
        .and_then(Value::as_array)
        .is_some_and(|items| !items.is_empty())
}

fn business_info_errors(state: &OnboardingState, errors: &mut Vec<String>) {
    if !has_text(&state.business_info, "companyName") {
        errors.push("Company name is required".to_string());
    }
    if !has_text(&state.business_info, "contactEmail") {
        errors.push("Contact email is required".to_string());
    }
}

fn industry_errors(state: &OnboardingState, errors: &mut Vec<String>) {
    if !has_text(&state.industry_selection, "primaryIndustry") {
        errors.push("Primary industry is required".to_string());
    }
}

/// Run the validity predicate for `step_id`.
///
/// Steps without a predicate (including unknown ids) are always valid.
pub fn validate_step(step_id: &str, state: &OnboardingState) -> StepValidation {
    let mut errors = Vec::new();

    match step_id {
        step_ids::BUSINESS_INFO => business_info_errors(state, &mut errors),
        step_ids::INDUSTRY_SELECTION => industry_errors(state, &mut errors),
        step_ids::FEATURE_CONFIGURATION => {
            if !has_items(&state.feature_configuration, "enabledFeatures") {
                errors.push("Enable at least one feature".to_string());
            }
        }
        step_ids::VERIFICATION => {
            business_info_errors(state, &mut errors);
            industry_errors(state, &mut errors);
        }
        _ => {}
    }

    StepValidation {
        step_id: step_id.to_string(),
        errors,
    }
}
