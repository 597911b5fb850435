//! Meal planner nodes.
//!
//! Each node is generic over the collaborator it calls, so the planner can
//! be wired against the HTTP adapters in production and scripted fakes in
//! tests without boxing every collaborator call.

mod direct;
mod ingredients;
mod reminders;
mod search;

pub use direct::{CreateMealFromUrl, title_from_url};
pub use ingredients::{ExtractIngredients, ReviewCommand, ReviewIngredients};
pub use reminders::{AddToReminders, ListChoice};
pub use search::{ParseMeals, PresentOptions, RefineSearch, SearchMeals, ValidateRecipes, should_refine};

use std::time::Duration;

use mealflow_types::config::EngineConfig;
use mealflow_types::state::MealOption;

use crate::retry::{self, RetryPolicy};

pub const SEARCH_MEALS: &str = "search_meals";
pub const PARSE_MEALS: &str = "parse_meals";
pub const VALIDATE_RECIPES: &str = "validate_recipes";
pub const REFINE_SEARCH: &str = "refine_search";
pub const PRESENT_OPTIONS: &str = "present_options";
pub const CREATE_MEAL_FROM_URL: &str = "create_meal_from_url";
pub const PROCESS_MEAL: &str = "process_meal";
pub const EXTRACT_INGREDIENTS: &str = "extract_ingredients";
pub const REVIEW_INGREDIENTS: &str = "review_ingredients";
pub const ADD_TO_REMINDERS: &str = "add_to_reminders";

/// Policy constants shared by the search/refine loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerPolicy {
    pub max_refinements: u32,
    pub min_valid_candidates: usize,
    pub max_candidates: usize,
    pub retry: RetryPolicy,
    /// Time a node may spend on collaborator calls within one step.
    pub call_budget: Duration,
    /// Bound on a single URL validation, never longer than `call_budget`.
    pub validate_timeout: Duration,
}

impl PlannerPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        let call_budget = retry::call_budget(config);
        Self {
            max_refinements: config.max_refinements,
            min_valid_candidates: config.min_valid_candidates,
            max_candidates: config.max_candidates.max(1),
            retry: RetryPolicy::from_config(config),
            call_budget,
            validate_timeout: Duration::from_secs(config.validate_timeout_secs).min(call_budget),
        }
    }

    /// Whether another refinement round may run after `refinement_count`.
    pub fn can_refine(&self, refinement_count: u32) -> bool {
        refinement_count < self.max_refinements
    }
}

impl Default for PlannerPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Re-number candidates 1..=n in their current order.
pub(crate) fn renumber(options: impl IntoIterator<Item = MealOption>) -> Vec<MealOption> {
    options
        .into_iter()
        .zip(1..)
        .map(|(option, id)| MealOption { id, ..option })
        .collect()
}

/// Base search query for a cuisine, restricted to the given sites.
pub(crate) fn cuisine_query(cuisine: &str) -> String {
    format!("{cuisine} dinner recipe with ingredients")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renumber_starts_at_one() {
        let options = vec![
            MealOption::new(7, "a", "", "https://a.example/r"),
            MealOption::new(3, "b", "", "https://b.example/r"),
        ];
        let ids: Vec<u32> = renumber(options).iter().map(|o| o.id).collect();
        assert_eq!(ids, [1, 2]);
    }

    #[test]
    fn validation_timeout_is_clamped_to_budget() {
        let policy = PlannerPolicy::from_config(&EngineConfig {
            step_timeout_secs: 4,
            validate_timeout_secs: 30,
            ..EngineConfig::default()
        });
        assert_eq!(policy.call_budget, Duration::from_secs(3));
        assert_eq!(policy.validate_timeout, Duration::from_secs(3));
    }

    #[test]
    fn refinement_is_bounded() {
        let policy = PlannerPolicy::default();
        assert!(policy.can_refine(0));
        assert!(policy.can_refine(1));
        assert!(!policy.can_refine(2));
    }
}
