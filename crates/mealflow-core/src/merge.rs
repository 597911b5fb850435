//! State merge policy.
//!
//! Every `WorkflowState` field has exactly one declared [`MergeRule`]. The
//! engine never deep-merges: a node's [`StateUpdate`] is folded into the
//! state field by field according to [`FIELD_RULES`].

use mealflow_types::state::WorkflowState;
use mealflow_types::update::{Patch, StateUpdate};

/// How an update value combines with the existing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeRule {
    /// Scalar field: the new value replaces the old one.
    Overwrite,
    /// List field: the node's list replaces the old list wholesale.
    Replace,
    /// Accumulator: new entries are appended after the existing ones.
    Append,
}

/// Declared rule for every state field.
pub const FIELD_RULES: &[(&str, MergeRule)] = &[
    ("direct_url", MergeRule::Overwrite),
    ("cuisine_type", MergeRule::Overwrite),
    ("preferred_sources", MergeRule::Replace),
    ("search_results", MergeRule::Overwrite),
    ("meal_options", MergeRule::Replace),
    ("selected_meal", MergeRule::Overwrite),
    ("refinement_count", MergeRule::Overwrite),
    ("refine_dishes", MergeRule::Replace),
    ("grocery_list", MergeRule::Replace),
    ("reminders_added", MergeRule::Overwrite),
    ("error", MergeRule::Overwrite),
    ("trace", MergeRule::Append),
];

/// Look up the rule for a field name.
pub fn rule_for(field: &str) -> Option<MergeRule> {
    FIELD_RULES
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, rule)| *rule)
}

fn patch_option<T: Clone>(slot: &mut Option<T>, patch: &Patch<T>) {
    match patch {
        Patch::Keep => {}
        Patch::Set(value) => *slot = Some(value.clone()),
        Patch::Clear => *slot = None,
    }
}

fn patch_value<T: Clone + Default>(slot: &mut T, patch: &Patch<T>) {
    match patch {
        Patch::Keep => {}
        Patch::Set(value) => *slot = value.clone(),
        Patch::Clear => *slot = T::default(),
    }
}

/// Pure merge: returns the state that results from applying `update`.
///
/// Overwrite and replace fields are idempotent. The `trace` accumulator is
/// not, so callers must apply each update once; see [`apply`].
pub fn merge(state: &WorkflowState, update: &StateUpdate) -> WorkflowState {
    let mut next = state.clone();
    patch_option(&mut next.direct_url, &update.direct_url);
    patch_value(&mut next.cuisine_type, &update.cuisine_type);
    patch_option(&mut next.preferred_sources, &update.preferred_sources);
    patch_option(&mut next.search_results, &update.search_results);
    patch_option(&mut next.meal_options, &update.meal_options);
    patch_option(&mut next.selected_meal, &update.selected_meal);
    patch_value(&mut next.refinement_count, &update.refinement_count);
    patch_option(&mut next.refine_dishes, &update.refine_dishes);
    patch_option(&mut next.grocery_list, &update.grocery_list);
    patch_option(&mut next.reminders_added, &update.reminders_added);
    patch_option(&mut next.error, &update.error);
    next.trace.extend(update.trace.iter().cloned());
    next
}

/// Apply `update` in place, consuming it so it cannot be applied twice.
pub fn apply(state: &mut WorkflowState, update: StateUpdate) {
    *state = merge(state, &update);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mealflow_types::state::{Ingredient, MealOption};

    fn sample_state() -> WorkflowState {
        let mut state = WorkflowState::for_cuisine("italian", vec!["seriouseats.com".into()]);
        state.meal_options = Some(vec![
            MealOption::new(1, "Carbonara", "Classic", "https://example.com/a"),
            MealOption::new(2, "Amatriciana", "Spicy", "https://example.com/b"),
        ]);
        state.refine_dishes = Some(vec!["lasagna".into()]);
        state.trace = vec!["searched".into()];
        state
    }

    #[test]
    fn every_update_field_has_a_rule() {
        let update = StateUpdate {
            direct_url: Patch::Set(String::new()),
            cuisine_type: Patch::Set(String::new()),
            preferred_sources: Patch::Set(vec![]),
            search_results: Patch::Set(String::new()),
            meal_options: Patch::Set(vec![]),
            selected_meal: Patch::Clear,
            refinement_count: Patch::Set(0),
            refine_dishes: Patch::Set(vec![]),
            grocery_list: Patch::Set(vec![]),
            reminders_added: Patch::Set(false),
            error: Patch::Set(String::new()),
            trace: vec!["x".into()],
        };
        for field in update.touched_fields() {
            assert!(rule_for(field).is_some(), "no merge rule for {field}");
        }
        assert_eq!(FIELD_RULES.len(), update.touched_fields().len());
    }

    #[test]
    fn overwrite_fields_are_idempotent() {
        let state = sample_state();
        let update = StateUpdate::new()
            .refinement_count(2)
            .reminders_added(true)
            .error("no recipes found")
            .selected_meal(MealOption::new(1, "Carbonara", "Classic", "https://example.com/a"));

        let once = merge(&state, &update);
        let twice = merge(&once, &update);
        assert_eq!(once, twice);
        assert_eq!(twice.refinement_count, 2);
        assert_eq!(twice.error.as_deref(), Some("no recipes found"));
    }

    #[test]
    fn replace_swaps_whole_list() {
        let state = sample_state();
        let filtered = vec![MealOption::new(1, "Amatriciana", "Spicy", "https://example.com/b")];
        let next = merge(&state, &StateUpdate::new().meal_options(filtered.clone()));
        assert_eq!(next.meal_options(), filtered.as_slice());
    }

    #[test]
    fn append_extends_trace() {
        let state = sample_state();
        let mut next = state.clone();
        apply(&mut next, StateUpdate::new().trace("parsed").trace("validated"));
        assert_eq!(next.trace, ["searched", "parsed", "validated"]);
    }

    #[test]
    fn clear_resets_field() {
        let state = sample_state();
        let next = merge(&state, &StateUpdate::new().clear_refine_dishes());
        assert!(next.refine_dishes.is_none());
        assert!(next.refine_dishes().is_empty());
    }

    #[test]
    fn keep_leaves_state_untouched() {
        let state = sample_state();
        let next = merge(&state, &StateUpdate::new());
        assert_eq!(next, state);
    }

    #[test]
    fn grocery_list_replace_then_clear() {
        let mut state = WorkflowState::default();
        apply(
            &mut state,
            StateUpdate::new().grocery_list(vec![Ingredient::new("salt", "1", "tsp")]),
        );
        assert_eq!(state.grocery_list().len(), 1);

        let mut update = StateUpdate::new();
        update.grocery_list = Patch::Clear;
        apply(&mut state, update);
        assert!(state.grocery_list.is_none());
    }
}
