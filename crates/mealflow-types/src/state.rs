//! Workflow state for a meal planning session.
//!
//! `WorkflowState` is the shared record every node reads from. Nodes never
//! mutate it directly; they return a `StateUpdate` that the engine merges
//! according to the per-field policy in `mealflow_core::merge`.

use serde::{Deserialize, Serialize};

/// A recipe candidate offered to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealOption {
    /// 1-based selection number.
    pub id: u32,
    /// Recipe or dish name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Absolute URL of the single-recipe page.
    pub recipe_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<String>,
}

impl MealOption {
    pub fn new(
        id: u32,
        name: impl Into<String>,
        description: impl Into<String>,
        recipe_url: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: description.into(),
            recipe_url: recipe_url.into(),
            cook_time: None,
            servings: None,
        }
    }
}

/// A single grocery line: name plus free-form amount and unit.
///
/// Amounts stay textual ("1/2", "1-2") because recipes rarely agree on a
/// numeric format. `unit` is empty when the recipe gives none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub amount: String,
    #[serde(default)]
    pub unit: String,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, amount: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            amount: amount.into(),
            unit: unit.into(),
        }
    }
}

/// Shared, per-session workflow state.
///
/// Exactly one of `direct_url` / `cuisine_type` is meaningful at session
/// creation; use [`WorkflowState::for_cuisine`] or
/// [`WorkflowState::for_direct_url`] to build a valid initial state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_url: Option<String>,
    #[serde(default)]
    pub cuisine_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_sources: Option<Vec<String>>,
    /// Raw search engine output, opaque to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_results: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_options: Option<Vec<MealOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_meal: Option<MealOption>,
    #[serde(default)]
    pub refinement_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refine_dishes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grocery_list: Option<Vec<Ingredient>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reminders_added: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Append-only progress trace written by nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
}

impl WorkflowState {
    /// Initial state for a search-driven session.
    pub fn for_cuisine(cuisine_type: impl Into<String>, preferred_sources: Vec<String>) -> Self {
        Self {
            cuisine_type: cuisine_type.into(),
            preferred_sources: Some(preferred_sources),
            ..Self::default()
        }
    }

    /// Initial state for a session that starts from a known recipe URL.
    pub fn for_direct_url(url: impl Into<String>) -> Self {
        Self {
            direct_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Current candidates, empty when none were produced yet.
    pub fn meal_options(&self) -> &[MealOption] {
        self.meal_options.as_deref().unwrap_or_default()
    }

    /// Current grocery list, empty when none was extracted yet.
    pub fn grocery_list(&self) -> &[Ingredient] {
        self.grocery_list.as_deref().unwrap_or_default()
    }

    pub fn preferred_sources(&self) -> &[String] {
        self.preferred_sources.as_deref().unwrap_or_default()
    }

    pub fn refine_dishes(&self) -> &[String] {
        self.refine_dishes.as_deref().unwrap_or_default()
    }

    /// Whether the session entered through a direct recipe URL.
    pub fn has_direct_url(&self) -> bool {
        self.direct_url
            .as_deref()
            .is_some_and(|u| u.starts_with("http://") || u.starts_with("https://"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuisine_state_leaves_url_unset() {
        let state = WorkflowState::for_cuisine("italian", vec!["bonappetit.com".into()]);
        assert!(state.direct_url.is_none());
        assert_eq!(state.cuisine_type, "italian");
        assert_eq!(state.preferred_sources(), ["bonappetit.com".to_string()]);
        assert_eq!(state.refinement_count, 0);
        assert!(!state.has_direct_url());
    }

    #[test]
    fn direct_url_requires_http_scheme() {
        assert!(WorkflowState::for_direct_url("https://example.com/r").has_direct_url());
        assert!(!WorkflowState::for_direct_url("example.com/r").has_direct_url());
    }

    #[test]
    fn absent_lists_read_as_empty() {
        let state = WorkflowState::default();
        assert!(state.meal_options().is_empty());
        assert!(state.grocery_list().is_empty());
        assert!(state.refine_dishes().is_empty());
    }

    #[test]
    fn state_serializes_without_empty_fields() {
        let state = WorkflowState::for_direct_url("https://example.com/r");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["direct_url"], "https://example.com/r");
        assert!(json.get("meal_options").is_none());
        assert!(json.get("trace").is_none());

        let back: WorkflowState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }
}
