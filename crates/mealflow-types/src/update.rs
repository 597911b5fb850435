//! Partial state updates returned by nodes.
//!
//! Every field of [`StateUpdate`] is independent. Replaceable fields use
//! [`Patch`] so a node can say "leave it", "set it" or "clear it" explicitly;
//! the append-only `trace` field is a plain list of new entries.

use crate::state::{Ingredient, MealOption};

/// Per-field instruction carried by a [`StateUpdate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// Field untouched by this update.
    #[default]
    Keep,
    /// Overwrite the field with the given value.
    Set(T),
    /// Reset the field to empty (the "clear" sentinel).
    Clear,
}

impl<T> Patch<T> {
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }
}

/// A node's partial write to the workflow state.
///
/// Built with the chained setters:
///
/// ```
/// use mealflow_types::update::StateUpdate;
///
/// let update = StateUpdate::new()
///     .refinement_count(1)
///     .clear_refine_dishes()
///     .trace("refined search");
/// assert_eq!(update.touched_fields(), ["refinement_count", "refine_dishes", "trace"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub direct_url: Patch<String>,
    pub cuisine_type: Patch<String>,
    pub preferred_sources: Patch<Vec<String>>,
    pub search_results: Patch<String>,
    pub meal_options: Patch<Vec<MealOption>>,
    pub selected_meal: Patch<MealOption>,
    pub refinement_count: Patch<u32>,
    pub refine_dishes: Patch<Vec<String>>,
    pub grocery_list: Patch<Vec<Ingredient>>,
    pub reminders_added: Patch<bool>,
    pub error: Patch<String>,
    /// Entries appended to the trace.
    pub trace: Vec<String>,
}

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search_results(mut self, raw: impl Into<String>) -> Self {
        self.search_results = Patch::Set(raw.into());
        self
    }

    pub fn meal_options(mut self, options: Vec<MealOption>) -> Self {
        self.meal_options = Patch::Set(options);
        self
    }

    pub fn selected_meal(mut self, meal: MealOption) -> Self {
        self.selected_meal = Patch::Set(meal);
        self
    }

    pub fn refinement_count(mut self, count: u32) -> Self {
        self.refinement_count = Patch::Set(count);
        self
    }

    pub fn refine_dishes(mut self, dishes: Vec<String>) -> Self {
        self.refine_dishes = Patch::Set(dishes);
        self
    }

    pub fn clear_refine_dishes(mut self) -> Self {
        self.refine_dishes = Patch::Clear;
        self
    }

    pub fn grocery_list(mut self, items: Vec<Ingredient>) -> Self {
        self.grocery_list = Patch::Set(items);
        self
    }

    pub fn reminders_added(mut self, added: bool) -> Self {
        self.reminders_added = Patch::Set(added);
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error = Patch::Set(message.into());
        self
    }

    pub fn trace(mut self, entry: impl Into<String>) -> Self {
        self.trace.push(entry.into());
        self
    }

    /// Whether this update sets the `error` field.
    pub fn sets_error(&self) -> bool {
        matches!(self.error, Patch::Set(_))
    }

    /// Names of the fields this update writes, in declaration order.
    pub fn touched_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        let patches: [(&'static str, bool); 11] = [
            ("direct_url", self.direct_url.is_keep()),
            ("cuisine_type", self.cuisine_type.is_keep()),
            ("preferred_sources", self.preferred_sources.is_keep()),
            ("search_results", self.search_results.is_keep()),
            ("meal_options", self.meal_options.is_keep()),
            ("selected_meal", self.selected_meal.is_keep()),
            ("refinement_count", self.refinement_count.is_keep()),
            ("refine_dishes", self.refine_dishes.is_keep()),
            ("grocery_list", self.grocery_list.is_keep()),
            ("reminders_added", self.reminders_added.is_keep()),
            ("error", self.error.is_keep()),
        ];
        for (name, keep) in patches {
            if !keep {
                fields.push(name);
            }
        }
        if !self.trace.is_empty() {
            fields.push("trace");
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.touched_fields().is_empty()
    }
}
