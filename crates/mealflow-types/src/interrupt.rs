//! Interrupt payloads shown to the caller when a node suspends execution.

use serde::{Deserialize, Serialize};

use crate::state::{Ingredient, MealOption};

/// Structured value emitted by an interrupting node.
///
/// Persisted alongside the session so a reconnecting caller can be shown the
/// pending prompt again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterruptPayload {
    /// Pick one of the recipe candidates.
    MealOptions {
        options: Vec<MealOption>,
        prompt: String,
        instruction: String,
    },
    /// Approve or prune the extracted ingredients.
    IngredientReview {
        ingredients: Vec<Ingredient>,
        prompt: String,
        instruction: String,
    },
    /// Choose a reminders list (or skip).
    RemindersPrompt {
        items: Vec<Ingredient>,
        existing_lists: Vec<String>,
        prompt: String,
        instruction: String,
    },
    /// Any other prompt, keyed by the interrupting node.
    Generic {
        node: String,
        prompt: String,
        #[serde(default)]
        data: serde_json::Value,
    },
}

impl InterruptPayload {
    /// Name of the stream event that carries this payload.
    pub fn event_name(&self) -> &'static str {
        match self {
            InterruptPayload::MealOptions { .. } => "meal_options",
            InterruptPayload::IngredientReview { .. } => "ingredient_review",
            InterruptPayload::RemindersPrompt { .. } => "reminders_prompt",
            InterruptPayload::Generic { .. } => "interrupt",
        }
    }

    pub fn prompt(&self) -> &str {
        match self {
            InterruptPayload::MealOptions { prompt, .. }
            | InterruptPayload::IngredientReview { prompt, .. }
            | InterruptPayload::RemindersPrompt { prompt, .. }
            | InterruptPayload::Generic { prompt, .. } => prompt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_with_kind_tag() {
        let payload = InterruptPayload::RemindersPrompt {
            items: vec![Ingredient::new("salt", "1", "tsp")],
            existing_lists: vec!["Groceries".into()],
            prompt: "Add to reminders?".into(),
            instruction: "Enter list number, new list name, or 'skip'".into(),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "reminders_prompt");
        assert_eq!(json["existing_lists"][0], "Groceries");

        let back: InterruptPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back, payload);
        assert_eq!(back.event_name(), "reminders_prompt");
    }

    #[test]
    fn generic_payload_uses_interrupt_event() {
        let payload = InterruptPayload::Generic {
            node: "confirm".into(),
            prompt: "Continue?".into(),
            data: serde_json::Value::Null,
        };
        assert_eq!(payload.event_name(), "interrupt");
        assert_eq!(payload.prompt(), "Continue?");
    }
}
