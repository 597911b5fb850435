//! Ingredient extraction and user review.

use std::collections::HashSet;
use std::sync::Arc;

use mealflow_types::interrupt::InterruptPayload;
use mealflow_types::state::{Ingredient, WorkflowState};
use mealflow_types::update::StateUpdate;

use super::{EXTRACT_INGREDIENTS, PlannerPolicy, REVIEW_INGREDIENTS};
use crate::collaborators::IngredientExtractor;
use crate::collate::format_reminder_text;
use crate::node::{Node, NodeOutcome};

// ---------------------------------------------------------------------------
// extract_ingredients
// ---------------------------------------------------------------------------

pub struct ExtractIngredients<E> {
    extractor: Arc<E>,
    policy: PlannerPolicy,
}

impl<E> ExtractIngredients<E> {
    pub fn new(extractor: Arc<E>, policy: PlannerPolicy) -> Self {
        Self { extractor, policy }
    }
}

impl<E: IngredientExtractor> Node for ExtractIngredients<E> {
    fn name(&self) -> &str {
        EXTRACT_INGREDIENTS
    }

    fn status_message(&self) -> Option<&str> {
        Some("Extracting ingredients from recipe...")
    }

    fn reads(&self) -> &'static [&'static str] {
        &["selected_meal"]
    }

    fn writes(&self) -> &'static [&'static str] {
        &["grocery_list", "error"]
    }

    async fn run(&self, state: &WorkflowState, _resume: Option<&str>) -> NodeOutcome {
        let Some(url) = state
            .selected_meal
            .as_ref()
            .map(|meal| meal.recipe_url.as_str())
            .filter(|url| !url.trim().is_empty())
        else {
            tracing::debug!("no recipe URL selected, nothing to extract");
            return NodeOutcome::Update(StateUpdate::new().grocery_list(Vec::new()));
        };

        match self.policy.retry.run(EXTRACT_INGREDIENTS, || self.extractor.extract(url)).await {
            Ok(items) if items.is_empty() => NodeOutcome::Update(
                StateUpdate::new()
                    .grocery_list(Vec::new())
                    .error(format!("No ingredients found at {url}")),
            ),
            Ok(items) => {
                tracing::info!(url, count = items.len(), "extracted ingredients");
                NodeOutcome::Update(StateUpdate::new().grocery_list(items))
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "ingredient extraction failed");
                NodeOutcome::Update(
                    StateUpdate::new()
                        .grocery_list(Vec::new())
                        .error(format!("Failed to fetch recipe from {url}: {}", e.reason())),
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// review_ingredients
// ---------------------------------------------------------------------------

/// A parsed review answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewCommand {
    Keep,
    RemoveAll,
    /// 1-based indices and lowercase names to drop.
    Remove {
        indices: HashSet<usize>,
        names: HashSet<String>,
    },
}

impl ReviewCommand {
    /// Parse review input. Unrecognized input keeps the list unchanged.
    pub fn parse(input: &str) -> Self {
        let input = input.trim().to_lowercase();
        if matches!(input.as_str(), "" | "ok" | "yes") {
            return Self::Keep;
        }
        let Some(rest) = input.strip_prefix("remove") else {
            return Self::Keep;
        };
        let rest = rest.trim_start_matches(':').trim();
        if rest == "all" {
            return Self::RemoveAll;
        }

        let mut indices = HashSet::new();
        let mut names = HashSet::new();
        for part in rest.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let numbers: Option<Vec<usize>> = part.split_whitespace().map(|w| w.parse().ok()).collect();
            match numbers {
                Some(numbers) => indices.extend(numbers),
                None => {
                    names.insert(part.to_string());
                }
            }
        }
        if indices.is_empty() && names.is_empty() {
            Self::Keep
        } else {
            Self::Remove { indices, names }
        }
    }

    pub fn apply(&self, items: &[Ingredient]) -> Vec<Ingredient> {
        match self {
            Self::Keep => items.to_vec(),
            Self::RemoveAll => Vec::new(),
            Self::Remove { indices, names } => items
                .iter()
                .zip(1usize..)
                .filter(|(item, i)| !indices.contains(i) && !names.contains(&item.name.trim().to_lowercase()))
                .map(|(item, _)| item.clone())
                .collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ReviewIngredients;

impl Node for ReviewIngredients {
    fn name(&self) -> &str {
        REVIEW_INGREDIENTS
    }

    fn is_interrupt(&self) -> bool {
        true
    }

    fn status_message(&self) -> Option<&str> {
        Some("Preparing ingredient list for review...")
    }

    fn reads(&self) -> &'static [&'static str] {
        &["grocery_list"]
    }

    fn writes(&self) -> &'static [&'static str] {
        &["grocery_list"]
    }

    async fn run(&self, state: &WorkflowState, resume: Option<&str>) -> NodeOutcome {
        let items = state.grocery_list();
        if items.is_empty() {
            return NodeOutcome::Update(StateUpdate::new().grocery_list(Vec::new()));
        }

        let Some(input) = resume else {
            let mut prompt = String::from("Review ingredients:");
            for (i, item) in items.iter().enumerate() {
                prompt.push_str(&format!("\n{}. {}", i + 1, format_reminder_text(item)));
            }
            return NodeOutcome::Interrupt(InterruptPayload::IngredientReview {
                ingredients: items.to_vec(),
                prompt,
                instruction: "Enter 'ok' to approve or 'remove X, Y, Z' to remove items".into(),
            });
        };

        let kept = ReviewCommand::parse(input).apply(items);
        if kept.len() != items.len() {
            tracing::info!(removed = items.len() - kept.len(), "ingredients removed on review");
        }
        NodeOutcome::Update(StateUpdate::new().grocery_list(kept))
    }
}
