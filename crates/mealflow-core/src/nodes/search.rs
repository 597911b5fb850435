//! Search path: find candidates, validate them, refine, and let the user pick.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::time::Instant;

use mealflow_types::interrupt::InterruptPayload;
use mealflow_types::state::{MealOption, WorkflowState};
use mealflow_types::update::StateUpdate;

use super::{
    PARSE_MEALS, PRESENT_OPTIONS, PlannerPolicy, REFINE_SEARCH, SEARCH_MEALS, VALIDATE_RECIPES,
    cuisine_query, renumber,
};
use crate::collaborators::{RecipeParser, SearchProvider, UrlValidator};
use crate::node::{Node, NodeOutcome};

/// Dishes searched per refinement round.
const MAX_REFINE_DISHES: usize = 5;

// ---------------------------------------------------------------------------
// search_meals
// ---------------------------------------------------------------------------

pub struct SearchMeals<S> {
    search: Arc<S>,
    policy: PlannerPolicy,
}

impl<S> SearchMeals<S> {
    pub fn new(search: Arc<S>, policy: PlannerPolicy) -> Self {
        Self { search, policy }
    }
}

impl<S: SearchProvider> Node for SearchMeals<S> {
    fn name(&self) -> &str {
        SEARCH_MEALS
    }

    fn status_message(&self) -> Option<&str> {
        Some("Searching for recipes...")
    }

    fn reads(&self) -> &'static [&'static str] {
        &["cuisine_type", "preferred_sources"]
    }

    fn writes(&self) -> &'static [&'static str] {
        &["search_results", "trace"]
    }

    async fn run(&self, state: &WorkflowState, _resume: Option<&str>) -> NodeOutcome {
        let query = cuisine_query(&state.cuisine_type);
        let sources = state.preferred_sources();
        let result = self
            .policy
            .retry
            .run(SEARCH_MEALS, || self.search.search(&query, sources))
            .await;

        match result {
            Ok(raw) => NodeOutcome::Update(
                StateUpdate::new()
                    .search_results(raw)
                    .trace(format!("searched: {query}")),
            ),
            Err(e) => {
                tracing::warn!(error = %e, query = %query, "recipe search failed");
                NodeOutcome::Fail(format!("Recipe search failed: {}", e.reason()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// parse_meals
// ---------------------------------------------------------------------------

pub struct ParseMeals<P> {
    parser: Arc<P>,
    policy: PlannerPolicy,
}

impl<P> ParseMeals<P> {
    pub fn new(parser: Arc<P>, policy: PlannerPolicy) -> Self {
        Self { parser, policy }
    }
}

impl<P: RecipeParser> Node for ParseMeals<P> {
    fn name(&self) -> &str {
        PARSE_MEALS
    }

    fn status_message(&self) -> Option<&str> {
        Some("Analyzing search results...")
    }

    fn reads(&self) -> &'static [&'static str] {
        &["search_results", "cuisine_type"]
    }

    fn writes(&self) -> &'static [&'static str] {
        &["meal_options", "trace"]
    }

    async fn run(&self, state: &WorkflowState, _resume: Option<&str>) -> NodeOutcome {
        let raw = state.search_results.as_deref().unwrap_or_default();
        let parsed = match self.parser.parse(raw, &state.cuisine_type).await {
            Ok(parsed) => parsed,
            Err(e) => {
                // Nothing usable; validate/refine decides what happens next.
                tracing::warn!(error = %e, "could not parse search results");
                Vec::new()
            }
        };
        let options = renumber(parsed.into_iter().take(self.policy.max_candidates));
        let count = options.len();
        NodeOutcome::Update(
            StateUpdate::new()
                .meal_options(options)
                .trace(format!("parsed {count} candidates")),
        )
    }
}

// ---------------------------------------------------------------------------
// validate_recipes
// ---------------------------------------------------------------------------

pub struct ValidateRecipes<V, S> {
    validator: Arc<V>,
    search: Arc<S>,
    policy: PlannerPolicy,
}

impl<V, S> ValidateRecipes<V, S> {
    pub fn new(validator: Arc<V>, search: Arc<S>, policy: PlannerPolicy) -> Self {
        Self {
            validator,
            search,
            policy,
        }
    }
}

impl<V: UrlValidator, S: SearchProvider> ValidateRecipes<V, S> {
    /// Check one candidate. A check slower than the validation timeout
    /// counts as invalid.
    async fn check(&self, url: &str) -> bool {
        match tokio::time::timeout(self.policy.validate_timeout, self.validator.validate(url)).await {
            Ok(valid) => valid,
            Err(_elapsed) => {
                tracing::debug!(url, "validation timed out");
                false
            }
        }
    }

    /// Dishes to search in the next refinement round.
    async fn refine_candidates(&self, cuisine: &str, dropped: &[MealOption], deadline: Instant) -> Vec<String> {
        match tokio::time::timeout_at(deadline, self.search.suggest_dishes(cuisine, MAX_REFINE_DISHES)).await {
            Ok(Ok(dishes)) if !dishes.is_empty() => return dishes,
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, cuisine, "dish suggestion failed"),
            Err(_elapsed) => tracing::warn!(cuisine, "dish suggestion timed out"),
        }
        let from_dropped: Vec<String> = dropped
            .iter()
            .map(|m| m.name.trim().to_string())
            .filter(|name| !name.is_empty())
            .take(MAX_REFINE_DISHES)
            .collect();
        if from_dropped.is_empty() {
            vec![format!("{cuisine} dinner")]
        } else {
            from_dropped
        }
    }
}

impl<V: UrlValidator, S: SearchProvider> Node for ValidateRecipes<V, S> {
    fn name(&self) -> &str {
        VALIDATE_RECIPES
    }

    fn status_message(&self) -> Option<&str> {
        Some("Validating recipe URLs...")
    }

    fn reads(&self) -> &'static [&'static str] {
        &["meal_options", "cuisine_type", "refinement_count"]
    }

    fn writes(&self) -> &'static [&'static str] {
        &["meal_options", "refine_dishes"]
    }

    async fn run(&self, state: &WorkflowState, _resume: Option<&str>) -> NodeOutcome {
        let deadline = Instant::now() + self.policy.call_budget;
        let options = state.meal_options();
        let verdicts = join_all(options.iter().map(|option| self.check(&option.recipe_url))).await;

        let mut valid = Vec::new();
        let mut dropped = Vec::new();
        for (option, ok) in options.iter().zip(verdicts) {
            if ok {
                valid.push(option.clone());
            } else {
                tracing::debug!(url = %option.recipe_url, "dropping candidate that is not a single recipe");
                dropped.push(option.clone());
            }
        }

        let valid = renumber(valid);
        let mut update = StateUpdate::new();
        if valid.len() < self.policy.min_valid_candidates && self.policy.can_refine(state.refinement_count) {
            let dishes = self.refine_candidates(&state.cuisine_type, &dropped, deadline).await;
            update = update.refine_dishes(dishes);
        }
        NodeOutcome::Update(update.meal_options(valid))
    }
}

// ---------------------------------------------------------------------------
// refine_search
// ---------------------------------------------------------------------------

pub struct RefineSearch<S, P> {
    search: Arc<S>,
    parser: Arc<P>,
    policy: PlannerPolicy,
}

impl<S, P> RefineSearch<S, P> {
    pub fn new(search: Arc<S>, parser: Arc<P>, policy: PlannerPolicy) -> Self {
        Self {
            search,
            parser,
            policy,
        }
    }
}

impl<S: SearchProvider, P: RecipeParser> Node for RefineSearch<S, P> {
    fn name(&self) -> &str {
        REFINE_SEARCH
    }

    fn status_message(&self) -> Option<&str> {
        Some("Refining search with specific dishes...")
    }

    fn reads(&self) -> &'static [&'static str] {
        &[
            "cuisine_type",
            "preferred_sources",
            "refine_dishes",
            "meal_options",
            "refinement_count",
        ]
    }

    fn writes(&self) -> &'static [&'static str] {
        &["meal_options", "search_results", "refinement_count", "refine_dishes"]
    }

    async fn run(&self, state: &WorkflowState, _resume: Option<&str>) -> NodeOutcome {
        let cuisine = state.cuisine_type.as_str();
        let mut dishes: Vec<String> = state.refine_dishes().iter().take(MAX_REFINE_DISHES).cloned().collect();
        if dishes.is_empty() {
            dishes.push(format!("{cuisine} dinner"));
        }

        let sources = state.preferred_sources();
        let searches = dishes.iter().map(|dish| async move {
            let query = format!("{dish} recipe");
            let result = self.policy.retry.run(REFINE_SEARCH, || self.search.search(&query, sources)).await;
            (dish, result)
        });
        let mut sections = Vec::with_capacity(dishes.len());
        for (dish, result) in join_all(searches).await {
            match result {
                Ok(raw) => sections.push(format!("--- {dish} ---\n{raw}")),
                Err(e) => tracing::warn!(error = %e, dish = %dish, "refinement search failed"),
            }
        }
        let combined = sections.join("\n\n");

        let found = match self.parser.parse(&combined, cuisine).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "could not parse refinement results");
                Vec::new()
            }
        };

        let mut seen = HashSet::new();
        let merged = state
            .meal_options()
            .iter()
            .cloned()
            .chain(found)
            .filter(|option| !option.recipe_url.is_empty() && seen.insert(option.recipe_url.clone()))
            .take(self.policy.max_candidates);
        let options = renumber(merged);

        let count = (state.refinement_count + 1).min(self.policy.max_refinements);
        tracing::debug!(candidates = options.len(), refinement_count = count, "refinement round done");

        NodeOutcome::Update(
            StateUpdate::new()
                .meal_options(options)
                .search_results(combined)
                .refinement_count(count)
                .clear_refine_dishes(),
        )
    }
}

/// Branch after `validate_recipes`: present when there are enough valid
/// candidates or refinement is exhausted, refine otherwise.
pub fn should_refine(policy: &PlannerPolicy, state: &WorkflowState) -> &'static str {
    let enough = state.meal_options().len() >= policy.min_valid_candidates;
    if enough || !policy.can_refine(state.refinement_count) {
        PRESENT_OPTIONS
    } else {
        REFINE_SEARCH
    }
}

// ---------------------------------------------------------------------------
// present_options
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct PresentOptions;

impl PresentOptions {
    fn prompt(state: &WorkflowState) -> String {
        let mut text = if state.cuisine_type.is_empty() {
            "Here are some recipes:".to_string()
        } else {
            format!("Here are some {} recipes:", state.cuisine_type)
        };
        for option in state.meal_options() {
            text.push_str(&format!("\n{}. {}: {}", option.id, option.name, option.description));
        }
        text
    }

    /// 1-based selection; anything unparseable or out of range picks the first.
    pub fn select<'a>(options: &'a [MealOption], input: &str) -> Option<&'a MealOption> {
        input
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=options.len()).contains(n))
            .and_then(|n| options.get(n - 1))
            .or_else(|| options.first())
    }
}

impl Node for PresentOptions {
    fn name(&self) -> &str {
        PRESENT_OPTIONS
    }

    fn is_interrupt(&self) -> bool {
        true
    }

    fn status_message(&self) -> Option<&str> {
        Some("Preparing meal options...")
    }

    fn reads(&self) -> &'static [&'static str] {
        &["meal_options"]
    }

    fn writes(&self) -> &'static [&'static str] {
        &["selected_meal"]
    }

    async fn run(&self, state: &WorkflowState, resume: Option<&str>) -> NodeOutcome {
        let options = state.meal_options();
        if options.is_empty() {
            let cuisine = state.cuisine_type.as_str();
            return NodeOutcome::Fail(if cuisine.is_empty() {
                "No recipes found".to_string()
            } else {
                format!("No recipes found for {cuisine}")
            });
        }

        let Some(input) = resume else {
            return NodeOutcome::Interrupt(InterruptPayload::MealOptions {
                options: options.to_vec(),
                prompt: Self::prompt(state),
                instruction: format!("Enter a number 1-{} to select a recipe", options.len()),
            });
        };

        match Self::select(options, input) {
            Some(selected) => {
                tracing::info!(meal = %selected.name, "meal selected");
                NodeOutcome::Update(StateUpdate::new().selected_meal(selected.clone()))
            }
            None => NodeOutcome::Fail("no recipes to select from".into()),
        }
    }
}
