//! The meal planner workflow: node registry and graph assembly.
//!
//! ```text
//! meal_planner:
//!   START -(route_by_input)-> search_meals | create_meal_from_url
//!   search_meals -> parse_meals -> validate_recipes
//!   validate_recipes -(should_refine)-> refine_search | present_options
//!   refine_search -> validate_recipes
//!   present_options -> process_meal
//!   create_meal_from_url -> process_meal
//!   process_meal -> END
//!
//! process_meal:
//!   extract_ingredients -> review_ingredients -> add_to_reminders -> END
//! ```

use std::sync::Arc;

use mealflow_types::config::EngineConfig;
use mealflow_types::state::WorkflowState;

use crate::collaborators::{
    IngredientExtractor, RecipeParser, ReminderListClient, SearchProvider, UrlValidator,
};
use crate::graph::{GraphBuilder, GraphError, Workflow};
use crate::node::NodeRegistry;
use crate::nodes::{
    self, ADD_TO_REMINDERS, AddToReminders, CREATE_MEAL_FROM_URL, CreateMealFromUrl,
    EXTRACT_INGREDIENTS, ExtractIngredients, PARSE_MEALS, PRESENT_OPTIONS, PROCESS_MEAL,
    ParseMeals, PlannerPolicy, PresentOptions, REFINE_SEARCH, REVIEW_INGREDIENTS, RefineSearch,
    ReviewIngredients, SEARCH_MEALS, SearchMeals, VALIDATE_RECIPES, ValidateRecipes,
};

pub const MEAL_PLANNER: &str = "meal_planner";

/// The external services the planner nodes call.
pub struct Collaborators<S, P, V, E, R> {
    pub search: Arc<S>,
    pub parser: Arc<P>,
    pub validator: Arc<V>,
    pub extractor: Arc<E>,
    pub reminders: Arc<R>,
}

impl<S, P, V, E, R> Clone for Collaborators<S, P, V, E, R> {
    fn clone(&self) -> Self {
        Self {
            search: Arc::clone(&self.search),
            parser: Arc::clone(&self.parser),
            validator: Arc::clone(&self.validator),
            extractor: Arc::clone(&self.extractor),
            reminders: Arc::clone(&self.reminders),
        }
    }
}

/// Entry branch: sessions with an http(s) direct URL skip the search path.
pub fn route_by_input(state: &WorkflowState) -> String {
    if state.has_direct_url() {
        CREATE_MEAL_FROM_URL.to_string()
    } else {
        SEARCH_MEALS.to_string()
    }
}

/// Register every planner node against the given collaborators.
pub fn build_registry<S, P, V, E, R>(
    collaborators: &Collaborators<S, P, V, E, R>,
    policy: PlannerPolicy,
) -> NodeRegistry
where
    S: SearchProvider + 'static,
    P: RecipeParser + 'static,
    V: UrlValidator + 'static,
    E: IngredientExtractor + 'static,
    R: ReminderListClient + 'static,
{
    let c = collaborators;
    let mut registry = NodeRegistry::new();
    registry
        .register(SearchMeals::new(Arc::clone(&c.search), policy))
        .register(ParseMeals::new(Arc::clone(&c.parser), policy))
        .register(ValidateRecipes::new(
            Arc::clone(&c.validator),
            Arc::clone(&c.search),
            policy,
        ))
        .register(RefineSearch::new(Arc::clone(&c.search), Arc::clone(&c.parser), policy))
        .register(PresentOptions)
        .register(CreateMealFromUrl::new(Arc::clone(&c.extractor), policy))
        .register(ExtractIngredients::new(Arc::clone(&c.extractor), policy))
        .register(ReviewIngredients)
        .register(AddToReminders::new(Arc::clone(&c.reminders)));
    registry
}

/// Assemble the meal planner workflow.
pub fn build_workflow<S, P, V, E, R>(
    collaborators: &Collaborators<S, P, V, E, R>,
    config: &EngineConfig,
) -> Result<Workflow, GraphError>
where
    S: SearchProvider + 'static,
    P: RecipeParser + 'static,
    V: UrlValidator + 'static,
    E: IngredientExtractor + 'static,
    R: ReminderListClient + 'static,
{
    let policy = PlannerPolicy::from_config(config);
    let registry = build_registry(collaborators, policy);

    let process_meal = GraphBuilder::new(PROCESS_MEAL)
        .entry(EXTRACT_INGREDIENTS)
        .step(EXTRACT_INGREDIENTS)
        .step(REVIEW_INGREDIENTS)
        .step(ADD_TO_REMINDERS)
        .edge(EXTRACT_INGREDIENTS, REVIEW_INGREDIENTS)
        .edge(REVIEW_INGREDIENTS, ADD_TO_REMINDERS)
        .end(ADD_TO_REMINDERS)
        .build(&registry)?;

    let root = GraphBuilder::new(MEAL_PLANNER)
        .conditional_entry(route_by_input, &[SEARCH_MEALS, CREATE_MEAL_FROM_URL])
        .step(SEARCH_MEALS)
        .step(PARSE_MEALS)
        .step(VALIDATE_RECIPES)
        .step(REFINE_SEARCH)
        .step(PRESENT_OPTIONS)
        .step(CREATE_MEAL_FROM_URL)
        .subgraph(PROCESS_MEAL, PROCESS_MEAL, Some("Processing selected meal..."))
        .edge(SEARCH_MEALS, PARSE_MEALS)
        .edge(PARSE_MEALS, VALIDATE_RECIPES)
        .conditional(
            VALIDATE_RECIPES,
            move |state: &WorkflowState| nodes::should_refine(&policy, state).to_string(),
            &[REFINE_SEARCH, PRESENT_OPTIONS],
        )
        .edge(REFINE_SEARCH, VALIDATE_RECIPES)
        .edge(PRESENT_OPTIONS, PROCESS_MEAL)
        .edge(CREATE_MEAL_FROM_URL, PROCESS_MEAL)
        .end(PROCESS_MEAL)
        .build(&registry)?;

    Workflow::new(root, vec![process_meal])
}
