//! Collaborator ports consumed by the meal planner nodes.
//!
//! Search, recipe parsing, URL validation, ingredient extraction and the
//! reminders list are external concerns. The engine only sees these traits;
//! mealflow-infra provides HTTP implementations and the `testing` module
//! (feature `test-util`) provides scripted fakes.
//!
//! Uses native async fn in traits (Rust 2024 edition, no async_trait macro).

use std::future::Future;

use mealflow_types::error::CollaboratorError;
use mealflow_types::state::{Ingredient, MealOption};

/// Web search returning raw, unparsed result text.
pub trait SearchProvider: Send + Sync {
    /// Run `query` restricted to `sources` (site identifiers). An empty
    /// source list searches everywhere.
    fn search(
        &self,
        query: &str,
        sources: &[String],
    ) -> impl Future<Output = Result<String, CollaboratorError>> + Send;

    /// Suggest specific dish names for a cuisine, used to refine a search
    /// that produced too few usable recipes.
    fn suggest_dishes(
        &self,
        _cuisine: &str,
        _limit: usize,
    ) -> impl Future<Output = Result<Vec<String>, CollaboratorError>> + Send {
        async { Ok(Vec::new()) }
    }
}

/// Turns raw search output into recipe candidates.
pub trait RecipeParser: Send + Sync {
    /// Candidate ids in the result are not significant; callers renumber.
    fn parse(
        &self,
        raw_results: &str,
        cuisine: &str,
    ) -> impl Future<Output = Result<Vec<MealOption>, CollaboratorError>> + Send;
}

/// Checks that a URL points at a single, reachable recipe page.
pub trait UrlValidator: Send + Sync {
    fn validate(&self, url: &str) -> impl Future<Output = bool> + Send;
}

/// Reads the ingredient list (and title) of a recipe page.
pub trait IngredientExtractor: Send + Sync {
    fn extract(
        &self,
        recipe_url: &str,
    ) -> impl Future<Output = Result<Vec<Ingredient>, CollaboratorError>> + Send;

    /// Recipe title from the page, if one can be found.
    fn title(
        &self,
        _recipe_url: &str,
    ) -> impl Future<Output = Result<Option<String>, CollaboratorError>> + Send {
        async { Ok(None) }
    }
}

/// Named reminder lists holding one text item per grocery line.
pub trait ReminderListClient: Send + Sync {
    /// Names of the existing lists.
    fn lists(&self) -> impl Future<Output = Result<Vec<String>, CollaboratorError>> + Send;

    /// Item texts currently on `list`.
    fn items(&self, list: &str) -> impl Future<Output = Result<Vec<String>, CollaboratorError>> + Send;

    fn create_list(&self, list: &str) -> impl Future<Output = Result<(), CollaboratorError>> + Send;

    fn add_item(
        &self,
        list: &str,
        text: &str,
    ) -> impl Future<Output = Result<(), CollaboratorError>> + Send;

    fn remove_items(
        &self,
        list: &str,
        texts: &[String],
    ) -> impl Future<Output = Result<(), CollaboratorError>> + Send;
}
