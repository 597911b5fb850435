use std::sync::Arc;

use mealflow_types::state::{MealOption, WorkflowState};
use mealflow_types::update::StateUpdate;

use super::{CREATE_MEAL_FROM_URL, PlannerPolicy};
use crate::collaborators::IngredientExtractor;
use crate::node::{Node, NodeOutcome};

/// Builds a single, auto-selected candidate from the session's direct URL.
pub struct CreateMealFromUrl<E> {
    extractor: Arc<E>,
    policy: PlannerPolicy,
}

impl<E> CreateMealFromUrl<E> {
    pub fn new(extractor: Arc<E>, policy: PlannerPolicy) -> Self {
        Self { extractor, policy }
    }
}

/// Title derived from the last path segment: `/pasta-alla-norma/` becomes
/// "Pasta Alla Norma".
pub fn title_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);
    let segment = path.split('/').skip(1).filter(|s| !s.is_empty()).last()?;
    let segment = segment
        .rsplit_once('.')
        .filter(|(_, ext)| matches!(*ext, "html" | "htm" | "php" | "aspx"))
        .map(|(stem, _)| stem)
        .unwrap_or(segment);

    let words: Vec<String> = segment
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect();
    (!words.is_empty()).then(|| words.join(" "))
}

impl<E: IngredientExtractor> Node for CreateMealFromUrl<E> {
    fn name(&self) -> &str {
        CREATE_MEAL_FROM_URL
    }

    fn status_message(&self) -> Option<&str> {
        Some("Fetching recipe from URL...")
    }

    fn reads(&self) -> &'static [&'static str] {
        &["direct_url"]
    }

    fn writes(&self) -> &'static [&'static str] {
        &["meal_options", "selected_meal"]
    }

    async fn run(&self, state: &WorkflowState, _resume: Option<&str>) -> NodeOutcome {
        let Some(url) = state.direct_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return NodeOutcome::Fail("no recipe URL provided".into());
        };

        let fetched = self
            .policy
            .retry
            .run(CREATE_MEAL_FROM_URL, || self.extractor.title(url))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(url, error = %e, "could not read recipe title");
                None
            });
        let title = fetched
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .or_else(|| title_from_url(url))
            .unwrap_or_else(|| "Recipe".to_string());

        let meal = MealOption::new(1, title, "Direct URL entry", url);
        NodeOutcome::Update(
            StateUpdate::new()
                .meal_options(vec![meal.clone()])
                .selected_meal(meal),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockExtractor;
    use mealflow_types::update::Patch;

    #[test]
    fn title_from_path_segment() {
        assert_eq!(
            title_from_url("https://example.com/recipes/pasta-alla-norma/").as_deref(),
            Some("Pasta Alla Norma")
        );
        assert_eq!(
            title_from_url("https://example.com/chicken_TIKKA.html?ref=x").as_deref(),
            Some("Chicken Tikka")
        );
        assert_eq!(title_from_url("https://example.com/"), None);
        assert_eq!(title_from_url("https://example.com"), None);
    }

    #[tokio::test]
    async fn uses_page_title_when_available() {
        let url = "https://example.com/r";
        let node = CreateMealFromUrl::new(
            Arc::new(MockExtractor::new(vec![]).with_title(url, "Best Lasagna")),
            PlannerPolicy::default(),
        );
        let outcome = node.run(&WorkflowState::for_direct_url(url), None).await;
        let NodeOutcome::Update(update) = outcome else {
            panic!("expected update");
        };
        let Patch::Set(meal) = update.selected_meal else {
            panic!("meal not selected");
        };
        assert_eq!(meal.name, "Best Lasagna");
        assert_eq!(meal.id, 1);
        assert_eq!(update.meal_options, Patch::Set(vec![meal]));
    }

    #[tokio::test]
    async fn falls_back_to_url_then_generic_title() {
        let policy = PlannerPolicy {
            retry: crate::retry::RetryPolicy::none(),
            ..PlannerPolicy::default()
        };
        let node = CreateMealFromUrl::new(Arc::new(MockExtractor::failing()), policy);

        let outcome = node
            .run(&WorkflowState::for_direct_url("https://example.com/beef-stew"), None)
            .await;
        let NodeOutcome::Update(update) = outcome else {
            panic!("expected update");
        };
        assert!(matches!(update.selected_meal, Patch::Set(ref m) if m.name == "Beef Stew"));

        let outcome = node.run(&WorkflowState::for_direct_url("https://example.com/"), None).await;
        let NodeOutcome::Update(update) = outcome else {
            panic!("expected update");
        };
        assert!(matches!(update.selected_meal, Patch::Set(ref m) if m.name == "Recipe"));
    }
}
