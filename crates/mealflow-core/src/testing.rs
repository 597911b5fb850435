//! Scripted collaborators for tests.
//!
//! Available inside this crate's tests and to other crates through the
//! `test-util` feature. Every mock records its calls so tests can assert on
//! what the planner asked for.
//!
//! The search mock's raw output is a list of `name | url` lines, which is
//! exactly what [`MockParser`] understands.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mealflow_types::config::EngineConfig;
use mealflow_types::error::CollaboratorError;
use mealflow_types::state::{Ingredient, MealOption};

use crate::checkpoint::{BoxCheckpointStore, InMemoryCheckpointStore};
use crate::collaborators::{
    IngredientExtractor, RecipeParser, ReminderListClient, SearchProvider, UrlValidator,
};
use crate::engine::Engine;
use crate::meal_planner::{self, Collaborators};
use crate::session::SessionManager;

fn fetch_error(url: &str) -> CollaboratorError {
    CollaboratorError::Fetch {
        url: url.to_string(),
        reason: "connection refused".into(),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Format candidates the way [`MockParser`] reads them.
pub fn search_lines(recipes: &[(&str, &str)]) -> String {
    recipes
        .iter()
        .map(|(name, url)| format!("{name} | {url}"))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockSearch {
    default: String,
    by_query: HashMap<String, String>,
    dishes: Vec<String>,
    failures_left: AtomicU32,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl MockSearch {
    /// Every query returns `raw`.
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            default: raw.into(),
            ..Self::default()
        }
    }

    /// Queries containing `needle` return `raw` instead of the default.
    pub fn with_result(mut self, needle: impl Into<String>, raw: impl Into<String>) -> Self {
        self.by_query.insert(needle.into(), raw.into());
        self
    }

    pub fn with_dishes(mut self, dishes: &[&str]) -> Self {
        self.dishes = dishes.iter().map(|d| d.to_string()).collect();
        self
    }

    /// The first `n` searches fail with a transient fetch error.
    pub fn failing(self, n: u32) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        lock(&self.calls).clone()
    }
}

impl SearchProvider for MockSearch {
    async fn search(&self, query: &str, sources: &[String]) -> Result<String, CollaboratorError> {
        lock(&self.calls).push((query.to_string(), sources.to_vec()));
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(fetch_error("https://search.example"));
        }
        let raw = self
            .by_query
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
            .map(|(_, raw)| raw.clone())
            .unwrap_or_else(|| self.default.clone());
        Ok(raw)
    }

    async fn suggest_dishes(&self, _cuisine: &str, limit: usize) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.dishes.iter().take(limit).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Reads `name | url` lines; other lines are ignored.
#[derive(Debug, Default)]
pub struct MockParser;

impl RecipeParser for MockParser {
    async fn parse(&self, raw: &str, cuisine: &str) -> Result<Vec<MealOption>, CollaboratorError> {
        let options = raw
            .lines()
            .filter_map(|line| line.split_once(" | "))
            .map(|(name, url)| {
                MealOption::new(0, name.trim(), format!("A {cuisine} dish"), url.trim())
            })
            .collect();
        Ok(options)
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

/// Accepts every URL except the rejected ones.
#[derive(Default)]
pub struct MockValidator {
    rejected: HashSet<String>,
    delay: Duration,
    slow: HashMap<String, Duration>,
    calls: AtomicU32,
}

impl MockValidator {
    pub fn accepting_all() -> Self {
        Self::default()
    }

    pub fn rejecting(urls: &[&str]) -> Self {
        Self {
            rejected: urls.iter().map(|u| u.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Every check sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Checks of `url` sleep for `delay` instead of the default delay.
    pub fn with_slow_url(mut self, url: impl Into<String>, delay: Duration) -> Self {
        self.slow.insert(url.into(), delay);
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl UrlValidator for MockValidator {
    async fn validate(&self, url: &str) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.slow.get(url).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        !self.rejected.contains(url)
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

pub struct MockExtractor {
    ingredients: Vec<Ingredient>,
    titles: HashMap<String, String>,
    failing: bool,
    delay: Duration,
    calls: AtomicU32,
}

impl MockExtractor {
    pub fn new(ingredients: Vec<Ingredient>) -> Self {
        Self {
            ingredients,
            titles: HashMap::new(),
            failing: false,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    /// Every fetch fails with a transient error.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::new(Vec::new())
        }
    }

    /// Every extraction sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_title(mut self, url: impl Into<String>, title: impl Into<String>) -> Self {
        self.titles.insert(url.into(), title.into());
        self
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl IngredientExtractor for MockExtractor {
    async fn extract(&self, url: &str) -> Result<Vec<Ingredient>, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing {
            return Err(fetch_error(url));
        }
        Ok(self.ingredients.clone())
    }

    async fn title(&self, url: &str) -> Result<Option<String>, CollaboratorError> {
        if self.failing {
            return Err(fetch_error(url));
        }
        Ok(self.titles.get(url).cloned())
    }
}

// ---------------------------------------------------------------------------
// Reminders
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MockReminders {
    lists: Mutex<Vec<(String, Vec<String>)>>,
    refuse_writes: bool,
}

impl MockReminders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(self, name: &str, items: &[&str]) -> Self {
        lock(&self.lists).push((name.to_string(), items.iter().map(|i| i.to_string()).collect()));
        self
    }

    /// Lists can be read but every write fails.
    pub fn read_only(mut self) -> Self {
        self.refuse_writes = true;
        self
    }

    /// Current items of `list`, `None` when the list does not exist.
    pub fn list_items(&self, list: &str) -> Option<Vec<String>> {
        lock(&self.lists)
            .iter()
            .find(|(name, _)| name == list)
            .map(|(_, items)| items.clone())
    }

    fn check_writable(&self) -> Result<(), CollaboratorError> {
        if self.refuse_writes {
            Err(CollaboratorError::Unavailable("reminders are read-only".into()))
        } else {
            Ok(())
        }
    }
}

impl ReminderListClient for MockReminders {
    async fn lists(&self) -> Result<Vec<String>, CollaboratorError> {
        Ok(lock(&self.lists).iter().map(|(name, _)| name.clone()).collect())
    }

    async fn items(&self, list: &str) -> Result<Vec<String>, CollaboratorError> {
        self.list_items(list)
            .ok_or_else(|| CollaboratorError::Unavailable(format!("no list named {list}")))
    }

    async fn create_list(&self, list: &str) -> Result<(), CollaboratorError> {
        self.check_writable()?;
        lock(&self.lists).push((list.to_string(), Vec::new()));
        Ok(())
    }

    async fn add_item(&self, list: &str, text: &str) -> Result<(), CollaboratorError> {
        self.check_writable()?;
        let mut lists = lock(&self.lists);
        let (_, items) = lists
            .iter_mut()
            .find(|(name, _)| name == list)
            .ok_or_else(|| CollaboratorError::Unavailable(format!("no list named {list}")))?;
        items.push(text.to_string());
        Ok(())
    }

    async fn remove_items(&self, list: &str, texts: &[String]) -> Result<(), CollaboratorError> {
        self.check_writable()?;
        let mut lists = lock(&self.lists);
        if let Some((_, items)) = lists.iter_mut().find(|(name, _)| name == list) {
            items.retain(|item| !texts.contains(item));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub type MockCollaborators =
    Collaborators<MockSearch, MockParser, MockValidator, MockExtractor, MockReminders>;

impl MockCollaborators {
    /// Five valid italian recipes, a short ingredient list and one
    /// existing reminders list.
    pub fn happy() -> Self {
        Self {
            search: Arc::new(MockSearch::new(search_lines(&[
                ("Spaghetti Carbonara", "https://recipes.example/carbonara"),
                ("Risotto alla Milanese", "https://recipes.example/risotto"),
                ("Osso Buco", "https://recipes.example/osso-buco"),
                ("Lasagna", "https://recipes.example/lasagna"),
                ("Saltimbocca", "https://recipes.example/saltimbocca"),
            ]))),
            parser: Arc::new(MockParser),
            validator: Arc::new(MockValidator::accepting_all()),
            extractor: Arc::new(MockExtractor::new(vec![
                Ingredient::new("spaghetti", "400", "g"),
                Ingredient::new("eggs", "4", ""),
                Ingredient::new("pecorino", "50", "g"),
            ])),
            reminders: Arc::new(MockReminders::new().with_list("Groceries", &[])),
        }
    }
}

/// Session manager over the meal planner graph with an in-memory store.
pub fn mock_manager(collaborators: &MockCollaborators, config: &EngineConfig) -> SessionManager {
    let store = Arc::new(BoxCheckpointStore::new(InMemoryCheckpointStore::new()));
    mock_manager_with_store(collaborators, config, store)
}

/// Session manager over the meal planner graph and the given store.
pub fn mock_manager_with_store(
    collaborators: &MockCollaborators,
    config: &EngineConfig,
    store: Arc<BoxCheckpointStore>,
) -> SessionManager {
    let workflow = meal_planner::build_workflow(collaborators, config)
        .unwrap_or_else(|e| panic!("meal planner graph must build: {e}"));
    SessionManager::new(Engine::new(Arc::new(workflow), store, config))
}

/// Engine config without retry backoff so failure tests run instantly.
pub fn fast_config() -> EngineConfig {
    EngineConfig {
        retry_backoff_ms: 0,
        ..EngineConfig::default()
    }
}
