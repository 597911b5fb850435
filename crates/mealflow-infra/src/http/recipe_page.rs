//! Recipe page client.
//!
//! Fetches a recipe page and reads its schema.org `Recipe` object from the
//! `application/ld+json` blocks. One client serves three collaborator roles:
//! ingredient extraction, page title lookup and single-recipe URL validation.

use std::sync::LazyLock;

use mealflow_core::collaborators::{IngredientExtractor, UrlValidator};
use mealflow_types::error::CollaboratorError;
use mealflow_types::state::Ingredient;
use regex::Regex;
use serde_json::Value;

use super::ingredient_line::parse_ingredient_line;
use super::search::clean_text;
use super::{status_error, transport_error};

static LD_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<script[^>]*type\s*=\s*["']application/ld\+json["'][^>]*>(.*?)</script>"#)
        .expect("valid regex")
});

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));

static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:\d+S)?)?$").expect("valid regex")
});

/// Fields read from a page's `Recipe` object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeData {
    pub name: Option<String>,
    pub ingredients: Vec<String>,
    pub total_time: Option<String>,
    pub recipe_yield: Option<String>,
}

pub struct RecipePageClient {
    client: reqwest::Client,
    timeout_secs: u64,
}

impl RecipePageClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout_secs: 30,
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// GET the page body. Non-2xx responses are errors.
    pub async fn fetch_page(&self, url: &str) -> Result<String, CollaboratorError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(CollaboratorError::Unavailable(format!("not an http(s) URL: {url}")));
        }
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(url, self.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(url, status));
        }
        response
            .text()
            .await
            .map_err(|e| transport_error(url, self.timeout_secs, e))
    }
}

impl IngredientExtractor for RecipePageClient {
    async fn extract(&self, recipe_url: &str) -> Result<Vec<Ingredient>, CollaboratorError> {
        let html = self.fetch_page(recipe_url).await?;
        let Some(recipe) = find_recipe(&html) else {
            tracing::debug!(url = %recipe_url, "no Recipe object on page");
            return Ok(Vec::new());
        };
        tracing::debug!(
            url = %recipe_url,
            lines = recipe.ingredients.len(),
            total_time = recipe.total_time.as_deref().unwrap_or("-"),
            recipe_yield = recipe.recipe_yield.as_deref().unwrap_or("-"),
            "recipe found"
        );
        Ok(recipe
            .ingredients
            .iter()
            .filter_map(|line| parse_ingredient_line(line))
            .collect())
    }

    async fn title(&self, recipe_url: &str) -> Result<Option<String>, CollaboratorError> {
        let html = self.fetch_page(recipe_url).await?;
        Ok(page_title(&html))
    }
}

impl UrlValidator for RecipePageClient {
    async fn validate(&self, url: &str) -> bool {
        match self.fetch_page(url).await {
            Ok(html) => {
                let valid = find_recipe(&html).is_some();
                if !valid {
                    tracing::debug!(url = %url, "page has no Recipe object");
                }
                valid
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "recipe URL unreachable");
                false
            }
        }
    }
}

/// Recipe name, falling back to the document `<title>`.
pub fn page_title(html: &str) -> Option<String> {
    find_recipe(html)
        .and_then(|r| r.name)
        .or_else(|| TITLE.captures(html).map(|c| clean_text(&c[1])))
        .filter(|t| !t.is_empty())
}

/// First `Recipe` object found in the page's JSON-LD blocks.
pub fn find_recipe(html: &str) -> Option<RecipeData> {
    LD_JSON.captures_iter(html).find_map(|caps| {
        let value: Value = serde_json::from_str(caps[1].trim()).ok()?;
        locate_recipe(&value).map(read_recipe)
    })
}

/// A Recipe at the top level, inside a top-level array, or inside `@graph`.
fn locate_recipe(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find_map(locate_recipe),
        Value::Object(map) => {
            if is_recipe(value) {
                Some(value)
            } else {
                map.get("@graph").and_then(locate_recipe)
            }
        }
        _ => None,
    }
}

fn is_recipe(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == "Recipe",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("Recipe")),
        _ => false,
    }
}

fn read_recipe(recipe: &Value) -> RecipeData {
    let ingredients = match recipe.get("recipeIngredient") {
        Some(Value::Array(lines)) => lines
            .iter()
            .filter_map(Value::as_str)
            .map(clean_text)
            .filter(|l| !l.is_empty())
            .collect(),
        Some(Value::String(line)) => vec![clean_text(line)],
        _ => Vec::new(),
    };

    RecipeData {
        name: recipe
            .get("name")
            .and_then(Value::as_str)
            .map(clean_text)
            .filter(|n| !n.is_empty()),
        ingredients,
        total_time: recipe
            .get("totalTime")
            .and_then(Value::as_str)
            .map(humanize_duration),
        recipe_yield: recipe.get("recipeYield").and_then(yield_text),
    }
}

/// `recipeYield` may be a string, a number or an array of either.
fn yield_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(clean_text(s)).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => items.iter().find_map(yield_text),
        _ => None,
    }
}

/// ISO-8601 duration ("PT1H30M") as "1 hr 30 min". Unknown forms are kept as-is.
fn humanize_duration(iso: &str) -> String {
    let Some(caps) = DURATION.captures(iso.trim()) else {
        return iso.to_string();
    };
    let part = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok()).unwrap_or(0);
    let hours = part(1) * 24 + part(2);
    let minutes = part(3);

    match (hours, minutes) {
        (0, 0) => iso.to_string(),
        (0, m) => format!("{m} min"),
        (h, 0) => format!("{h} hr"),
        (h, m) => format!("{h} hr {m} min"),
    }
}
