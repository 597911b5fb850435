//! HTTP implementations of the planner collaborators.
//!
//! - [`search`]: search endpoint client and result-text parser
//! - [`recipe_page`]: recipe page fetcher (ingredient extractor, URL validator, title lookup)
//! - [`ingredient_line`]: splits free-text ingredient lines into amount, unit and name
//! - [`reminders`]: reminders HTTP proxy client

pub mod ingredient_line;
pub mod recipe_page;
pub mod reminders;
pub mod search;

use std::sync::Arc;
use std::time::Duration;

use mealflow_core::meal_planner::Collaborators;
use mealflow_types::config::CollaboratorConfig;
use mealflow_types::error::CollaboratorError;

use self::recipe_page::RecipePageClient;
use self::reminders::RemindersClient;
use self::search::{HttpSearchProvider, SearchResultParser};

/// Collaborator set used by the binary.
pub type HttpCollaborators =
    Collaborators<HttpSearchProvider, SearchResultParser, RecipePageClient, RecipePageClient, RemindersClient>;

/// Shared reqwest client with the configured timeout and User-Agent.
pub fn build_http_client(config: &CollaboratorConfig) -> Result<reqwest::Client, CollaboratorError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| CollaboratorError::Unavailable(format!("failed to build HTTP client: {e}")))
}

/// Wire every collaborator from `[collaborators]`.
///
/// The recipe page client serves as both validator and extractor, so one
/// instance is shared between the two slots.
pub fn build_collaborators(config: &CollaboratorConfig) -> Result<HttpCollaborators, CollaboratorError> {
    let client = build_http_client(config)?;
    let page = Arc::new(RecipePageClient::new(client.clone()).with_timeout_secs(config.http_timeout_secs));
    let reminders = match &config.reminders_proxy_url {
        Some(url) => {
            tracing::info!(proxy = %url, "reminders proxy configured");
            RemindersClient::http(client.clone(), url, config.http_timeout_secs)
        }
        None => {
            tracing::info!("no reminders proxy configured, reminders are disabled");
            RemindersClient::Disabled
        }
    };

    Ok(Collaborators {
        search: Arc::new(
            HttpSearchProvider::new(client, &config.search_endpoint)?.with_timeout_secs(config.http_timeout_secs),
        ),
        parser: Arc::new(SearchResultParser),
        validator: Arc::clone(&page),
        extractor: page,
        reminders: Arc::new(reminders),
    })
}

/// Map a transport error onto the collaborator error taxonomy.
pub(crate) fn transport_error(url: &str, timeout_secs: u64, err: reqwest::Error) -> CollaboratorError {
    if err.is_timeout() {
        CollaboratorError::Timeout(timeout_secs)
    } else {
        CollaboratorError::Fetch {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Non-2xx responses: server errors are worth a retry, client errors are not.
pub(crate) fn status_error(url: &str, status: reqwest::StatusCode) -> CollaboratorError {
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        CollaboratorError::Fetch {
            url: url.to_string(),
            reason: format!("HTTP {status}"),
        }
    } else {
        CollaboratorError::Unavailable(format!("{url} returned HTTP {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mealflow_core::collaborators::ReminderListClient;

    #[test]
    fn server_errors_are_transient() {
        let url = "https://recipes.example/r";
        assert!(status_error(url, reqwest::StatusCode::BAD_GATEWAY).is_transient());
        assert!(status_error(url, reqwest::StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(!status_error(url, reqwest::StatusCode::NOT_FOUND).is_transient());
    }

    #[tokio::test]
    async fn collaborators_without_proxy_disable_reminders() {
        let collaborators = build_collaborators(&CollaboratorConfig::default()).unwrap();
        assert!(matches!(*collaborators.reminders, RemindersClient::Disabled));
        assert!(collaborators.reminders.lists().await.unwrap().is_empty());
    }

    #[test]
    fn invalid_search_template_is_rejected() {
        let config = CollaboratorConfig {
            search_endpoint: "not a url {query}".to_string(),
            ..CollaboratorConfig::default()
        };
        assert!(build_collaborators(&config).is_err());
    }
}
