//! Reminders HTTP proxy client.
//!
//! The proxy exposes named reminder lists over a small JSON API:
//!
//! | Method | Path                | Body                                 |
//! |--------|---------------------|--------------------------------------|
//! | GET    | `/lists`            | -> `{lists: [..]}`                   |
//! | GET    | `/lists/{n}/items`  | -> `{items: [..]}`                   |
//! | POST   | `/lists`            | `{list_name}`                        |
//! | POST   | `/reminder`         | `{list_name, reminder_text}`         |
//! | DELETE | `/reminders/batch`  | `{list_name, reminder_texts}`        |
//!
//! Without a configured proxy the planner gets [`RemindersClient::Disabled`],
//! which reports no lists and refuses writes.

use mealflow_core::collaborators::ReminderListClient;
use mealflow_types::error::CollaboratorError;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use super::{status_error, transport_error};

#[derive(Deserialize)]
struct ListsResponse {
    #[serde(default)]
    lists: Vec<String>,
}

#[derive(Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<String>,
}

#[derive(Serialize)]
struct ListRequest<'a> {
    list_name: &'a str,
}

#[derive(Serialize)]
struct ReminderRequest<'a> {
    list_name: &'a str,
    reminder_text: &'a str,
}

#[derive(Serialize)]
struct BatchDeleteRequest<'a> {
    list_name: &'a str,
    reminder_texts: &'a [String],
}

pub struct HttpRemindersClient {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpRemindersClient {
    pub fn new(client: reqwest::Client, base_url: &str, timeout_secs: u64) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
        }
    }

    /// Proxy URL for the given path segments, each percent-encoded.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, CollaboratorError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| CollaboratorError::Unavailable(format!("invalid reminders proxy URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| CollaboratorError::Unavailable(format!("reminders proxy URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &Url) -> Result<reqwest::Response, CollaboratorError> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(url.as_str(), self.timeout_secs, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(url.as_str(), status));
        }
        Ok(response)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, CollaboratorError> {
        let response = self.send(self.client.get(url.clone()), &url).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| CollaboratorError::Malformed(format!("{url}: {e}")))
    }
}

impl ReminderListClient for HttpRemindersClient {
    async fn lists(&self) -> Result<Vec<String>, CollaboratorError> {
        let body: ListsResponse = self.get_json(self.endpoint(&["lists"])?).await?;
        Ok(body.lists)
    }

    async fn items(&self, list: &str) -> Result<Vec<String>, CollaboratorError> {
        let body: ItemsResponse = self.get_json(self.endpoint(&["lists", list, "items"])?).await?;
        Ok(body.items)
    }

    async fn create_list(&self, list: &str) -> Result<(), CollaboratorError> {
        let url = self.endpoint(&["lists"])?;
        let request = self.client.post(url.clone()).json(&ListRequest { list_name: list });
        self.send(request, &url).await?;
        tracing::info!(list = %list, "created reminders list");
        Ok(())
    }

    async fn add_item(&self, list: &str, text: &str) -> Result<(), CollaboratorError> {
        let url = self.endpoint(&["reminder"])?;
        let request = self.client.post(url.clone()).json(&ReminderRequest {
            list_name: list,
            reminder_text: text,
        });
        self.send(request, &url).await?;
        Ok(())
    }

    async fn remove_items(&self, list: &str, texts: &[String]) -> Result<(), CollaboratorError> {
        if texts.is_empty() {
            return Ok(());
        }
        let url = self.endpoint(&["reminders", "batch"])?;
        let request = self.client.delete(url.clone()).json(&BatchDeleteRequest {
            list_name: list,
            reminder_texts: texts,
        });
        self.send(request, &url).await?;
        Ok(())
    }
}

/// Reminders backend chosen at startup.
pub enum RemindersClient {
    Http(HttpRemindersClient),
    Disabled,
}

impl RemindersClient {
    pub fn http(client: reqwest::Client, base_url: &str, timeout_secs: u64) -> Self {
        RemindersClient::Http(HttpRemindersClient::new(client, base_url, timeout_secs))
    }

    fn disabled() -> CollaboratorError {
        CollaboratorError::Unavailable("reminders proxy is not configured".to_string())
    }
}

impl ReminderListClient for RemindersClient {
    async fn lists(&self) -> Result<Vec<String>, CollaboratorError> {
        match self {
            RemindersClient::Http(client) => client.lists().await,
            RemindersClient::Disabled => Ok(Vec::new()),
        }
    }

    async fn items(&self, list: &str) -> Result<Vec<String>, CollaboratorError> {
        match self {
            RemindersClient::Http(client) => client.items(list).await,
            RemindersClient::Disabled => Ok(Vec::new()),
        }
    }

    async fn create_list(&self, list: &str) -> Result<(), CollaboratorError> {
        match self {
            RemindersClient::Http(client) => client.create_list(list).await,
            RemindersClient::Disabled => Err(Self::disabled()),
        }
    }

    async fn add_item(&self, list: &str, text: &str) -> Result<(), CollaboratorError> {
        match self {
            RemindersClient::Http(client) => client.add_item(list, text).await,
            RemindersClient::Disabled => Err(Self::disabled()),
        }
    }

    async fn remove_items(&self, list: &str, texts: &[String]) -> Result<(), CollaboratorError> {
        match self {
            RemindersClient::Http(client) => client.remove_items(list, texts).await,
            RemindersClient::Disabled => Err(Self::disabled()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> HttpRemindersClient {
        HttpRemindersClient::new(reqwest::Client::new(), base, 10)
    }

    #[test]
    fn list_names_are_path_encoded() {
        let url = client("http://127.0.0.1:8765/").endpoint(&["lists", "Weekly Shop/Food", "items"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8765/lists/Weekly%20Shop%2FFood/items");
    }

    #[test]
    fn base_path_is_kept() {
        let url = client("http://proxy.local/reminders").endpoint(&["reminders", "batch"]).unwrap();
        assert_eq!(url.as_str(), "http://proxy.local/reminders/reminders/batch");
    }

    #[test]
    fn batch_delete_body_shape() {
        let texts = vec!["milk (1 l)".to_string()];
        let body = serde_json::to_value(BatchDeleteRequest {
            list_name: "Groceries",
            reminder_texts: &texts,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"list_name": "Groceries", "reminder_texts": ["milk (1 l)"]})
        );
    }

    #[test]
    fn responses_tolerate_missing_fields() {
        let lists: ListsResponse = serde_json::from_str("{}").unwrap();
        assert!(lists.lists.is_empty());
        let items: ItemsResponse = serde_json::from_str(r#"{"items":["eggs (4)"]}"#).unwrap();
        assert_eq!(items.items, ["eggs (4)"]);
    }

    #[tokio::test]
    async fn disabled_client_refuses_writes() {
        let disabled = RemindersClient::Disabled;
        assert!(disabled.lists().await.unwrap().is_empty());
        assert!(disabled.items("Groceries").await.unwrap().is_empty());
        assert!(disabled.create_list("Groceries").await.is_err());
        assert!(disabled.add_item("Groceries", "eggs").await.is_err());
    }

    #[tokio::test]
    async fn unreachable_proxy_is_a_transient_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let client = client("http://127.0.0.1:9");
        let err = client.lists().await.unwrap_err();
        assert!(err.is_transient());
    }
}
