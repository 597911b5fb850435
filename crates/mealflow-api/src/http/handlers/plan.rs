//! SSE endpoints that run sessions.
//!
//! - POST /api/v1/plan                 - Start a session
//! - POST /api/v1/sessions/{id}/resume - Resume an interrupted session
//!
//! Session errors are answered as JSON before any stream opens. Once the
//! stream is open, failures arrive as an `error` event.

use std::convert::Infallible;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use serde::Deserialize;
use tokio_stream::Stream;

use mealflow_core::session::StartRequest;

use crate::http::error::AppError;
use crate::http::handlers::parse_session_id;
use crate::http::sse::sse_response;
use crate::state::AppState;

/// Request body for starting a plan. Exactly one of `cuisine_type` and
/// `direct_url` must be given.
#[derive(Debug, Default, Deserialize)]
pub struct PlanRequest {
    #[serde(default, alias = "cuisineType")]
    pub cuisine_type: Option<String>,
    #[serde(default, alias = "directUrl")]
    pub direct_url: Option<String>,
    #[serde(default, alias = "preferredSources")]
    pub preferred_sources: Option<Vec<String>>,
}

impl From<PlanRequest> for StartRequest {
    fn from(body: PlanRequest) -> Self {
        StartRequest {
            cuisine_type: body.cuisine_type,
            direct_url: body.direct_url,
            preferred_sources: body.preferred_sources.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    #[serde(default)]
    pub input: String,
}

/// POST /api/v1/plan - Start a session and stream its events.
pub async fn start_plan(
    State(state): State<AppState>,
    Json(body): Json<PlanRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (session_id, events) = state.manager.start(body.into()).await?;
    tracing::debug!(session_id = %session_id, "plan stream opened");
    Ok(sse_response(events))
}

/// POST /api/v1/sessions/{id}/resume - Resume with the caller's input.
pub async fn resume_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ResumeRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let id = parse_session_id(&id)?;
    let events = state.manager.resume(&id, body.input).await?;
    tracing::debug!(session_id = %id, "resume stream opened");
    Ok(sse_response(events))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_request_accepts_camel_case() {
        let body: PlanRequest = serde_json::from_str(
            r#"{"cuisineType":"thai","preferredSources":["hot-thai-kitchen.com"]}"#,
        )
        .unwrap();
        let request = StartRequest::from(body);
        assert_eq!(request.cuisine_type.as_deref(), Some("thai"));
        assert_eq!(request.preferred_sources, ["hot-thai-kitchen.com"]);

        let body: PlanRequest = serde_json::from_str(r#"{"direct_url":"https://x.example/r"}"#).unwrap();
        assert_eq!(body.direct_url.as_deref(), Some("https://x.example/r"));
        assert!(StartRequest::from(body).preferred_sources.is_empty());
    }

    #[test]
    fn resume_input_defaults_to_empty() {
        let body: ResumeRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(body.input, "");
    }
}
