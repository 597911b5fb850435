//! Session record HTTP handlers.
//!
//! Endpoints:
//! - GET    /api/v1/sessions       - List recent sessions
//! - GET    /api/v1/sessions/{id}  - Get the persisted session record
//! - DELETE /api/v1/sessions/{id}  - Delete a session that is not running

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use mealflow_types::session::{Session, SessionStatus, SessionSummary};

use crate::http::error::AppError;
use crate::http::handlers::parse_session_id;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

const MAX_LIST_LIMIT: usize = 200;

#[derive(Debug, Deserialize)]
pub struct SessionListQuery {
    /// running, interrupted, complete or failed.
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

/// GET /api/v1/sessions - Most recently updated sessions first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<SessionListQuery>,
) -> Result<Json<ApiResponse<Vec<SessionSummary>>>, AppError> {
    let timer = RequestTimer::start();
    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Some(
            s.parse::<SessionStatus>()
                .map_err(|_| AppError::Validation(format!("invalid status filter: {s}")))?,
        ),
        None => None,
    };
    let limit = query.limit.clamp(1, MAX_LIST_LIMIT);

    let sessions = state.manager.list(status, limit).await?;
    Ok(Json(timer.respond(sessions)))
}

/// GET /api/v1/sessions/{id} - The persisted session record.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Session>>, AppError> {
    let timer = RequestTimer::start();
    let id = parse_session_id(&id)?;
    let session = state.manager.get(&id).await?;
    let href = format!("/api/v1/sessions/{id}");
    let mut response = timer.respond(session).with_link("self", &href);
    if response.data.as_ref().is_some_and(|s| s.status == SessionStatus::Interrupted) {
        response = response.with_link("resume", &format!("{href}/resume"));
    }
    Ok(Json(response))
}

/// DELETE /api/v1/sessions/{id} - Refused with 409 while the session runs.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let timer = RequestTimer::start();
    let id = parse_session_id(&id)?;
    state.manager.delete(&id).await?;
    Ok(Json(timer.respond(serde_json::json!({
        "id": id.to_string(),
        "deleted": true,
    }))))
}
