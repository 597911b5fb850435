//! Axum router configuration with middleware.
//!
//! All session routes are under `/api/v1/`.
//! Middleware: CORS, request tracing.

use axum::Router;
use axum::extract::State;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/plan", post(handlers::plan::start_plan))
        .route("/sessions", get(handlers::session::list_sessions))
        .route("/sessions/{id}", get(handlers::session::get_session))
        .route("/sessions/{id}", delete(handlers::session::delete_session))
        .route("/sessions/{id}/resume", post(handlers::plan::resume_session));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Liveness plus the active checkpoint backend.
async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.backend(),
        "active_sessions": state.manager.active_sessions(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use mealflow_core::testing::{MockCollaborators, fast_config, mock_manager};
    use mealflow_types::config::GlobalConfig;
    use serde_json::Value;
    use tower::ServiceExt;

    fn app() -> (Router, AppState) {
        let manager = mock_manager(&MockCollaborators::happy(), &fast_config());
        let state = AppState::from_parts(manager, Arc::new(GlobalConfig::default()), std::env::temp_dir());
        (build_router(state.clone()), state)
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// Event names of an SSE body, in order.
    fn event_names(body: &str) -> Vec<String> {
        body.lines()
            .filter_map(|line| line.strip_prefix("event: ").or_else(|| line.strip_prefix("event:")))
            .map(|name| name.trim().to_string())
            .collect()
    }

    fn session_id_from(body: &str) -> String {
        let data = body
            .lines()
            .filter_map(|line| line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")))
            .next()
            .unwrap();
        let value: Value = serde_json::from_str(data.trim()).unwrap();
        value["session_id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_backend() {
        let (router, _) = app();
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["backend"], "memory");
        assert_eq!(json["active_sessions"], 0);
    }

    #[tokio::test]
    async fn plan_streams_until_first_interrupt() {
        let (router, _) = app();
        let response = router
            .oneshot(post_json("/api/v1/plan", r#"{"cuisineType":"italian"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );

        let body = body_text(response).await;
        assert_eq!(
            event_names(&body),
            ["session_start", "status", "status", "status", "status", "meal_options"]
        );
    }

    #[tokio::test]
    async fn invalid_plan_is_rejected_before_streaming() {
        let (router, _) = app();
        let response = router
            .oneshot(post_json("/api/v1/plan", r#"{"cuisine_type":"thai","direct_url":"https://x.example/r"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["errors"][0]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn resume_then_inspect_session() {
        let (router, _) = app();
        let response = router
            .clone()
            .oneshot(post_json("/api/v1/plan", r#"{"cuisine_type":"italian"}"#))
            .await
            .unwrap();
        let id = session_id_from(&body_text(response).await);

        let response = router
            .clone()
            .oneshot(Request::get(format!("/api/v1/sessions/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"], "interrupted");
        assert_eq!(json["_links"]["resume"], format!("/api/v1/sessions/{id}/resume"));

        let response = router
            .clone()
            .oneshot(post_json(&format!("/api/v1/sessions/{id}/resume"), r#"{"input":"2"}"#))
            .await
            .unwrap();
        let body = body_text(response).await;
        assert_eq!(event_names(&body), ["status", "status", "status", "ingredient_review"]);

        let response = router
            .oneshot(Request::get("/api/v1/sessions?status=interrupted").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
        assert_eq!(json["data"][0]["selected_meal"], "Risotto alla Milanese");
    }

    #[tokio::test]
    async fn session_errors_are_synchronous() {
        let (router, _) = app();
        let missing = mealflow_types::session::SessionId::new();

        let response = router
            .clone()
            .oneshot(post_json(&format!("/api/v1/sessions/{missing}/resume"), r#"{"input":"1"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .clone()
            .oneshot(Request::get("/api/v1/sessions/not-a-uuid").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .oneshot(Request::get("/api/v1/sessions?status=paused").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn completed_sessions_cannot_be_resumed_but_can_be_deleted() {
        let (router, state) = app();
        let (id, mut events) = state
            .manager
            .start(mealflow_core::session::StartRequest::url("https://recipes.example/carbonara"))
            .await
            .unwrap();
        while events.recv().await.is_some() {}
        for input in ["ok", "skip"] {
            let mut events = state.manager.resume(&id, input.to_string()).await.unwrap();
            while events.recv().await.is_some() {}
        }

        let response = router
            .clone()
            .oneshot(post_json(&format!("/api/v1/sessions/{id}/resume"), r#"{"input":"1"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["errors"][0]["code"], "INVALID_STATE");

        let response = router
            .oneshot(Request::delete(format!("/api/v1/sessions/{id}")).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.manager.get(&id).await.is_err());
    }
}
