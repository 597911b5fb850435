//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use mealflow_core::interrupt::ControlError;
use mealflow_types::error::SessionError;

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Caller-facing session errors.
    Session(SessionError),
    /// Malformed query or path parameters.
    Validation(String),
    /// Engine or storage failure.
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

impl From<ControlError> for AppError {
    fn from(e: ControlError) -> Self {
        match e {
            ControlError::Session(e) => AppError::Session(e),
            ControlError::Engine(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Session(SessionError::NotFound) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
            AppError::Session(SessionError::InvalidState { .. }) => (StatusCode::CONFLICT, "INVALID_STATE"),
            AppError::Session(SessionError::AlreadyRunning) => (StatusCode::CONFLICT, "ALREADY_RUNNING"),
            AppError::Session(SessionError::InvalidRequest(_)) | AppError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Session(e) => e.to_string(),
            AppError::Validation(msg) | AppError::Internal(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.message();
        if status.is_server_error() {
            tracing::error!(code, error = %message, "request failed");
        }

        let envelope = ApiResponse::error(code, &message, Uuid::now_v7().to_string());
        let mut response = envelope.into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mealflow_core::engine::EngineError;
    use mealflow_types::session::SessionStatus;

    #[test]
    fn session_errors_map_to_status_codes() {
        let cases = [
            (SessionError::NotFound, StatusCode::NOT_FOUND),
            (
                SessionError::InvalidState {
                    status: SessionStatus::Complete,
                },
                StatusCode::CONFLICT,
            ),
            (SessionError::AlreadyRunning, StatusCode::CONFLICT),
            (SessionError::InvalidRequest("empty".into()), StatusCode::BAD_REQUEST),
        ];
        for (error, expected) in cases {
            assert_eq!(AppError::from(error).into_response().status(), expected);
        }
    }

    #[test]
    fn engine_failures_are_internal() {
        let err = AppError::from(ControlError::Engine(EngineError::StepLimitExceeded(64)));
        assert_eq!(err.status_and_code(), (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"));
    }
}
