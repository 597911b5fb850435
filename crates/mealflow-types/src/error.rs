use thiserror::Error;

use crate::session::SessionStatus;

/// Errors from repository operations (used by the checkpoint store port in mealflow-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors returned synchronously to start/resume callers.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,

    #[error("session is {status}, not interrupted")]
    InvalidState { status: SessionStatus },

    #[error("session is already running")]
    AlreadyRunning,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Failures reported by external collaborators (search, recipe pages, reminders).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl CollaboratorError {
    /// Network-level failures worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, CollaboratorError::Fetch { .. } | CollaboratorError::Timeout(_))
    }

    /// Short reason text without the URL prefix.
    pub fn reason(&self) -> String {
        match self {
            CollaboratorError::Fetch { reason, .. } => reason.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_session_error_display() {
        let err = SessionError::InvalidState {
            status: SessionStatus::Complete,
        };
        assert_eq!(err.to_string(), "session is complete, not interrupted");
    }

    #[test]
    fn test_collaborator_error_transience() {
        let fetch = CollaboratorError::Fetch {
            url: "https://example.com".into(),
            reason: "connection reset".into(),
        };
        assert!(fetch.is_transient());
        assert_eq!(fetch.reason(), "connection reset");
        assert!(CollaboratorError::Timeout(30).is_transient());
        assert!(!CollaboratorError::Malformed("no json".into()).is_transient());
        assert!(!CollaboratorError::Unavailable("proxy down".into()).is_transient());
    }
}
