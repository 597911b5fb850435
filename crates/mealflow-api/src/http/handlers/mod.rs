//! HTTP request handlers.

pub mod plan;
pub mod session;

use mealflow_types::error::SessionError;
use mealflow_types::session::SessionId;

use crate::http::error::AppError;

/// Parse a session id path parameter. Ids that cannot exist are reported
/// as not found.
pub(crate) fn parse_session_id(s: &str) -> Result<SessionId, AppError> {
    s.parse::<SessionId>()
        .map_err(|_| AppError::Session(SessionError::NotFound))
}
