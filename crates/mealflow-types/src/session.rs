use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::interrupt::InterruptPayload;
use crate::state::WorkflowState;

/// Unique identifier for a session, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new SessionId using UUID v7.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Session lifecycle states.
///
/// - Running: a node sequence is executing right now
/// - Interrupted: waiting for resume input
/// - Complete: reached the end of the root graph
/// - Failed: terminated on the error path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Running,
    Interrupted,
    Complete,
    Failed,
}

impl SessionStatus {
    /// Complete and failed sessions never execute again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Complete | SessionStatus::Failed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Interrupted => write!(f, "interrupted"),
            SessionStatus::Complete => write!(f, "complete"),
            SessionStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(SessionStatus::Running),
            "interrupted" => Ok(SessionStatus::Interrupted),
            "complete" | "completed" => Ok(SessionStatus::Complete),
            "failed" => Ok(SessionStatus::Failed),
            other => Err(format!("invalid session status: '{other}'")),
        }
    }
}

/// One level of the execution position: a graph and the node active in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub graph: String,
    pub node: String,
}

impl Frame {
    pub fn new(graph: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            graph: graph.into(),
            node: node.into(),
        }
    }
}

/// Execution position as a stack of frames, root graph first.
///
/// The innermost frame names the node that runs next (or, for an interrupted
/// session, the node waiting for input). An empty stack means the root graph
/// has reached its end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub stack: Vec<Frame>,
}

impl Position {
    /// Position at the entry node of the root graph.
    pub fn root(graph: impl Into<String>, node: impl Into<String>) -> Self {
        Self {
            stack: vec![Frame::new(graph, node)],
        }
    }

    pub fn top(&self) -> Option<&Frame> {
        self.stack.last()
    }

    pub fn push(&mut self, frame: Frame) {
        self.stack.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.stack.pop()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_finished(&self) -> bool {
        self.stack.is_empty()
    }

    /// Replace the node of the innermost frame.
    pub fn advance_to(&mut self, node: impl Into<String>) {
        if let Some(frame) = self.stack.last_mut() {
            frame.node = node.into();
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stack.is_empty() {
            return write!(f, "<end>");
        }
        let parts: Vec<String> = self
            .stack
            .iter()
            .map(|frame| format!("{}:{}", frame.graph, frame.node))
            .collect();
        write!(f, "{}", parts.join(" > "))
    }
}

/// A persisted workflow session.
///
/// `revision` increases by one on every write and guards compare-and-swap
/// saves in the checkpoint store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub state: WorkflowState,
    pub position: Position,
    pub status: SessionStatus,
    /// Prompt shown to the caller while the session is interrupted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_interrupt: Option<InterruptPayload>,
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A fresh running session positioned at the root entry.
    pub fn new(state: WorkflowState, position: Position) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            state,
            position,
            status: SessionStatus::Running,
            pending_interrupt: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Listing row returned by checkpoint store queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub status: SessionStatus,
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_meal: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            status: session.status,
            position: session.position.clone(),
            cuisine_type: Some(session.state.cuisine_type.clone()).filter(|c| !c.is_empty()),
            selected_meal: session.state.selected_meal.as_ref().map(|m| m.name.clone()),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_roundtrip() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<SessionId>().is_err());
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("INTERRUPTED".parse::<SessionStatus>().unwrap(), SessionStatus::Interrupted);
        assert_eq!("completed".parse::<SessionStatus>().unwrap(), SessionStatus::Complete);
        assert!("paused".parse::<SessionStatus>().is_err());
        assert_eq!(SessionStatus::Failed.to_string(), "failed");
        assert!(SessionStatus::Complete.is_terminal());
        assert!(!SessionStatus::Interrupted.is_terminal());
    }

    #[test]
    fn test_position_stack() {
        let mut pos = Position::root("meal_planner", "present_options");
        pos.advance_to("process_meal");
        pos.push(Frame::new("process_meal", "extract_ingredients"));
        assert_eq!(pos.depth(), 2);
        assert_eq!(pos.to_string(), "meal_planner:process_meal > process_meal:extract_ingredients");

        pos.pop();
        assert_eq!(pos.top().unwrap().node, "process_meal");
        pos.pop();
        assert!(pos.is_finished());
        assert_eq!(pos.to_string(), "<end>");
    }

    #[test]
    fn test_session_serde_roundtrip() {
        let session = Session::new(
            WorkflowState::for_cuisine("thai", vec![]),
            Position::root("meal_planner", "search_meals"),
        );
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"status\":\"running\""));
        let parsed: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, session);

        let summary = SessionSummary::from(&parsed);
        assert_eq!(summary.cuisine_type.as_deref(), Some("thai"));
        assert!(summary.selected_meal.is_none());
    }
}
