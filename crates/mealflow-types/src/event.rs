//! Events streamed to the caller while a session executes.
//!
//! Each `WorkflowEvent` becomes one SSE frame: the event name goes on the
//! `event:` line and the JSON body (always a single line) on the `data:` line.

use serde_json::{Value, json};

use crate::interrupt::InterruptPayload;
use crate::session::SessionId;
use crate::state::{Ingredient, MealOption};

/// A single event in a session's output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    /// First event of a `start` stream.
    SessionStart { session_id: SessionId },
    /// Progress text emitted before a non-interrupt node runs.
    Status { node: String, message: String },
    /// The run suspended; the payload decides the event name.
    Interrupt(InterruptPayload),
    /// Final grocery list, sent just before `complete` when non-empty.
    GroceryList { items: Vec<Ingredient> },
    /// The root graph finished.
    Complete {
        selected_meal: Option<MealOption>,
        grocery_list: Vec<Ingredient>,
        reminders_added: bool,
    },
    /// The run failed; no `complete` follows.
    Error { message: String },
}

impl WorkflowEvent {
    pub fn status(node: impl Into<String>, message: impl Into<String>) -> Self {
        WorkflowEvent::Status {
            node: node.into(),
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        WorkflowEvent::Error {
            message: message.into(),
        }
    }

    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            WorkflowEvent::SessionStart { .. } => "session_start",
            WorkflowEvent::Status { .. } => "status",
            WorkflowEvent::Interrupt(payload) => payload.event_name(),
            WorkflowEvent::GroceryList { .. } => "grocery_list",
            WorkflowEvent::Complete { .. } => "complete",
            WorkflowEvent::Error { .. } => "error",
        }
    }

    /// Whether this event ends the stream of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::Interrupt(_) | WorkflowEvent::Complete { .. } | WorkflowEvent::Error { .. }
        )
    }

    /// JSON body of the event.
    pub fn data(&self) -> Result<Value, serde_json::Error> {
        let value = match self {
            WorkflowEvent::SessionStart { session_id } => {
                json!({ "session_id": session_id.to_string() })
            }
            WorkflowEvent::Status { node, message } => json!({ "node": node, "message": message }),
            WorkflowEvent::Interrupt(payload) => {
                let mut value = serde_json::to_value(payload)?;
                if let Value::Object(map) = &mut value {
                    map.remove("kind");
                }
                value
            }
            WorkflowEvent::GroceryList { items } => json!({ "items": serde_json::to_value(items)? }),
            WorkflowEvent::Complete {
                selected_meal,
                grocery_list,
                reminders_added,
            } => json!({
                "selected_meal": serde_json::to_value(selected_meal)?,
                "grocery_list": serde_json::to_value(grocery_list)?,
                "reminders_added": reminders_added,
            }),
            WorkflowEvent::Error { message } => json!({ "message": message }),
        };
        Ok(value)
    }

    /// Body serialized as a single line of JSON.
    pub fn body(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.data()?)
    }

    /// Complete wire frame (`event:` line, `data:` line, blank line).
    ///
    /// A body that fails to serialize is replaced by an `error` frame so a
    /// partial frame is never produced.
    pub fn to_sse_frame(&self) -> String {
        match self.body() {
            Ok(body) => format!("event: {}\ndata: {}\n\n", self.name(), body),
            Err(e) => {
                let message = json!({ "message": format!("failed to encode {} event: {e}", self.name()) });
                format!("event: error\ndata: {message}\n\n")
            }
        }
    }
}
