//! Event emitter: turns engine progress into an ordered event stream.
//!
//! One emitter serves one run (a start or a resume). Events go through an
//! unbounded channel so a slow or disconnected reader never stalls the
//! engine. The first terminal event (interrupt, complete, error) closes the
//! stream; anything emitted afterwards is dropped.

use std::sync::atomic::{AtomicBool, Ordering};

use mealflow_types::event::WorkflowEvent;
use mealflow_types::session::SessionId;
use tokio::sync::mpsc;

use crate::engine::EngineResult;

/// Receiving half of a run's event stream.
pub type EventStream = mpsc::UnboundedReceiver<WorkflowEvent>;

pub struct EventEmitter {
    session_id: SessionId,
    tx: mpsc::UnboundedSender<WorkflowEvent>,
    finished: AtomicBool,
}

impl EventEmitter {
    /// Create an emitter and the stream it feeds.
    pub fn channel(session_id: SessionId) -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = Self {
            session_id,
            tx,
            finished: AtomicBool::new(false),
        };
        (emitter, rx)
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Send one event. Terminal events close the stream.
    pub fn emit(&self, event: WorkflowEvent) {
        if event.is_terminal() {
            if self.finished.swap(true, Ordering::SeqCst) {
                tracing::debug!(
                    session_id = %self.session_id,
                    event = event.name(),
                    "stream already finished, dropping event"
                );
                return;
            }
        } else if self.is_finished() {
            return;
        }

        if self.tx.send(event).is_err() {
            // Reader went away; the run still completes and checkpoints.
            tracing::debug!(session_id = %self.session_id, "event stream reader dropped");
        }
    }

    pub fn status(&self, node: &str, message: &str) {
        self.emit(WorkflowEvent::status(node, message));
    }

    /// Emit the terminal event(s) for an engine result.
    pub fn finish(&self, result: &EngineResult) {
        match result {
            EngineResult::Interrupted(payload) => self.emit(WorkflowEvent::Interrupt(payload.clone())),
            EngineResult::Completed(state) => {
                if !state.grocery_list().is_empty() {
                    self.emit(WorkflowEvent::GroceryList {
                        items: state.grocery_list().to_vec(),
                    });
                }
                self.emit(WorkflowEvent::Complete {
                    selected_meal: state.selected_meal.clone(),
                    grocery_list: state.grocery_list().to_vec(),
                    reminders_added: state.reminders_added.unwrap_or(false),
                });
            }
            EngineResult::Failed(message) => self.emit(WorkflowEvent::error(message.clone())),
        }
    }

    /// Terminate the stream with an error event.
    pub fn fail(&self, message: impl Into<String>) {
        self.emit(WorkflowEvent::error(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mealflow_types::interrupt::InterruptPayload;
    use mealflow_types::state::{Ingredient, WorkflowState};

    fn drain(rx: &mut EventStream) -> Vec<WorkflowEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn stream_ends_once() {
        let (emitter, mut rx) = EventEmitter::channel(SessionId::new());
        emitter.status("search_meals", "Searching for recipes...");
        emitter.fail("boom");
        emitter.status("parse_meals", "late");
        emitter.fail("second");

        let names: Vec<&str> = drain(&mut rx).iter().map(|e| e.name()).collect();
        assert_eq!(names, ["status", "error"]);
        assert!(emitter.is_finished());
    }

    #[test]
    fn completion_sends_grocery_list_first() {
        let (emitter, mut rx) = EventEmitter::channel(SessionId::new());
        let mut state = WorkflowState::for_direct_url("https://example.com/r");
        state.grocery_list = Some(vec![Ingredient::new("salt", "1", "tsp")]);
        state.reminders_added = Some(false);
        emitter.finish(&EngineResult::Completed(state));

        let events = drain(&mut rx);
        let names: Vec<&str> = events.iter().map(|e| e.name()).collect();
        assert_eq!(names, ["grocery_list", "complete"]);
    }

    #[test]
    fn completion_without_items_skips_grocery_list() {
        let (emitter, mut rx) = EventEmitter::channel(SessionId::new());
        emitter.finish(&EngineResult::Completed(WorkflowState::default()));
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            WorkflowEvent::Complete { reminders_added: false, .. }
        ));
    }

    #[test]
    fn interrupt_is_terminal() {
        let (emitter, mut rx) = EventEmitter::channel(SessionId::new());
        emitter.finish(&EngineResult::Interrupted(InterruptPayload::Generic {
            node: "n".into(),
            prompt: "p".into(),
            data: serde_json::Value::Null,
        }));
        emitter.fail("after");
        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "interrupt");
    }

    #[test]
    fn emitting_after_reader_drop_is_harmless() {
        let (emitter, rx) = EventEmitter::channel(SessionId::new());
        drop(rx);
        emitter.status("search_meals", "Searching for recipes...");
        emitter.fail("boom");
        assert!(emitter.is_finished());
    }
}
