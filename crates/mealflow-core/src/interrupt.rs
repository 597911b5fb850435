//! Interrupt controller: suspends sessions and re-enters them on resume.
//!
//! Suspension persists the unchanged state, the position of the waiting node
//! and the interrupt payload. Resumption flips the stored status from
//! `interrupted` to `running` with a revision compare-and-swap, so of two
//! concurrent resumes for one session exactly one wins and the other fails
//! fast with `AlreadyRunning` or `InvalidState`.

use std::sync::Arc;

use mealflow_types::error::{RepositoryError, SessionError};
use mealflow_types::interrupt::InterruptPayload;
use mealflow_types::session::{Session, SessionId, SessionStatus};

use crate::checkpoint::{self, BoxCheckpointStore};
use crate::emitter::EventEmitter;
use crate::engine::{Engine, EngineError, EngineResult};

/// Error for start/resume/control calls: either a caller-facing session
/// error or an engine-internal failure.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl From<RepositoryError> for ControlError {
    fn from(e: RepositoryError) -> Self {
        ControlError::Engine(EngineError::Checkpoint(e))
    }
}

#[derive(Clone)]
pub struct InterruptController {
    store: Arc<BoxCheckpointStore>,
}

impl InterruptController {
    pub fn new(store: Arc<BoxCheckpointStore>) -> Self {
        Self { store }
    }

    /// Persist `session` as interrupted at its current position and hand the
    /// payload back for the event stream.
    pub async fn suspend(
        &self,
        session: &mut Session,
        payload: InterruptPayload,
    ) -> Result<InterruptPayload, RepositoryError> {
        session.status = SessionStatus::Interrupted;
        session.pending_interrupt = Some(payload.clone());
        checkpoint::commit(&self.store, session).await?;
        Ok(payload)
    }

    /// Load an interrupted session and claim it for execution.
    ///
    /// Fails with `NotFound` for an unknown id, `AlreadyRunning` when another
    /// executor holds it, and `InvalidState` when it is complete or failed.
    pub async fn prepare_resume(&self, id: &SessionId) -> Result<Session, ControlError> {
        let mut session = self.store.load(id).await?.ok_or(SessionError::NotFound)?;

        match session.status {
            SessionStatus::Interrupted => {}
            SessionStatus::Running => return Err(SessionError::AlreadyRunning.into()),
            status => return Err(SessionError::InvalidState { status }.into()),
        }

        session.status = SessionStatus::Running;
        session.pending_interrupt = None;
        checkpoint::commit(&self.store, &mut session)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => ControlError::Session(SessionError::AlreadyRunning),
                RepositoryError::NotFound => ControlError::Session(SessionError::NotFound),
                other => other.into(),
            })?;

        tracing::info!(session_id = %id, position = %session.position, "resuming session");
        Ok(session)
    }

    /// Resume a session with `input` and run it to the next stop.
    pub async fn resume(
        &self,
        engine: &Engine,
        id: &SessionId,
        input: String,
        emitter: &EventEmitter,
    ) -> Result<EngineResult, ControlError> {
        let mut session = self.prepare_resume(id).await?;
        Ok(engine.run(&mut session, Some(input), emitter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;
    use mealflow_types::session::Position;
    use mealflow_types::state::WorkflowState;

    async fn store_with(status: SessionStatus) -> (InterruptController, Session) {
        let store = Arc::new(BoxCheckpointStore::new(InMemoryCheckpointStore::new()));
        let mut session = Session::new(
            WorkflowState::for_cuisine("greek", vec![]),
            Position::root("meal_planner", "present_options"),
        );
        session.status = status;
        store.create(&session).await.unwrap();
        (InterruptController::new(store), session)
    }

    fn payload() -> InterruptPayload {
        InterruptPayload::Generic {
            node: "present_options".into(),
            prompt: "Pick one".into(),
            data: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn suspend_persists_payload() {
        let (controller, mut session) = store_with(SessionStatus::Running).await;
        controller.suspend(&mut session, payload()).await.unwrap();

        let stored = controller.store.load(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Interrupted);
        assert_eq!(stored.pending_interrupt, Some(payload()));
        assert_eq!(stored.position, Position::root("meal_planner", "present_options"));
    }

    #[tokio::test]
    async fn prepare_resume_claims_session_once() {
        let (controller, session) = store_with(SessionStatus::Interrupted).await;
        let claimed = controller.prepare_resume(&session.id).await.unwrap();
        assert_eq!(claimed.status, SessionStatus::Running);
        assert!(claimed.pending_interrupt.is_none());

        let err = controller.prepare_resume(&session.id).await.unwrap_err();
        assert!(matches!(err, ControlError::Session(SessionError::AlreadyRunning)));
    }

    #[tokio::test]
    async fn prepare_resume_rejects_unknown_and_finished() {
        let (controller, _) = store_with(SessionStatus::Interrupted).await;
        let err = controller.prepare_resume(&SessionId::new()).await.unwrap_err();
        assert!(matches!(err, ControlError::Session(SessionError::NotFound)));

        let (controller, done) = store_with(SessionStatus::Complete).await;
        let err = controller.prepare_resume(&done.id).await.unwrap_err();
        assert!(matches!(
            err,
            ControlError::Session(SessionError::InvalidState {
                status: SessionStatus::Complete
            })
        ));
    }

    #[tokio::test]
    async fn concurrent_claims_have_one_winner() {
        let (controller, session) = store_with(SessionStatus::Interrupted).await;
        let (a, b) = tokio::join!(
            controller.prepare_resume(&session.id),
            controller.prepare_resume(&session.id)
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    }
}
