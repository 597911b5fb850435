//! Session manager: session identity, single-flight execution, and routing
//! of start/resume requests to the engine.
//!
//! Every run executes on its own tokio task and reports through an
//! [`EventStream`]. Caller-facing errors (`NotFound`, `InvalidState`,
//! `AlreadyRunning`, `InvalidRequest`) are returned synchronously, before a
//! stream exists.

use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use mealflow_types::error::SessionError;
use mealflow_types::event::WorkflowEvent;
use mealflow_types::session::{Session, SessionId, SessionStatus, SessionSummary};
use mealflow_types::state::WorkflowState;
use mealflow_types::update::StateUpdate;

use crate::checkpoint::{self, BoxCheckpointStore};
use crate::emitter::{EventEmitter, EventStream};
use crate::engine::{Engine, EngineError};
use crate::interrupt::ControlError;
use crate::merge;

/// Error written to sessions found running at startup.
pub const RESTART_ERROR: &str = "execution interrupted by process restart";

/// Input of a start call. Exactly one of `cuisine_type` / `direct_url` must
/// be non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartRequest {
    pub cuisine_type: Option<String>,
    pub direct_url: Option<String>,
    pub preferred_sources: Vec<String>,
}

impl StartRequest {
    pub fn cuisine(cuisine: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            cuisine_type: Some(cuisine.into()),
            direct_url: None,
            preferred_sources: sources,
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            cuisine_type: None,
            direct_url: Some(url.into()),
            preferred_sources: Vec::new(),
        }
    }

    /// Validate the request and build the initial state.
    pub fn into_state(self) -> Result<WorkflowState, SessionError> {
        let cuisine = self.cuisine_type.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
        let url = self.direct_url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty());
        match (cuisine, url) {
            (Some(cuisine), None) => Ok(WorkflowState::for_cuisine(cuisine, self.preferred_sources)),
            (None, Some(url)) => Ok(WorkflowState::for_direct_url(url)),
            (Some(_), Some(_)) => Err(SessionError::InvalidRequest(
                "provide either cuisine_type or direct_url, not both".into(),
            )),
            (None, None) => Err(SessionError::InvalidRequest(
                "either cuisine_type or direct_url is required".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Single-flight guard
// ---------------------------------------------------------------------------

/// Marks a session as executing in this process until dropped.
struct FlightGuard {
    id: SessionId,
    in_flight: Arc<DashMap<SessionId, ()>>,
}

impl FlightGuard {
    fn acquire(in_flight: &Arc<DashMap<SessionId, ()>>, id: SessionId) -> Option<Self> {
        match in_flight.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Some(Self {
                    id,
                    in_flight: Arc::clone(in_flight),
                })
            }
        }
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.id);
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct SessionManager {
    engine: Engine,
    in_flight: Arc<DashMap<SessionId, ()>>,
}

impl SessionManager {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            in_flight: Arc::new(DashMap::new()),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    fn store(&self) -> &BoxCheckpointStore {
        self.engine.store()
    }

    /// Sessions executing in this process right now.
    pub fn active_sessions(&self) -> usize {
        self.in_flight.len()
    }

    /// Create a session and start running it. The returned stream begins
    /// with `session_start`.
    pub async fn start(&self, request: StartRequest) -> Result<(SessionId, EventStream), ControlError> {
        let state = request.into_state()?;
        let position = self.engine.workflow().entry_position(&state).map_err(EngineError::from)?;
        let session = Session::new(state, position);
        let id = session.id;

        let guard = FlightGuard::acquire(&self.in_flight, id).ok_or(SessionError::AlreadyRunning)?;
        self.store().create(&session).await?;

        tracing::info!(
            session_id = %id,
            cuisine = session.state.cuisine_type.as_str(),
            direct_url = session.state.direct_url.as_deref().unwrap_or(""),
            "session started"
        );

        let (emitter, stream) = EventEmitter::channel(id);
        emitter.emit(WorkflowEvent::SessionStart { session_id: id });
        self.spawn_run(session, None, emitter, guard);
        Ok((id, stream))
    }

    /// Resume an interrupted session with the caller's input.
    pub async fn resume(&self, id: &SessionId, input: String) -> Result<EventStream, ControlError> {
        let guard = FlightGuard::acquire(&self.in_flight, *id).ok_or(SessionError::AlreadyRunning)?;
        let session = self.engine.controller().prepare_resume(id).await?;

        let (emitter, stream) = EventEmitter::channel(*id);
        self.spawn_run(session, Some(input), emitter, guard);
        Ok(stream)
    }

    fn spawn_run(
        &self,
        mut session: Session,
        resume: Option<String>,
        emitter: EventEmitter,
        guard: FlightGuard,
    ) {
        let engine = self.engine.clone();
        tokio::spawn(async move {
            let _guard = guard;
            match engine.run(&mut session, resume, &emitter).await {
                Ok(result) => emitter.finish(&result),
                Err(e) => emitter.fail(format!("internal error: {e}")),
            }
        });
    }

    pub async fn get(&self, id: &SessionId) -> Result<Session, ControlError> {
        Ok(self.store().load(id).await?.ok_or(SessionError::NotFound)?)
    }

    pub async fn list(
        &self,
        status: Option<SessionStatus>,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, ControlError> {
        Ok(self.store().list(status, limit).await?)
    }

    /// Delete a session that is not currently executing.
    pub async fn delete(&self, id: &SessionId) -> Result<(), ControlError> {
        if self.in_flight.contains_key(id) {
            return Err(SessionError::AlreadyRunning.into());
        }
        let session = self.get(id).await?;
        if session.status == SessionStatus::Running {
            return Err(SessionError::AlreadyRunning.into());
        }
        if !self.store().delete(id).await? {
            return Err(SessionError::NotFound.into());
        }
        tracing::info!(session_id = %id, "session deleted");
        Ok(())
    }

    /// Remove complete/failed sessions older than `retention_days`.
    pub async fn purge(&self, retention_days: u32) -> Result<u64, ControlError> {
        let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
        let removed = self.store().purge_finished(cutoff).await?;
        if removed > 0 {
            tracing::info!(removed, retention_days, "purged finished sessions");
        }
        Ok(removed)
    }

    /// Mark sessions left `running` by a dead executor as failed.
    ///
    /// Call once at startup, before serving requests. Sessions executing in
    /// this process are skipped.
    pub async fn recover_stalled(&self) -> Result<usize, ControlError> {
        let stalled = self.store().find_by_status(SessionStatus::Running).await?;
        let mut recovered = 0;
        for mut session in stalled {
            if self.in_flight.contains_key(&session.id) {
                continue;
            }
            merge::apply(&mut session.state, StateUpdate::new().error(RESTART_ERROR));
            session.status = SessionStatus::Failed;
            match checkpoint::commit(self.store(), &mut session).await {
                Ok(()) => {
                    recovered += 1;
                    tracing::warn!(session_id = %session.id, position = %session.position, "marked stalled session failed");
                }
                Err(e) => {
                    tracing::error!(session_id = %session.id, error = %e, "could not recover stalled session");
                }
            }
        }
        Ok(recovered)
    }
}
