//! Ephemeral in-memory checkpoint backend.
//!
//! Sessions live in a `DashMap` and are lost when the process exits. Used
//! when no durable backend is configured and throughout the engine tests.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use mealflow_types::error::RepositoryError;
use mealflow_types::session::{Session, SessionId, SessionStatus, SessionSummary};

use super::CheckpointStore;

/// In-process checkpoint store keyed by session id.
///
/// Compare-and-swap is atomic because the revision check and the write
/// happen under the same shard lock.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    sessions: DashMap<SessionId, Session>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn is_durable(&self) -> bool {
        false
    }

    async fn create(&self, session: &Session) -> Result<(), RepositoryError> {
        match self.sessions.entry(session.id) {
            Entry::Occupied(_) => Err(RepositoryError::Conflict(format!(
                "session {} already exists",
                session.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(session.clone());
                Ok(())
            }
        }
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        Ok(self.sessions.get(id).map(|s| s.clone()))
    }

    async fn save(&self, session: &Session, expected_revision: u64) -> Result<(), RepositoryError> {
        let mut stored = self
            .sessions
            .get_mut(&session.id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.revision != expected_revision {
            return Err(RepositoryError::Conflict(format!(
                "session {} is at revision {}, expected {}",
                session.id, stored.revision, expected_revision
            )));
        }
        *stored = session.clone();
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        Ok(self.sessions.remove(id).is_some())
    }

    async fn list(
        &self,
        status: Option<SessionStatus>,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, RepositoryError> {
        let mut rows: Vec<SessionSummary> = self
            .sessions
            .iter()
            .filter(|entry| status.is_none_or(|s| entry.status == s))
            .map(|entry| SessionSummary::from(entry.value()))
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn find_by_status(&self, status: SessionStatus) -> Result<Vec<Session>, RepositoryError> {
        Ok(self
            .sessions
            .iter()
            .filter(|entry| entry.status == status)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn purge_finished(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let before_len = self.sessions.len();
        self.sessions
            .retain(|_, session| !(session.status.is_terminal() && session.updated_at < before));
        Ok((before_len - self.sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mealflow_types::session::Position;
    use mealflow_types::state::WorkflowState;

    fn session(status: SessionStatus) -> Session {
        let mut s = Session::new(
            WorkflowState::for_cuisine("mexican", vec![]),
            Position::root("meal_planner", "search_meals"),
        );
        s.status = status;
        s
    }

    #[tokio::test]
    async fn test_create_load_delete() {
        let store = InMemoryCheckpointStore::new();
        let s = session(SessionStatus::Running);
        store.create(&s).await.unwrap();
        assert!(matches!(store.create(&s).await, Err(RepositoryError::Conflict(_))));

        let loaded = store.load(&s.id).await.unwrap().unwrap();
        assert_eq!(loaded, s);

        assert!(store.delete(&s.id).await.unwrap());
        assert!(!store.delete(&s.id).await.unwrap());
        assert!(store.load(&s.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_requires_matching_revision() {
        let store = InMemoryCheckpointStore::new();
        let mut s = session(SessionStatus::Running);
        store.create(&s).await.unwrap();

        s.revision = 1;
        s.status = SessionStatus::Interrupted;
        store.save(&s, 0).await.unwrap();

        // A second writer still holding revision 0 loses.
        let err = store.save(&s, 0).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let missing = session(SessionStatus::Running);
        assert!(matches!(store.save(&missing, 0).await, Err(RepositoryError::NotFound)));
    }

    #[tokio::test]
    async fn test_list_filters_and_limits() {
        let store = InMemoryCheckpointStore::new();
        for status in [
            SessionStatus::Interrupted,
            SessionStatus::Interrupted,
            SessionStatus::Complete,
        ] {
            store.create(&session(status)).await.unwrap();
        }
        assert_eq!(store.list(None, 10).await.unwrap().len(), 3);
        assert_eq!(store.list(Some(SessionStatus::Interrupted), 10).await.unwrap().len(), 2);
        assert_eq!(store.list(None, 1).await.unwrap().len(), 1);
        assert_eq!(store.find_by_status(SessionStatus::Complete).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_purge_keeps_interrupted_sessions() {
        let store = InMemoryCheckpointStore::new();
        let mut old_done = session(SessionStatus::Complete);
        old_done.updated_at = Utc::now() - Duration::days(30);
        let mut old_waiting = session(SessionStatus::Interrupted);
        old_waiting.updated_at = Utc::now() - Duration::days(30);
        let fresh_failed = session(SessionStatus::Failed);
        for s in [&old_done, &old_waiting, &fresh_failed] {
            store.create(s).await.unwrap();
        }

        let removed = store.purge_finished(Utc::now() - Duration::days(7)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.load(&old_done.id).await.unwrap().is_none());
        assert!(store.load(&old_waiting.id).await.unwrap().is_some());
        assert!(store.load(&fresh_failed.id).await.unwrap().is_some());
    }
}
