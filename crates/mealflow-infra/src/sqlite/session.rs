//! SQLite checkpoint store.
//!
//! Implements `CheckpointStore` from `mealflow-core`. State, position and
//! the pending interrupt are stored as JSON text columns; `revision` guards
//! every update with a compare-and-swap in the `WHERE` clause, so a stale
//! writer changes zero rows and gets `Conflict`.

use chrono::{DateTime, SecondsFormat, Utc};
use mealflow_core::checkpoint::CheckpointStore;
use mealflow_types::error::RepositoryError;
use mealflow_types::session::{Session, SessionId, SessionStatus, SessionSummary};
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `CheckpointStore`.
pub struct SqliteCheckpointStore {
    pool: DatabasePool,
}

impl SqliteCheckpointStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct SessionRow {
    id: String,
    status: String,
    state: String,
    position: String,
    pending_interrupt: Option<String>,
    revision: i64,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            status: row.try_get("status")?,
            state: row.try_get("state")?,
            position: row.try_get("position")?,
            pending_interrupt: row.try_get("pending_interrupt")?,
            revision: row.try_get("revision")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_session(self) -> Result<Session, RepositoryError> {
        let id: SessionId = self
            .id
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid session id: {e}")))?;
        let status: SessionStatus = self
            .status
            .parse()
            .map_err(|_| RepositoryError::Query(format!("invalid session status: {}", self.status)))?;
        let state = serde_json::from_str(&self.state)
            .map_err(|e| RepositoryError::Query(format!("invalid state JSON: {e}")))?;
        let position = serde_json::from_str(&self.position)
            .map_err(|e| RepositoryError::Query(format!("invalid position JSON: {e}")))?;
        let pending_interrupt = self
            .pending_interrupt
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("invalid interrupt JSON: {e}")))?;

        Ok(Session {
            id,
            state,
            position,
            status,
            pending_interrupt,
            revision: u64::try_from(self.revision)
                .map_err(|_| RepositoryError::Query(format!("negative revision: {}", self.revision)))?,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

/// JSON columns of a session, serialized once per write.
struct Encoded {
    state: String,
    position: String,
    pending_interrupt: Option<String>,
    revision: i64,
}

impl Encoded {
    fn new(session: &Session) -> Result<Self, RepositoryError> {
        let to_json = |what: &str, e: serde_json::Error| RepositoryError::Query(format!("cannot encode {what}: {e}"));
        Ok(Self {
            state: serde_json::to_string(&session.state).map_err(|e| to_json("state", e))?,
            position: serde_json::to_string(&session.position).map_err(|e| to_json("position", e))?,
            pending_interrupt: session
                .pending_interrupt
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .map_err(|e| to_json("interrupt", e))?,
            revision: revision_param(session.revision)?,
        })
    }
}

fn revision_param(revision: u64) -> Result<i64, RepositoryError> {
    i64::try_from(revision).map_err(|_| RepositoryError::Query(format!("revision overflow: {revision}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width UTC timestamps so text comparison orders them correctly.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn query_error(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(e.to_string())
}

// ---------------------------------------------------------------------------
// CheckpointStore implementation
// ---------------------------------------------------------------------------

impl CheckpointStore for SqliteCheckpointStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn is_durable(&self) -> bool {
        true
    }

    async fn create(&self, session: &Session) -> Result<(), RepositoryError> {
        let encoded = Encoded::new(session)?;
        let result = sqlx::query(
            r#"INSERT INTO sessions
               (id, status, state, position, pending_interrupt, revision, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(session.id.to_string())
        .bind(session.status.to_string())
        .bind(&encoded.state)
        .bind(&encoded.position)
        .bind(&encoded.pending_interrupt)
        .bind(encoded.revision)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.updated_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(RepositoryError::Conflict(
                format!("session {} already exists", session.id),
            )),
            Err(e) => Err(query_error(e)),
        }
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        match row {
            Some(row) => {
                let row = SessionRow::from_row(&row).map_err(query_error)?;
                Ok(Some(row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, session: &Session, expected_revision: u64) -> Result<(), RepositoryError> {
        let encoded = Encoded::new(session)?;
        let result = sqlx::query(
            r#"UPDATE sessions
               SET status = ?, state = ?, position = ?, pending_interrupt = ?,
                   revision = ?, updated_at = ?
               WHERE id = ? AND revision = ?"#,
        )
        .bind(session.status.to_string())
        .bind(&encoded.state)
        .bind(&encoded.position)
        .bind(&encoded.pending_interrupt)
        .bind(encoded.revision)
        .bind(format_datetime(&session.updated_at))
        .bind(session.id.to_string())
        .bind(revision_param(expected_revision)?)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Nothing changed: either the row is gone or another writer got there first.
        let current: Option<(i64,)> = sqlx::query_as("SELECT revision FROM sessions WHERE id = ?")
            .bind(session.id.to_string())
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(query_error)?;
        match current {
            None => Err(RepositoryError::NotFound),
            Some((stored,)) => Err(RepositoryError::Conflict(format!(
                "session {} is at revision {stored}, expected {expected_revision}",
                session.id
            ))),
        }
    }

    async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        status: Option<SessionStatus>,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, RepositoryError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match status {
            Some(status) => {
                sqlx::query("SELECT * FROM sessions WHERE status = ? ORDER BY updated_at DESC LIMIT ?")
                    .bind(status.to_string())
                    .bind(limit)
                    .fetch_all(&self.pool.reader)
                    .await
            }
            None => {
                sqlx::query("SELECT * FROM sessions ORDER BY updated_at DESC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&self.pool.reader)
                    .await
            }
        }
        .map_err(query_error)?;

        rows.iter()
            .map(|row| {
                let session = SessionRow::from_row(row).map_err(query_error)?.into_session()?;
                Ok(SessionSummary::from(&session))
            })
            .collect()
    }

    async fn find_by_status(&self, status: SessionStatus) -> Result<Vec<Session>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM sessions WHERE status = ? ORDER BY updated_at")
            .bind(status.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| SessionRow::from_row(row).map_err(query_error)?.into_session())
            .collect()
    }

    async fn purge_finished(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM sessions WHERE status IN ('complete', 'failed') AND updated_at < ?",
        )
        .bind(format_datetime(&before))
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Duration;
    use mealflow_core::checkpoint::{self, BoxCheckpointStore};
    use mealflow_core::session::StartRequest;
    use mealflow_core::testing::{MockCollaborators, fast_config, mock_manager_with_store};
    use mealflow_types::event::WorkflowEvent;
    use mealflow_types::interrupt::InterruptPayload;
    use mealflow_types::session::Position;
    use mealflow_types::state::{MealOption, WorkflowState};

    async fn open(dir: &tempfile::TempDir) -> SqliteCheckpointStore {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("mealflow.db").display());
        SqliteCheckpointStore::new(DatabasePool::new(&url).await.unwrap())
    }

    fn session() -> Session {
        let mut state = WorkflowState::for_cuisine("italian", vec!["seriouseats.com".into()]);
        state.meal_options = Some(vec![MealOption::new(1, "Lasagna", "Layers", "https://x.example/lasagna")]);
        Session::new(state, Position::root("meal_planner", "present_options"))
    }

    #[tokio::test]
    async fn create_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;
        let mut session = session();
        session.status = SessionStatus::Interrupted;
        session.pending_interrupt = Some(InterruptPayload::Generic {
            node: "present_options".into(),
            prompt: "Pick".into(),
            data: serde_json::json!({"n": 1}),
        });
        store.create(&session).await.unwrap();

        let loaded = store.load(&session.id).await.unwrap().unwrap();
        assert_eq!(loaded.state, session.state);
        assert_eq!(loaded.position, session.position);
        assert_eq!(loaded.status, SessionStatus::Interrupted);
        assert_eq!(loaded.pending_interrupt, session.pending_interrupt);
        assert_eq!(loaded.created_at.timestamp_micros(), session.created_at.timestamp_micros());

        assert!(store.load(&SessionId::new()).await.unwrap().is_none());
        assert!(matches!(store.create(&session).await, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn save_is_compare_and_swap() {
        let dir = tempfile::tempdir().unwrap();
        let store = BoxCheckpointStore::new(open(&dir).await);
        let mut session = session();
        store.create(&session).await.unwrap();

        let mut stale = session.clone();
        checkpoint::commit(&store, &mut session).await.unwrap();
        assert!(matches!(
            checkpoint::commit(&store, &mut stale).await,
            Err(RepositoryError::Conflict(_))
        ));
        assert_eq!(stale.revision, 0);

        let mut missing = self::session();
        assert!(matches!(
            checkpoint::commit(&store, &mut missing).await,
            Err(RepositoryError::NotFound)
        ));
        assert_eq!(store.load(&session.id).await.unwrap().unwrap().revision, 1);
    }

    #[tokio::test]
    async fn list_filters_and_orders() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;

        let mut older = session();
        older.status = SessionStatus::Complete;
        older.updated_at = Utc::now() - Duration::hours(1);
        let mut newer = session();
        newer.status = SessionStatus::Interrupted;
        store.create(&older).await.unwrap();
        store.create(&newer).await.unwrap();

        let all = store.list(None, 10).await.unwrap();
        assert_eq!(all.iter().map(|s| s.id).collect::<Vec<_>>(), [newer.id, older.id]);
        assert_eq!(all[0].cuisine_type.as_deref(), Some("italian"));

        let complete = store.list(Some(SessionStatus::Complete), 10).await.unwrap();
        assert_eq!(complete.len(), 1);
        assert_eq!(store.list(None, 1).await.unwrap().len(), 1);

        assert_eq!(store.find_by_status(SessionStatus::Interrupted).await.unwrap().len(), 1);
        assert!(store.delete(&older.id).await.unwrap());
        assert!(!store.delete(&older.id).await.unwrap());
    }

    #[tokio::test]
    async fn purge_keeps_interrupted_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir).await;
        let old = Utc::now() - Duration::days(60);

        for status in [SessionStatus::Complete, SessionStatus::Failed, SessionStatus::Interrupted] {
            let mut s = session();
            s.status = status;
            s.updated_at = old;
            store.create(&s).await.unwrap();
        }
        let mut fresh = session();
        fresh.status = SessionStatus::Complete;
        store.create(&fresh).await.unwrap();

        let removed = store.purge_finished(Utc::now() - Duration::days(30)).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.list(None, 10).await.unwrap().len(), 2);
    }

    async fn drain(mut stream: mealflow_core::emitter::EventStream) -> Vec<WorkflowEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn interrupted_session_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let collaborators = MockCollaborators::happy();
        let config = fast_config();

        // First process: run to the meal selection interrupt.
        let first = mock_manager_with_store(
            &collaborators,
            &config,
            Arc::new(BoxCheckpointStore::new(open(&dir).await)),
        );
        let (id, stream) = first.start(StartRequest::cuisine("italian", vec![])).await.unwrap();
        let before = drain(stream).await;
        assert!(matches!(before.last(), Some(WorkflowEvent::Interrupt(InterruptPayload::MealOptions { .. }))));
        drop(first);

        // Second process over the same file.
        let second = mock_manager_with_store(
            &collaborators,
            &config,
            Arc::new(BoxCheckpointStore::new(open(&dir).await)),
        );
        assert_eq!(second.recover_stalled().await.unwrap(), 0);
        let restored = second.get(&id).await.unwrap();
        assert_eq!(restored.status, SessionStatus::Interrupted);

        let after = drain(second.resume(&id, "2".into()).await.unwrap()).await;
        let Some(WorkflowEvent::Interrupt(InterruptPayload::IngredientReview { ingredients, .. })) = after.last()
        else {
            panic!("expected ingredient review after restart, got {after:?}");
        };
        assert_eq!(ingredients.len(), 3);

        let session = second.get(&id).await.unwrap();
        assert_eq!(
            session.state.selected_meal.map(|m| m.recipe_url),
            Some("https://recipes.example/risotto".to_string())
        );
    }

    #[tokio::test]
    async fn running_sessions_are_failed_on_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(BoxCheckpointStore::new(open(&dir).await));
        let orphan = Session::new(
            WorkflowState::for_direct_url("https://x.example/r"),
            Position::root("meal_planner", "create_meal_from_url"),
        );
        store.create(&orphan).await.unwrap();

        let manager = mock_manager_with_store(&MockCollaborators::happy(), &fast_config(), store);
        assert_eq!(manager.recover_stalled().await.unwrap(), 1);
        let failed = manager.get(&orphan.id).await.unwrap();
        assert_eq!(failed.status, SessionStatus::Failed);
        assert_eq!(
            failed.state.error.as_deref(),
            Some(mealflow_core::session::RESTART_ERROR)
        );
    }
}
