//! Checkpoint store port.
//!
//! Defines the storage interface for session checkpoints: state, execution
//! position, status and pending interrupt, written as one record. The
//! infrastructure layer (mealflow-infra) implements it with SQLite; this
//! crate ships the ephemeral in-memory backend.

pub mod box_store;
pub mod memory;

use chrono::{DateTime, Utc};
use mealflow_types::error::RepositoryError;
use mealflow_types::session::{Session, SessionId, SessionStatus, SessionSummary};

pub use box_store::BoxCheckpointStore;
pub use memory::InMemoryCheckpointStore;

/// Repository trait for session checkpoints.
///
/// Every write is a compare-and-swap on `Session::revision`: `save` only
/// succeeds when the stored revision equals `expected_revision`, otherwise it
/// returns `RepositoryError::Conflict` and stores nothing.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait CheckpointStore: Send + Sync {
    /// Short backend name for logs and health output.
    fn backend_name(&self) -> &'static str;

    /// Whether checkpoints survive a process restart.
    fn is_durable(&self) -> bool;

    /// Insert a new session. Fails with `Conflict` if the id already exists.
    fn create(
        &self,
        session: &Session,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Load a session by id.
    fn load(
        &self,
        id: &SessionId,
    ) -> impl std::future::Future<Output = Result<Option<Session>, RepositoryError>> + Send;

    /// Replace a stored session if its revision still equals `expected_revision`.
    fn save(
        &self,
        session: &Session,
        expected_revision: u64,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a session. Returns `true` if it existed.
    fn delete(
        &self,
        id: &SessionId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Most recently updated sessions first, optionally filtered by status.
    fn list(
        &self,
        status: Option<SessionStatus>,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<SessionSummary>, RepositoryError>> + Send;

    /// All sessions currently recorded with the given status.
    fn find_by_status(
        &self,
        status: SessionStatus,
    ) -> impl std::future::Future<Output = Result<Vec<Session>, RepositoryError>> + Send;

    /// Remove complete/failed sessions last updated before `before`.
    /// Returns the number of sessions removed.
    fn purge_finished(
        &self,
        before: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}

/// Bump the revision and timestamp of `session` and persist it with CAS.
///
/// On failure the in-memory revision is rolled back so the caller's copy
/// still matches what is stored.
pub async fn commit(
    store: &BoxCheckpointStore,
    session: &mut Session,
) -> Result<(), RepositoryError> {
    let expected = session.revision;
    session.revision = expected + 1;
    session.updated_at = Utc::now();
    if let Err(e) = store.save(session, expected).await {
        session.revision = expected;
        return Err(e);
    }
    Ok(())
}
