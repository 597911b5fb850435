//! BoxCheckpointStore -- object-safe dynamic dispatch wrapper for CheckpointStore.
//!
//! 1. Define an object-safe `CheckpointStoreDyn` trait with boxed futures
//! 2. Blanket-impl `CheckpointStoreDyn` for all `T: CheckpointStore`
//! 3. `BoxCheckpointStore` wraps `Box<dyn CheckpointStoreDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use mealflow_types::error::RepositoryError;
use mealflow_types::session::{Session, SessionId, SessionStatus, SessionSummary};

use super::CheckpointStore;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Object-safe version of [`CheckpointStore`] with boxed futures.
///
/// A blanket implementation is provided for all types implementing `CheckpointStore`.
pub trait CheckpointStoreDyn: Send + Sync {
    fn backend_name_dyn(&self) -> &'static str;

    fn is_durable_dyn(&self) -> bool;

    fn create_boxed<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, ()>;

    fn load_boxed<'a>(&'a self, id: &'a SessionId) -> BoxFuture<'a, Option<Session>>;

    fn save_boxed<'a>(&'a self, session: &'a Session, expected_revision: u64) -> BoxFuture<'a, ()>;

    fn delete_boxed<'a>(&'a self, id: &'a SessionId) -> BoxFuture<'a, bool>;

    fn list_boxed<'a>(
        &'a self,
        status: Option<SessionStatus>,
        limit: usize,
    ) -> BoxFuture<'a, Vec<SessionSummary>>;

    fn find_by_status_boxed<'a>(&'a self, status: SessionStatus) -> BoxFuture<'a, Vec<Session>>;

    fn purge_finished_boxed<'a>(&'a self, before: DateTime<Utc>) -> BoxFuture<'a, u64>;
}

/// Blanket implementation: any `CheckpointStore` automatically implements `CheckpointStoreDyn`.
impl<T: CheckpointStore> CheckpointStoreDyn for T {
    fn backend_name_dyn(&self) -> &'static str {
        self.backend_name()
    }

    fn is_durable_dyn(&self) -> bool {
        self.is_durable()
    }

    fn create_boxed<'a>(&'a self, session: &'a Session) -> BoxFuture<'a, ()> {
        Box::pin(self.create(session))
    }

    fn load_boxed<'a>(&'a self, id: &'a SessionId) -> BoxFuture<'a, Option<Session>> {
        Box::pin(self.load(id))
    }

    fn save_boxed<'a>(&'a self, session: &'a Session, expected_revision: u64) -> BoxFuture<'a, ()> {
        Box::pin(self.save(session, expected_revision))
    }

    fn delete_boxed<'a>(&'a self, id: &'a SessionId) -> BoxFuture<'a, bool> {
        Box::pin(self.delete(id))
    }

    fn list_boxed<'a>(
        &'a self,
        status: Option<SessionStatus>,
        limit: usize,
    ) -> BoxFuture<'a, Vec<SessionSummary>> {
        Box::pin(self.list(status, limit))
    }

    fn find_by_status_boxed<'a>(&'a self, status: SessionStatus) -> BoxFuture<'a, Vec<Session>> {
        Box::pin(self.find_by_status(status))
    }

    fn purge_finished_boxed<'a>(&'a self, before: DateTime<Utc>) -> BoxFuture<'a, u64> {
        Box::pin(self.purge_finished(before))
    }
}

/// Type-erased checkpoint store for runtime backend selection.
///
/// Since `CheckpointStore` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxCheckpointStore` provides equivalent methods that delegate
/// to the inner `CheckpointStoreDyn` trait object.
pub struct BoxCheckpointStore {
    inner: Box<dyn CheckpointStoreDyn + Send + Sync>,
}

impl BoxCheckpointStore {
    /// Wrap a concrete `CheckpointStore` in a type-erased box.
    pub fn new<T: CheckpointStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend_name_dyn()
    }

    pub fn is_durable(&self) -> bool {
        self.inner.is_durable_dyn()
    }

    pub async fn create(&self, session: &Session) -> Result<(), RepositoryError> {
        self.inner.create_boxed(session).await
    }

    pub async fn load(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        self.inner.load_boxed(id).await
    }

    pub async fn save(&self, session: &Session, expected_revision: u64) -> Result<(), RepositoryError> {
        self.inner.save_boxed(session, expected_revision).await
    }

    pub async fn delete(&self, id: &SessionId) -> Result<bool, RepositoryError> {
        self.inner.delete_boxed(id).await
    }

    pub async fn list(
        &self,
        status: Option<SessionStatus>,
        limit: usize,
    ) -> Result<Vec<SessionSummary>, RepositoryError> {
        self.inner.list_boxed(status, limit).await
    }

    pub async fn find_by_status(&self, status: SessionStatus) -> Result<Vec<Session>, RepositoryError> {
        self.inner.find_by_status_boxed(status).await
    }

    pub async fn purge_finished(&self, before: DateTime<Utc>) -> Result<u64, RepositoryError> {
        self.inner.purge_finished_boxed(before).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointStore;

    #[tokio::test]
    async fn test_box_store_delegates() {
        let store = BoxCheckpointStore::new(InMemoryCheckpointStore::new());
        assert_eq!(store.backend_name(), "memory");
        assert!(!store.is_durable());
        assert!(store.load(&SessionId::new()).await.unwrap().is_none());
        assert!(store.list(None, 5).await.unwrap().is_empty());
    }
}
