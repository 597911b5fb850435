//! Checkpoint backend selection.

use std::path::Path;

use mealflow_core::checkpoint::{BoxCheckpointStore, InMemoryCheckpointStore};
use mealflow_types::config::{GlobalConfig, StorageBackend};

use crate::config::{ensure_data_dir, resolve_database_url};
use crate::sqlite::pool::DatabasePool;
use crate::sqlite::session::SqliteCheckpointStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("failed to open database {url}: {source}")]
    Database {
        url: String,
        #[source]
        source: sqlx::Error,
    },
}

/// Open the checkpoint store named by `[storage] backend`.
///
/// Logs the active backend. The in-memory backend warns because interrupted
/// sessions cannot be resumed after the process exits.
pub async fn open_checkpoint_store(
    config: &GlobalConfig,
    data_dir: &Path,
) -> Result<BoxCheckpointStore, StoreError> {
    let store = match config.storage.backend {
        StorageBackend::Sqlite => {
            let url = resolve_database_url(config, data_dir);
            if config.storage.database_url.is_none() {
                ensure_data_dir(data_dir).await?;
            }
            let pool = DatabasePool::new(&url)
                .await
                .map_err(|source| StoreError::Database {
                    url: url.clone(),
                    source,
                })?;
            tracing::info!(backend = "sqlite", database_url = %url, "checkpoint store ready");
            BoxCheckpointStore::new(SqliteCheckpointStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!(
                backend = "memory",
                "checkpoint store is in-memory: interrupted sessions will not survive a restart"
            );
            BoxCheckpointStore::new(InMemoryCheckpointStore::new())
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_backend_is_ephemeral() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = GlobalConfig::default();
        config.storage.backend = StorageBackend::Memory;

        let store = open_checkpoint_store(&config, tmp.path()).await.unwrap();
        assert_eq!(store.backend_name(), "memory");
        assert!(!store.is_durable());
    }

    #[tokio::test]
    async fn sqlite_backend_creates_database_in_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("data");
        let config = GlobalConfig::default();

        let store = open_checkpoint_store(&config, &data_dir).await.unwrap();
        assert_eq!(store.backend_name(), "sqlite");
        assert!(store.is_durable());
        assert!(data_dir.join("mealflow.db").exists());
    }
}
