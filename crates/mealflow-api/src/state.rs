//! Application state wiring the engine together.
//!
//! AppState holds the session manager used by both CLI commands and HTTP
//! handlers. The manager is built from the configured checkpoint backend and
//! the HTTP collaborators from `mealflow-infra`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use mealflow_core::engine::Engine;
use mealflow_core::meal_planner;
use mealflow_core::session::SessionManager;
use mealflow_infra::http::build_collaborators;
use mealflow_infra::store::open_checkpoint_store;
use mealflow_types::config::GlobalConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub manager: SessionManager,
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Open the checkpoint store, wire the collaborators and build the
    /// meal planner graph.
    pub async fn init(config: GlobalConfig, data_dir: PathBuf) -> anyhow::Result<Self> {
        let store = open_checkpoint_store(&config, &data_dir)
            .await
            .context("failed to open checkpoint store")?;

        let collaborators =
            build_collaborators(&config.collaborators).context("failed to configure collaborators")?;
        let workflow = meal_planner::build_workflow(&collaborators, &config.engine)
            .context("meal planner graph is invalid")?;

        let engine = Engine::new(Arc::new(workflow), Arc::new(store), &config.engine);
        Ok(Self::from_parts(SessionManager::new(engine), Arc::new(config), data_dir))
    }

    pub fn from_parts(manager: SessionManager, config: Arc<GlobalConfig>, data_dir: PathBuf) -> Self {
        Self {
            manager,
            config,
            data_dir,
        }
    }

    /// Name of the active checkpoint backend.
    pub fn backend(&self) -> &'static str {
        self.manager.engine().store().backend_name()
    }

    /// Startup housekeeping for a long-running process: fail sessions whose
    /// executor died, then apply the retention policy.
    pub async fn prepare_for_serving(&self) -> anyhow::Result<()> {
        let recovered = self.manager.recover_stalled().await?;
        if recovered > 0 {
            tracing::warn!(recovered, "failed sessions left running by a previous process");
        }
        if let Some(days) = self.config.storage.retention_days {
            self.manager.purge(days).await?;
        }
        Ok(())
    }
}
