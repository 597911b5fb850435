//! Global configuration loader for mealflow.
//!
//! Reads `config.toml` from the data directory (`~/.mealflow/` by default)
//! and deserializes it into [`GlobalConfig`]. Falls back to defaults when the
//! file is missing or malformed, then applies environment overrides.

use std::path::{Path, PathBuf};

use mealflow_types::config::{GlobalConfig, StorageBackend};
use thiserror::Error;

pub const ENV_DATA_DIR: &str = "MEALFLOW_DATA_DIR";
pub const ENV_DATABASE_URL: &str = "MEALFLOW_DATABASE_URL";
pub const ENV_STORAGE_BACKEND: &str = "MEALFLOW_STORAGE_BACKEND";
pub const ENV_REMINDERS_PROXY_URL: &str = "REMINDERS_PROXY_URL";
pub const ENV_SEARCH_ENDPOINT: &str = "MEALFLOW_SEARCH_ENDPOINT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("failed to create data directory {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Resolve the data directory.
///
/// Priority:
/// 1. `MEALFLOW_DATA_DIR` environment variable
/// 2. `~/.mealflow`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".mealflow");
    }

    // Last resort: current directory
    PathBuf::from(".mealflow")
}

/// Load global configuration from `{data_dir}/config.toml`.
///
/// - If the file does not exist, returns [`GlobalConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and returns the default.
/// - If the file exists and parses successfully, returns the parsed config.
pub async fn load_global_config(data_dir: &Path) -> GlobalConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return GlobalConfig::default();
        }
    };

    match toml::from_str::<GlobalConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            GlobalConfig::default()
        }
    }
}

/// Apply environment overrides on top of a loaded config.
///
/// `lookup` returns the value of a variable, if set. Empty values are
/// ignored so `VAR=` does not wipe a configured endpoint.
pub fn apply_env_overrides(
    config: &mut GlobalConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(url) = get(ENV_DATABASE_URL) {
        config.storage.database_url = Some(url);
    }
    if let Some(backend) = get(ENV_STORAGE_BACKEND) {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .map_err(|reason| ConfigError::InvalidValue {
                key: ENV_STORAGE_BACKEND,
                reason,
            })?;
    }
    if let Some(url) = get(ENV_REMINDERS_PROXY_URL) {
        config.collaborators.reminders_proxy_url = Some(url);
    }
    if let Some(endpoint) = get(ENV_SEARCH_ENDPOINT) {
        if !endpoint.contains("{query}") {
            return Err(ConfigError::InvalidValue {
                key: ENV_SEARCH_ENDPOINT,
                reason: "template must contain {query}".to_string(),
            });
        }
        config.collaborators.search_endpoint = endpoint;
    }
    Ok(())
}

/// Load `config.toml` and apply the process environment.
pub async fn load_config(data_dir: &Path) -> Result<GlobalConfig, ConfigError> {
    let mut config = load_global_config(data_dir).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Database URL for the SQLite backend: the configured one, or
/// `sqlite://{data_dir}/mealflow.db`.
pub fn resolve_database_url(config: &GlobalConfig, data_dir: &Path) -> String {
    match &config.storage.database_url {
        Some(url) => url.clone(),
        None => format!("sqlite://{}/mealflow.db", data_dir.display()),
    }
}

/// Create the data directory if it does not exist yet.
pub async fn ensure_data_dir(data_dir: &Path) -> Result<(), ConfigError> {
    tokio::fs::create_dir_all(data_dir)
        .await
        .map_err(|source| ConfigError::DataDir {
            path: data_dir.to_path_buf(),
            source,
        })
}
