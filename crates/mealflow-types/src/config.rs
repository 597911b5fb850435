//! Global configuration types for mealflow.
//!
//! `GlobalConfig` represents the top-level `config.toml`. Every section and
//! field has a default so a missing or partial file is always usable.

use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from `{data_dir}/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub collaborators: CollaboratorConfig,
}

/// Workflow policy constants and execution limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound for `refinement_count`.
    #[serde(default = "default_max_refinements")]
    pub max_refinements: u32,
    /// Valid candidates needed to skip refinement.
    #[serde(default = "default_min_valid_candidates")]
    pub min_valid_candidates: usize,
    /// Candidates kept after parsing or refining.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// Per-node timeout; a node exceeding it fails the step.
    #[serde(default = "default_step_timeout_secs")]
    pub step_timeout_secs: u64,
    /// Retries after the first attempt for transient collaborator errors.
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Per-URL bound on candidate validation; a slower check counts as invalid.
    #[serde(default = "default_validate_timeout_secs")]
    pub validate_timeout_secs: u64,
    /// Guard against a misconfigured graph looping forever.
    #[serde(default = "default_max_steps_per_run")]
    pub max_steps_per_run: u32,
}

fn default_max_refinements() -> u32 {
    2
}

fn default_min_valid_candidates() -> usize {
    3
}

fn default_max_candidates() -> usize {
    5
}

fn default_step_timeout_secs() -> u64 {
    60
}

fn default_fetch_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    250
}

fn default_validate_timeout_secs() -> u64 {
    10
}

fn default_max_steps_per_run() -> u32 {
    64
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_refinements: default_max_refinements(),
            min_valid_candidates: default_min_valid_candidates(),
            max_candidates: default_max_candidates(),
            step_timeout_secs: default_step_timeout_secs(),
            fetch_retries: default_fetch_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            validate_timeout_secs: default_validate_timeout_secs(),
            max_steps_per_run: default_max_steps_per_run(),
        }
    }
}

/// Which checkpoint backend holds sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Durable SQLite database.
    #[default]
    Sqlite,
    /// Ephemeral in-process map; sessions are lost on restart.
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Sqlite => write!(f, "sqlite"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(StorageBackend::Sqlite),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("invalid storage backend: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Defaults to `sqlite://{data_dir}/mealflow.db` when unset.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Finished sessions older than this many days are purged.
    #[serde(default)]
    pub retention_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Endpoints and client settings for the external collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaboratorConfig {
    /// Search URL template; `{query}` is replaced with the encoded query.
    #[serde(default = "default_search_endpoint")]
    pub search_endpoint: String,
    /// Reminders HTTP proxy base URL. Reminders are disabled when unset.
    #[serde(default)]
    pub reminders_proxy_url: Option<String>,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_search_endpoint() -> String {
    "https://html.duckduckgo.com/html/?q={query}".to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            search_endpoint: default_search_endpoint(),
            reminders_proxy_url: None,
            http_timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}
