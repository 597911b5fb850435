//! Infrastructure layer for mealflow.
//!
//! Implements the ports defined in `mealflow-core`: the SQLite checkpoint
//! store, checkpoint backend selection, configuration loading, and the
//! HTTP collaborators (search, recipe pages, reminders proxy).

pub mod config;
pub mod http;
pub mod sqlite;
pub mod store;
