//! Shared domain types for mealflow.
//!
//! This crate contains the types exchanged between the engine, its storage
//! adapters and the HTTP layer: workflow state and partial updates, session
//! records and execution positions, interrupt payloads, stream events,
//! configuration and error enums.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod interrupt;
pub mod session;
pub mod state;
pub mod update;
