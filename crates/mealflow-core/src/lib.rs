//! Interruptible workflow engine and the meal planner graph.
//!
//! This crate defines the ports (checkpoint store, collaborators) that the
//! infrastructure layer implements. It depends only on `mealflow-types` --
//! never on `mealflow-infra` or any database/HTTP crate.

pub mod checkpoint;
pub mod collaborators;
pub mod collate;
pub mod emitter;
pub mod engine;
pub mod graph;
pub mod interrupt;
pub mod meal_planner;
pub mod merge;
pub mod node;
pub mod nodes;
pub mod retry;
pub mod session;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;
