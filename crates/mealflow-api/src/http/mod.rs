//! HTTP/SSE API layer for mealflow.
//!
//! Axum-based API at `/api/v1/` with envelope responses for JSON endpoints,
//! Server-Sent Events for session runs, and permissive CORS.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod sse;
