//! HTTP server layer
//!
//! Axum server with:
//! - Liveness, readiness and database health probes
//! - Book and author listings under /api
//! - Graceful shutdown
//! - JSON error responses

pub mod error;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use server::{build_router, run_server, serve, shutdown_signal, AppState, ServerError};
