//! bookshelf-server: HTTP server for the bookshelf catalogue
//!
//! Lists books and authors from MySQL and reports liveness, readiness and
//! database health. The listener comes up immediately; the database
//! connection is established in the background with bounded retry, and the
//! service keeps answering in degraded mode if it never arrives.

pub mod config;
pub mod db;
pub mod health;
pub mod http;

pub use config::{AppConfig, ConfigError, DbConfig, RetryPolicy, ServerConfig};
pub use db::{ConnectionManager, ConnectionState, DbError};
pub use health::{HealthReport, HealthReporter, HealthStatus};
pub use http::{run_server, ServerError};
