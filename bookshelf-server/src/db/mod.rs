//! Database layer - connection lifecycle and query capability
//!
//! # Design Principles
//!
//! - The server never waits for the database: the connection is established
//!   by a background bootstrap with bounded fixed-delay retry
//! - Connection state is owned by [`ConnectionManager`] and read as atomic snapshots
//! - Queries against a missing connection fail fast with [`DbError::Unavailable`]
//! - Concurrent queries share a small sqlx pool, no application-level locking

pub mod connector;
pub mod manager;
pub mod state;

use std::time::Duration;

pub use connector::{Connector, Database, MySqlConnector, MySqlDatabase, Row};
pub use manager::ConnectionManager;
pub use state::ConnectionState;

/// Database error type
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("could not connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("database connection timed out after {}ms", .0.as_millis())]
    ConnectTimeout(Duration),

    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("database ping timed out after {}ms", .0.as_millis())]
    PingTimeout(Duration),
}

impl DbError {
    /// Whether the error means no live connection was available
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
