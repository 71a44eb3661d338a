//! Health reporting - liveness, readiness and database probes
//!
//! | Probe      | Depends on DB | Unhealthy when                         |
//! |------------|---------------|----------------------------------------|
//! | liveness   | no            | never under a dependency failure       |
//! | readiness  | no            | never once the listener is bound       |
//! | database   | yes           | not connected, or the ping fails       |
//!
//! Reports are built fresh per request and never cached.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::db::{ConnectionManager, DbError};

/// Component name reported by the database probe
pub const DATABASE_COMPONENT: &str = "database";

/// Overall probe outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Process metadata attached to the liveness report
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    /// Seconds since the reporter was created
    pub uptime: f64,
    pub environment: String,
    pub version: &'static str,
}

/// Result of a single probe
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<&'static str>,
    /// ISO-8601 UTC timestamp with millisecond precision
    pub timestamp: String,
    #[serde(flatten)]
    pub process: Option<ProcessInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn healthy(component: Option<&'static str>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            component,
            timestamp: now_iso8601(),
            process: None,
            error: None,
        }
    }

    pub fn unhealthy(component: Option<&'static str>, error: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            component,
            timestamp: now_iso8601(),
            process: None,
            error: Some(error.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Answers the three probes from the connection manager's state
#[derive(Clone)]
pub struct HealthReporter {
    manager: Arc<ConnectionManager>,
    started_at: Instant,
    environment: String,
    ping_timeout: Duration,
}

impl HealthReporter {
    pub fn new(
        manager: Arc<ConnectionManager>,
        environment: impl Into<String>,
        ping_timeout: Duration,
    ) -> Self {
        Self {
            manager,
            started_at: Instant::now(),
            environment: environment.into(),
            ping_timeout,
        }
    }

    /// Liveness: the process is up and serving HTTP. Never touches the database.
    pub fn liveness(&self) -> HealthReport {
        HealthReport {
            process: Some(ProcessInfo {
                uptime: self.started_at.elapsed().as_secs_f64(),
                environment: self.environment.clone(),
                version: env!("CARGO_PKG_VERSION"),
            }),
            ..HealthReport::healthy(None)
        }
    }

    /// Readiness: accepting traffic. Always true once the listener is bound.
    pub fn readiness(&self) -> &'static str {
        "OK"
    }

    /// Active database check: state must be Connected and a ping must succeed.
    ///
    /// Bounded by the ping timeout. Never retries; reconnecting is the
    /// connection manager's job.
    pub async fn database(&self) -> HealthReport {
        let Some(db) = self.manager.database() else {
            let err = self.manager.unavailable();
            tracing::debug!(error = %err, "database probe: no live connection");
            return HealthReport::unhealthy(Some(DATABASE_COMPONENT), err.to_string());
        };

        let outcome = match tokio::time::timeout(self.ping_timeout, db.ping()).await {
            Ok(result) => result,
            Err(_) => Err(DbError::PingTimeout(self.ping_timeout)),
        };

        match outcome {
            Ok(()) => HealthReport::healthy(Some(DATABASE_COMPONENT)),
            Err(err) => {
                tracing::warn!(error = %err, "database health check failed");
                HealthReport::unhealthy(Some(DATABASE_COMPONENT), err.to_string())
            }
        }
    }
}
