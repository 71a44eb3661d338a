//! Health check endpoints
//!
//! - GET /health     liveness, independent of the database
//! - GET /ready      readiness, plain "OK"
//! - GET /health/db  active database check

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};

use crate::health::HealthReport;
use crate::http::server::AppState;

impl IntoResponse for HealthReport {
    fn into_response(self) -> Response {
        let status = if self.is_healthy() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (status, Json(self)).into_response()
    }
}

/// GET /health
async fn liveness(State(state): State<Arc<AppState>>) -> HealthReport {
    tracing::debug!("health check endpoint accessed");
    state.health.liveness()
}

/// GET /ready
async fn readiness(State(state): State<Arc<AppState>>) -> &'static str {
    state.health.readiness()
}

/// GET /health/db
async fn database(State(state): State<Arc<AppState>>) -> HealthReport {
    state.health.database().await
}

/// Health routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(liveness))
        .route("/ready", get(readiness))
        .route("/health/db", get(database))
}
