//! API error types with IntoResponse
//!
//! Errors are converted to JSON envelopes with appropriate status codes.
//! Internal detail is logged, never returned to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::db::DbError;

/// API error type with automatic HTTP status mapping
#[derive(Debug)]
pub enum ApiError {
    /// Database error (500, logged)
    Database(DbError),

    /// Unknown route (404)
    NotFound { path: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            Self::Database(e) if e.is_unavailable() => {
                tracing::error!(error = %e, "query attempted without database connection");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "database_unavailable",
                        "message": "database is not available"
                    }),
                )
            }
            Self::Database(e) => {
                // Log the actual error, return generic message
                tracing::error!(error = %e, "database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "internal_error",
                        "message": "an internal error occurred"
                    }),
                )
            }
            Self::NotFound { path } => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "not_found",
                    "message": format!("no route for {}", path)
                }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        Self::Database(e)
    }
}
