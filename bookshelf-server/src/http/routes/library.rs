//! Book and author listings
//!
//! Each listing runs a fixed statement and wraps the rows in an envelope
//! keyed by the resource name: `{"books": [...]}`.

use std::sync::Arc;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde_json::{Map, Value};

use crate::http::error::ApiError;
use crate::http::server::AppState;

/// A listable table
#[derive(Debug, Clone, Copy)]
pub struct Resource {
    /// Envelope key and URL segment
    pub name: &'static str,
    pub statement: &'static str,
}

pub const BOOKS: Resource = Resource {
    name: "books",
    statement: "SELECT * FROM books",
};

pub const AUTHORS: Resource = Resource {
    name: "authors",
    statement: "SELECT * FROM authors",
};

async fn list(state: &AppState, resource: Resource) -> Result<Json<Map<String, Value>>, ApiError> {
    let rows = state.db.execute_query(resource.statement, &[]).await?;
    tracing::debug!(resource = resource.name, rows = rows.len(), "listed rows");

    let rows = rows.into_iter().map(Value::Object).collect();
    let mut envelope = Map::new();
    envelope.insert(resource.name.to_string(), Value::Array(rows));
    Ok(Json(envelope))
}

/// GET /api/books
async fn list_books(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    list(&state, BOOKS).await
}

/// GET /api/authors
async fn list_authors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    list(&state, AUTHORS).await
}

/// Library routes, mounted under `/api`
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/books", get(list_books))
        .route("/authors", get(list_authors))
}
