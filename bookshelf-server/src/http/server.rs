//! Axum server setup
//!
//! Server skeleton with:
//! - Permissive CORS
//! - Tracing middleware
//! - Database bootstrap started alongside the listener, never awaited
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::future::Future;
use std::sync::Arc;

use axum::http::Uri;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::routes;
use crate::config::AppConfig;
use crate::db::{ConnectionManager, MySqlConnector};
use crate::health::HealthReporter;

/// Shared application state
pub struct AppState {
    pub db: Arc<ConnectionManager>,
    pub health: HealthReporter,
}

impl AppState {
    pub fn new(db: Arc<ConnectionManager>, health: HealthReporter) -> Self {
        Self { db, health }
    }
}

/// Build the application router with all routes
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::health::router())
        .nest("/api", routes::library::router())
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound {
        path: uri.path().to_string(),
    }
}

/// Run the HTTP server against MySQL until a shutdown signal arrives.
///
/// # Example
///
/// ```ignore
/// let config = AppConfig::from_env()?;
/// run_server(config).await?;
/// ```
pub async fn run_server(config: AppConfig) -> Result<(), ServerError> {
    tracing::info!(
        host = %config.db.host,
        port = config.db.port,
        database = %config.db.database,
        max_attempts = config.retry.max_attempts,
        retry_delay_ms = config.retry.delay.as_millis() as u64,
        degraded_window_ms = config.retry.degraded_window().as_millis() as u64,
        "database configuration loaded"
    );

    let connector = Arc::new(MySqlConnector::new(config.db.clone()));
    let manager = ConnectionManager::new(connector, config.retry);
    let health = HealthReporter::new(
        Arc::clone(&manager),
        config.server.environment.clone(),
        config.db.connect_timeout,
    );
    let state = Arc::new(AppState::new(manager, health));

    // Bind listener
    let listener = TcpListener::bind(config.server.bind_addr).await?;
    tracing::info!("Server is running on http://{}", config.server.bind_addr);

    serve(listener, state, shutdown_signal()).await
}

/// Serve on an already-bound listener.
///
/// Starts the database bootstrap without waiting for it, serves until
/// `shutdown` resolves, then cancels any pending retry.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    state.db.initiate();

    let app = build_router(Arc::clone(&state));
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await;

    state.db.shutdown().await;
    result?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tower::ServiceExt;

    use super::*;
    use crate::config::RetryPolicy;
    use crate::db::manager::testing::{settled, FakeDatabase, ScriptedConnector};
    use crate::http::routes::library::{AUTHORS, BOOKS};

    fn state_with(connector: Arc<ScriptedConnector>, max_attempts: u32) -> Arc<AppState> {
        let policy = RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(5000),
        };
        let manager = ConnectionManager::new(connector, policy);
        let health = HealthReporter::new(Arc::clone(&manager), "test", Duration::from_secs(10));
        Arc::new(AppState::new(manager, health))
    }

    async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = build_router(Arc::clone(state))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, bytes.to_vec())
    }

    async fn get_json(state: &Arc<AppState>, uri: &str) -> (StatusCode, Value) {
        let (status, bytes) = get(state, uri).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn library() -> FakeDatabase {
        FakeDatabase {
            rows: vec![
                (
                    BOOKS.statement.to_string(),
                    vec![
                        json!({"id": 1, "title": "Dune", "author_id": 1}),
                        json!({"id": 2, "title": "Emma", "author_id": 2}),
                    ]
                    .into_iter()
                    .filter_map(|v| v.as_object().cloned())
                    .collect(),
                ),
                (AUTHORS.statement.to_string(), vec![]),
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn ready_is_ok_before_bootstrap() {
        let state = state_with(ScriptedConnector::always_failing(), 5);
        let (status, body) = get(&state, "/ready").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    #[tokio::test(start_paused = true)]
    async fn degraded_mode_after_exhaustion() {
        let connector = ScriptedConnector::always_failing();
        let state = state_with(connector.clone(), 5);
        state.db.initiate();
        settled(&state.db).await;
        assert_eq!(connector.calls(), 5);

        let (status, body) = get_json(&state, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["environment"], "test");

        let (status, body) = get_json(&state, "/health/db").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["component"], "database");
        assert!(body["error"].is_string());

        let (status, body) = get_json(&state, "/api/books").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "database_unavailable");
        assert!(body.get("books").is_none());

        let (status, _) = get(&state, "/ready").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test(start_paused = true)]
    async fn database_probe_healthy_once_connected() {
        let state = state_with(ScriptedConnector::failing_then(2, library()), 5);
        state.db.initiate();
        settled(&state.db).await;

        let (status, body) = get_json(&state, "/health/db").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["component"], "database");
        assert!(body["timestamp"].is_string());
        assert!(body.get("error").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn listings_wrap_rows_in_named_arrays() {
        let state = state_with(ScriptedConnector::failing_then(0, library()), 5);
        state.db.initiate();
        settled(&state.db).await;

        let (status, body) = get_json(&state, "/api/books").await;
        assert_eq!(status, StatusCode::OK);
        let books = body["books"].as_array().unwrap();
        assert_eq!(books.len(), 2);
        assert_eq!(books[0]["title"], "Dune");
        assert_eq!(books[1]["title"], "Emma");

        // zero rows is an empty array, not null
        let (status, body) = get_json(&state, "/api/authors").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"authors": []}));
    }

    #[tokio::test(start_paused = true)]
    async fn query_error_is_500_envelope() {
        let db = FakeDatabase {
            query_error: Some("Table 'bookshelf.authors' doesn't exist".into()),
            ..Default::default()
        };
        let state = state_with(ScriptedConnector::failing_then(0, db), 5);
        state.db.initiate();
        settled(&state.db).await;

        let (status, body) = get_json(&state, "/api/authors").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal_error");
    }

    #[tokio::test]
    async fn unknown_route_is_404_envelope() {
        let state = state_with(ScriptedConnector::always_failing(), 5);
        let (status, body) = get_json(&state, "/api/missing").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn serve_answers_while_bootstrap_retries() {
        let connector = ScriptedConnector::always_failing();
        let state = state_with(connector.clone(), 5);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, Arc::clone(&state), async move {
            let _ = stop_rx.await;
        }));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /ready HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("OK"));
        assert!(!state.db.current_state().is_connected());

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();

        // shutdown cancelled the pending retry
        let calls = connector.calls();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(connector.calls(), calls);
    }
}
