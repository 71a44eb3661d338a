//! Connection manager - owns the database handle and its bootstrap
//!
//! The bootstrap runs as a spawned task:
//! 1. state = Connecting(attempt)
//! 2. open a connection through the [`Connector`]
//! 3. on success state = Connected, done
//! 4. on failure wait `policy.delay` and retry, or after `policy.max_attempts`
//!    failures state = Failed and the process carries on without a database

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::connector::{Connector, Database, Row};
use super::state::ConnectionState;
use super::DbError;
use crate::config::RetryPolicy;

/// Internal state: the handle travels with `Connected` so a snapshot can
/// never report a connection without one.
enum Link {
    Uninitialized,
    Connecting { attempt: u32 },
    Connected(Arc<dyn Database>),
    Failed { error: String, attempts: u32 },
}

impl Link {
    fn state(&self) -> ConnectionState {
        match self {
            Self::Uninitialized => ConnectionState::Uninitialized,
            Self::Connecting { attempt } => ConnectionState::Connecting { attempt: *attempt },
            Self::Connected(_) => ConnectionState::Connected,
            Self::Failed { error, attempts } => ConnectionState::Failed {
                error: error.clone(),
                attempts: *attempts,
            },
        }
    }
}

/// Owns the database connection and its lifecycle
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    policy: RetryPolicy,
    link: watch::Sender<Link>,
    state_tx: watch::Sender<ConnectionState>,
    attempts: AtomicU32,
    started: AtomicBool,
    shutdown: CancellationToken,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, policy: RetryPolicy) -> Arc<Self> {
        let (link, _) = watch::channel(Link::Uninitialized);
        let (state_tx, _) = watch::channel(ConnectionState::Uninitialized);

        Arc::new(Self {
            connector,
            policy,
            link,
            state_tx,
            attempts: AtomicU32::new(0),
            started: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
        })
    }

    /// Start the bootstrap in the background.
    ///
    /// Returns immediately. Only the first call has any effect.
    pub fn initiate(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::warn!("database bootstrap already started, ignoring");
            return;
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.bootstrap().await });
    }

    /// Snapshot of the current connection state.
    pub fn current_state(&self) -> ConnectionState {
        self.link.borrow().state()
    }

    /// Receiver notified on every state transition.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// The live handle, if connected.
    pub fn database(&self) -> Option<Arc<dyn Database>> {
        match &*self.link.borrow() {
            Link::Connected(db) => Some(Arc::clone(db)),
            _ => None,
        }
    }

    /// Connection attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Run a statement on the live connection.
    ///
    /// Fails immediately with [`DbError::Unavailable`] when not connected.
    pub async fn execute_query(
        &self,
        statement: &str,
        params: &[Value],
    ) -> Result<Vec<Row>, DbError> {
        let db = self.database().ok_or_else(|| self.unavailable())?;
        db.fetch_all(statement, params).await
    }

    /// Error describing why no connection is available right now.
    pub fn unavailable(&self) -> DbError {
        DbError::Unavailable(self.current_state().to_string())
    }

    /// Stop any pending retry and release the connection.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(db) = self.database() {
            db.close().await;
        }
    }

    fn transition(&self, link: Link) {
        let state = link.state();
        self.link.send_replace(link);
        self.state_tx.send_replace(state);
    }

    async fn bootstrap(self: Arc<Self>) {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            self.transition(Link::Connecting { attempt });
            self.attempts.fetch_add(1, Ordering::SeqCst);
            tracing::info!(attempt, max_attempts, "connecting to database");

            let result = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!(attempt, "database bootstrap cancelled");
                    return;
                }
                result = self.connector.connect() => result,
            };

            let err = match result {
                Ok(db) => {
                    if self.shutdown.is_cancelled() {
                        tracing::info!(attempt, "database bootstrap cancelled, closing connection");
                        db.close().await;
                        return;
                    }
                    self.transition(Link::Connected(Arc::clone(&db)));
                    tracing::info!(attempt, "connected to database");
                    // shutdown() may have looked for a handle just before the transition
                    if self.shutdown.is_cancelled() {
                        db.close().await;
                    }
                    return;
                }
                Err(err) => err,
            };

            if attempt == max_attempts {
                tracing::error!(
                    error = %err,
                    attempts = attempt,
                    "giving up on database connection"
                );
                tracing::warn!("application will continue running without database connection");
                self.transition(Link::Failed {
                    error: err.to_string(),
                    attempts: attempt,
                });
                return;
            }

            tracing::warn!(
                error = %err,
                attempt,
                retry_in_ms = self.policy.delay.as_millis() as u64,
                "database connection failed, retrying"
            );

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!(attempt, "database retry cancelled");
                    return;
                }
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }
    }
}
