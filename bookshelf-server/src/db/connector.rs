//! Database handles and the connectors that open them
//!
//! [`Connector`] opens a handle, [`Database`] runs statements on it. The
//! MySQL implementations are backed by a sqlx pool; tests substitute
//! scripted implementations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::{Map, Value};
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, MySql, Row as _};

use super::DbError;
use crate::config::DbConfig;

/// Maximum pooled connections.
/// Kept low, the service only issues short read queries.
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// A result row as a JSON object keyed by column name
pub type Row = Map<String, Value>;

/// A live database handle
#[async_trait]
pub trait Database: Send + Sync + 'static {
    /// Lightweight round trip to verify the connection is still usable.
    async fn ping(&self) -> Result<(), DbError>;

    /// Run a statement with positional parameters and collect every row.
    async fn fetch_all(&self, statement: &str, params: &[Value]) -> Result<Vec<Row>, DbError>;

    /// Release the underlying connections.
    async fn close(&self) {}
}

/// Opens database handles, one call per bootstrap attempt
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self) -> Result<Arc<dyn Database>, DbError>;
}

/// Connector for MySQL using a sqlx pool
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    config: DbConfig,
}

impl MySqlConnector {
    pub fn new(config: DbConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self) -> Result<Arc<dyn Database>, DbError> {
        let timeout = self.config.connect_timeout;
        let connect = MySqlPoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .acquire_timeout(timeout)
            .connect_with(self.config.connect_options());

        let pool = tokio::time::timeout(timeout, connect)
            .await
            .map_err(|_| DbError::ConnectTimeout(timeout))?
            .map_err(DbError::Connect)?;

        Ok(Arc::new(MySqlDatabase::new(pool)))
    }
}

/// MySQL handle backed by a connection pool
#[derive(Debug, Clone)]
pub struct MySqlDatabase {
    pool: MySqlPool,
}

impl MySqlDatabase {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Database for MySqlDatabase {
    async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(DbError::Query)
    }

    async fn fetch_all(&self, statement: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        let query = params
            .iter()
            .fold(sqlx::query(statement), |query, param| bind_json(query, param));

        let rows = query.fetch_all(&self.pool).await.map_err(DbError::Query)?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

fn bind_json<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    param: &Value,
) -> Query<'q, MySql, MySqlArguments> {
    match param {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(u) = n.as_u64() {
                query.bind(u)
            } else {
                query.bind(n.as_f64())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

/// Convert a MySQL row into a JSON object, preserving column order.
fn row_to_json(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), decode_column(row, column.ordinal())))
        .collect()
}

fn decode_column(row: &MySqlRow, index: usize) -> Value {
    // NULL passes every typed check, so the first attempt resolves it.
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<u64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.map(Value::from).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(index) {
        return v.map(|t| Value::from(t.to_rfc3339())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(index) {
        return v.map(|t| Value::from(t.to_string())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(index) {
        return v.map(|t| Value::from(t.to_string())).unwrap_or(Value::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveTime>, _>(index) {
        return v.map(|t| Value::from(t.to_string())).unwrap_or(Value::Null);
    }

    // DECIMAL and friends arrive as text on the wire
    match row.try_get_unchecked::<Option<String>, _>(index) {
        Ok(v) => v.map(Value::from).unwrap_or(Value::Null),
        Err(e) => {
            tracing::debug!(column = index, error = %e, "undecodable column, returning null");
            Value::Null
        }
    }
}
