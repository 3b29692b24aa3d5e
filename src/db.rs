use std::future::Future;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{AppConfig, RetryConfig};

/// Storage failures, classified once at the persistence boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DbError {
    #[error("database configuration error: {0}")]
    Configuration(String),
    #[error("database connection failed: {0}")]
    Connection(String),
    #[error("database schema error: {0}")]
    Schema(String),
    #[error("database connection pooling error: {0}")]
    Pooling(String),
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("record not found")]
    NotFound,
    #[error("stale configuration revision: expected {expected}, current {current}")]
    StaleRevision { expected: i64, current: i64 },
    #[error("Component {component} is already assigned to page {page}")]
    ComponentOnOtherPage { component: String, page: i16 },
    #[error("database error: {0}")]
    Other(String),
}

impl DbError {
    /// Connection drops and prepared-statement/pooling faults are the only
    /// errors worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, DbError::Connection(_) | DbError::Pooling(_))
    }

    /// Classify by PostgreSQL SQLSTATE code.
    pub fn from_sqlstate(code: &str, detail: String) -> Self {
        match code {
            "23505" => DbError::UniqueViolation(detail),
            "42P01" | "42703" | "3F000" => DbError::Schema(detail),
            "26000" | "42P05" => DbError::Pooling(detail),
            "57P01" | "57P02" | "57P03" | "53300" => DbError::Connection(detail),
            c if c.starts_with("08") => DbError::Connection(detail),
            _ => DbError::Other(detail),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        let detail = e.to_string();
        match &e {
            sqlx::Error::Configuration(_) => DbError::Configuration(detail),
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DbError::Connection(detail),
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::ColumnNotFound(_) => DbError::Schema(detail),
            sqlx::Error::Database(db) => match db.code() {
                Some(code) => DbError::from_sqlstate(&code, detail),
                None => DbError::Other(detail),
            },
            _ => DbError::Other(detail),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Run `op`, retrying transient failures with exponential backoff.
///
/// `policy.max_attempts` counts the first try. The delay starts at
/// `policy.initial_delay()` and doubles after every failed attempt.
pub async fn with_retry<T, F, Fut>(policy: &RetryConfig, op_name: &str, mut op: F) -> DbResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay();
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                warn!(
                    op = op_name,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient database error, retrying"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => {
                debug!(op = op_name, attempt, error = %e, "database operation failed");
                return Err(e);
            }
        }
    }
}

pub async fn connect(config: &AppConfig, url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(url)
        .await
        .context("connect to database")
}
