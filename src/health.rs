use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::instrument;

use crate::{error::ApiResult, state::AppState};

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct TableCounts {
    pub users: i64,
    pub configs: i64,
}

#[derive(Debug, Serialize)]
pub struct DbCheck {
    pub status: &'static str,
    pub data: TableCounts,
}

/// Mounted at the root, outside `/api`.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

pub fn diagnostics_routes() -> Router<AppState> {
    Router::new().route("/test-db", get(test_db))
}

pub async fn health() -> Json<Health> {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    Json(Health {
        status: "OK",
        timestamp,
    })
}

/// Round-trips both tables so a missing migration shows up as a schema error.
#[instrument(skip(state))]
pub async fn test_db(State(state): State<AppState>) -> ApiResult<Json<DbCheck>> {
    let repos = state.repos()?;
    let users = repos.users.count().await?;
    let configs = repos.onboarding.count().await?;
    Ok(Json(DbCheck {
        status: "Database connection successful",
        data: TableCounts { users, configs },
    }))
}
