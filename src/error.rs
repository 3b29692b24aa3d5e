use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("user with this email already exists")]
    DuplicateEmail,
    #[error("{0}")]
    Internal(String),
    #[error(transparent)]
    Database(#[from] DbError),
}

pub type ApiResult<T> = Result<T, ApiError>;

/// JSON error body: a stable `code`, a short `error` title and free-form
/// `details` (the low-level message for storage failures).
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    pub details: String,
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn missing_database_url() -> Self {
        ApiError::Database(DbError::Configuration(
            "DATABASE_URL environment variable is missing".into(),
        ))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::DuplicateEmail => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Database(DbError::NotFound) => StatusCode::NOT_FOUND,
            ApiError::Database(DbError::StaleRevision { .. }) => StatusCode::CONFLICT,
            ApiError::Database(DbError::ComponentOnOtherPage { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (error, code, details) = match self {
            ApiError::Validation(m) => ("Invalid request data", "validation_error", m.clone()),
            ApiError::NotFound(m) => ("Not found", "not_found", m.clone()),
            ApiError::DuplicateEmail => (
                "User with this email already exists",
                "duplicate_email",
                self.to_string(),
            ),
            ApiError::Internal(m) => ("Internal server error", "internal_error", m.clone()),
            ApiError::Database(db) => match db {
                DbError::Configuration(m) => {
                    ("Database configuration error", "database_configuration_error", m.clone())
                }
                DbError::Connection(m) => {
                    ("Database connection failed", "database_connection_failed", m.clone())
                }
                DbError::Schema(m) => (
                    "Database schema error",
                    "database_schema_error",
                    format!("{m}. Database tables may not be migrated. Run: sqlx migrate run"),
                ),
                DbError::Pooling(m) => (
                    "Database connection pooling error",
                    "database_pooling_error",
                    format!("{m}. Connection pool issue. Please try again."),
                ),
                DbError::NotFound => ("Not found", "not_found", db.to_string()),
                DbError::StaleRevision { .. } => ("Conflict", "stale_revision", db.to_string()),
                DbError::ComponentOnOtherPage { .. } => {
                    ("Invalid request data", "validation_error", db.to_string())
                }
                DbError::UniqueViolation(m) | DbError::Other(m) => {
                    ("Internal server error", "internal_error", m.clone())
                }
            },
        };
        ErrorBody {
            error: error.to_string(),
            code,
            details,
        }
    }
}

/// Malformed or mistyped JSON bodies are reported like any other invalid input.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_kinds_map_to_stable_codes() {
        let cases = [
            (DbError::Configuration("x".into()), "database_configuration_error"),
            (DbError::Connection("x".into()), "database_connection_failed"),
            (DbError::Schema("x".into()), "database_schema_error"),
            (DbError::Pooling("x".into()), "database_pooling_error"),
            (DbError::Other("x".into()), "internal_error"),
        ];
        for (db, code) in cases {
            let err = ApiError::from(db);
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(err.body().code, code);
        }
    }

    #[test]
    fn schema_error_carries_migration_hint_and_driver_message() {
        let body = ApiError::from(DbError::Schema("relation \"users\" does not exist".into())).body();
        assert!(body.details.contains("relation \"users\" does not exist"));
        assert!(body.details.contains("migrate"));
    }

    #[test]
    fn client_errors() {
        assert_eq!(ApiError::validation("bad").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::DuplicateEmail.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotFound("u".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(DbError::StaleRevision { expected: 1, current: 2 }).status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn component_on_other_page_is_a_validation_error() {
        let err = ApiError::from(DbError::ComponentOnOtherPage {
            component: "aboutMe".into(),
            page: 2,
        });
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        let body = err.body();
        assert_eq!(body.code, "validation_error");
        assert!(body.details.contains("aboutMe"));
    }

    #[test]
    fn missing_database_url_is_a_configuration_error() {
        let body = ApiError::missing_database_url().body();
        assert_eq!(body.code, "database_configuration_error");
        assert!(body.details.contains("DATABASE_URL"));
    }
}
