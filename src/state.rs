use std::sync::Arc;

use sqlx::PgPool;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::onboarding::repo::{InMemoryOnboardingRepository, OnboardingRepository, PgOnboardingRepository};
use crate::users::repo::{InMemoryUserRepository, PgUserRepository, UserRepository};

#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub onboarding: Arc<dyn OnboardingRepository>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// Kept for migrations; handlers go through `repos`.
    pub db: Option<PgPool>,
    repos: Option<Repositories>,
}

impl AppState {
    /// Without `DATABASE_URL` the server still starts and every storage-backed
    /// handler reports a configuration error.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let Some(url) = config.database_url.clone() else {
            warn!("DATABASE_URL is not set; /api endpoints will fail");
            return Ok(Self {
                config,
                db: None,
                repos: None,
            });
        };

        let pool = db::connect(&config, &url).await?;
        info!(max_connections = config.db_max_connections, "database pool ready");
        Ok(Self::from_parts(pool, config))
    }

    pub fn from_parts(db: PgPool, config: Arc<AppConfig>) -> Self {
        let repos = Repositories {
            users: Arc::new(PgUserRepository::new(db.clone(), config.retry.clone())),
            onboarding: Arc::new(PgOnboardingRepository::new(db.clone(), config.retry.clone())),
        };
        Self {
            config,
            db: Some(db),
            repos: Some(repos),
        }
    }

    /// State backed by process-local repositories, for tests and demos.
    pub fn in_memory() -> Self {
        let repos = Repositories {
            users: Arc::new(InMemoryUserRepository::default()),
            onboarding: Arc::new(InMemoryOnboardingRepository::default()),
        };
        Self {
            config: Arc::new(test_config(Some("memory://".into()))),
            db: None,
            repos: Some(repos),
        }
    }

    /// State as it looks when `DATABASE_URL` is missing.
    pub fn unconfigured() -> Self {
        Self {
            config: Arc::new(test_config(None)),
            db: None,
            repos: None,
        }
    }

    pub fn repos(&self) -> ApiResult<&Repositories> {
        self.repos.as_ref().ok_or_else(ApiError::missing_database_url)
    }
}

fn test_config(database_url: Option<String>) -> AppConfig {
    AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        db_max_connections: 1,
        retry: Default::default(),
    }
}
