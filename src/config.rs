use std::time::Duration;

use serde::Deserialize;

/// Backoff settings for the transient database error class.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` when `DATABASE_URL` is unset; every `/api` handler then answers
    /// with a configuration error instead of touching storage.
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub retry: RetryConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let retry = RetryConfig {
            max_attempts: env_parse("DB_RETRY_ATTEMPTS").unwrap_or(3).max(1),
            initial_delay_ms: env_parse("DB_RETRY_DELAY_MS").unwrap_or(1000),
        };
        Ok(Self {
            database_url,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT").unwrap_or(8080),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS").unwrap_or(10),
            retry,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
