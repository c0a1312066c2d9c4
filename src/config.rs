// Runtime configuration
// Read from the environment (optionally seeded from a .env file)

use crate::error::RepositoryError;

const DEFAULT_DATABASE_URL: &str = "sqlite://bubble_tea.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_LOG_RETENTION_DAYS: i64 = 90;

/// Settings consumed by the store and by maintenance jobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Activity log rows older than this many days are purged
    pub log_retention_days: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
        }
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads `DATABASE_URL`, `DB_MAX_CONNECTIONS`
    /// and `LOG_RETENTION_DAYS`.
    pub fn from_env() -> Result<Self, RepositoryError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RepositoryError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(defaults.database_url);

        let max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw.trim().parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| {
                RepositoryError::Configuration(format!(
                    "DB_MAX_CONNECTIONS must be a positive integer, got '{raw}'"
                ))
            })?,
            None => defaults.max_connections,
        };

        let log_retention_days = match lookup("LOG_RETENTION_DAYS") {
            Some(raw) => raw.trim().parse::<i64>().ok().filter(|n| *n >= 1).ok_or_else(|| {
                RepositoryError::Configuration(format!(
                    "LOG_RETENTION_DAYS must be at least 1, got '{raw}'"
                ))
            })?,
            None => defaults.log_retention_days,
        };

        Ok(Self {
            database_url,
            max_connections,
            log_retention_days,
        })
    }
}
