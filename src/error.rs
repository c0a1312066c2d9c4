// Error handling module for the shop repositories
// Infrastructure and caller errors live here; user-facing failures travel in envelopes

use thiserror::Error;

/// Errors that escape a repository call as `Err`.
///
/// Validation, not-found, conflict, dependency and no-op outcomes are NOT
/// represented here: those are reported through `SingleResponse` /
/// `PaginatedResponse` so callers can branch on `success` without matching
/// on errors. This enum only covers failures the caller cannot fix by
/// changing user input.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Store operation failed (connection, constraint outside the guarded set, ...)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Structural misuse of a query, e.g. an inverted or future date range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Schema migration failure while opening the store
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Configuration value missing or malformed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A stored value cannot be read back, e.g. a non-finite amount
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),
}

/// Result type alias for repository operations
pub type RepoResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        RepositoryError::InvalidArgument(message.into())
    }

    pub fn data_integrity(message: impl Into<String>) -> Self {
        RepositoryError::DataIntegrity(message.into())
    }

    /// True when the underlying store rejected a write on a unique index.
    ///
    /// The uniqueness guard pre-checks every business key, but two callers
    /// can race between check and insert; the index is the final word.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            RepositoryError::Database(err) => err
                .as_database_error()
                .map(|db_err| db_err.is_unique_violation())
                .unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = RepositoryError::invalid_argument("data fine precedente alla data inizio");
        assert_eq!(
            error.to_string(),
            "Invalid argument: data fine precedente alla data inizio"
        );

        let error = RepositoryError::Configuration("LOG_RETENTION_DAYS".to_string());
        assert_eq!(error.to_string(), "Configuration error: LOG_RETENTION_DAYS");

        let error = RepositoryError::data_integrity("Totale riga non valido");
        assert_eq!(error.to_string(), "Data integrity error: Totale riga non valido");
    }

    #[test]
    fn test_error_from_sqlx() {
        let sqlx_error = sqlx::Error::RowNotFound;
        let repo_error: RepositoryError = sqlx_error.into();
        assert!(matches!(repo_error, RepositoryError::Database(_)));
        assert!(!repo_error.is_unique_violation());
    }
}
