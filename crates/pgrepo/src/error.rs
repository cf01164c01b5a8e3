//! Error types for pgrepo

use thiserror::Error;

/// Result type alias for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Error types for repository operations
#[derive(Debug, Error)]
pub enum RepoError {
    /// The backing store is unreachable or rejected the credentials
    #[error("Connection error: {0}")]
    Connection(String),

    /// Pool checkout error
    #[error("Pool error: {0}")]
    Pool(String),

    /// Statement execution error (malformed SQL, type mismatch, ...)
    #[error("Statement error: {0}")]
    Statement(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// NOT NULL constraint violation
    #[error("Not-null violation: {0}")]
    NotNullViolation(String),

    /// A write was attempted with zero rows or zero columns
    #[error("Empty batch: {0}")]
    EmptyBatch(String),

    /// Invalid input detected before anything was sent to the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Configuration loading error
    #[error("Config error: {0}")]
    Config(String),
}

impl RepoError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an empty batch error
    pub fn empty_batch(message: impl Into<String>) -> Self {
        Self::EmptyBatch(message.into())
    }

    /// Check if this is a connection or pool error
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Pool(_))
    }

    /// Check if this is any constraint violation reported by the store
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::UniqueViolation(_)
                | Self::ForeignKeyViolation(_)
                | Self::CheckViolation(_)
                | Self::NotNullViolation(_)
        )
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is an empty batch error
    pub fn is_empty_batch(&self) -> bool {
        matches!(self, Self::EmptyBatch(_))
    }

    /// Parse a tokio_postgres error into a more specific RepoError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();
            let code = db_err.code().code();

            match code {
                "23505" => return Self::UniqueViolation(format!("{constraint}: {message}")),
                "23503" => return Self::ForeignKeyViolation(format!("{constraint}: {message}")),
                "23514" => return Self::CheckViolation(format!("{constraint}: {message}")),
                "23502" => {
                    let column = db_err.column().unwrap_or("unknown");
                    return Self::NotNullViolation(format!("{column}: {message}"));
                }
                _ => {}
            }

            // Class 08 (connection exception) and 28 (invalid authorization).
            if code.starts_with("08") || code.starts_with("28") {
                return Self::Connection(format!("{code}: {message}"));
            }
            return Self::Statement(err);
        }

        if err.is_closed() {
            return Self::Connection(err.to_string());
        }
        Self::Statement(err)
    }
}

impl From<deadpool_postgres::PoolError> for RepoError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        match err {
            deadpool_postgres::PoolError::Backend(e) => Self::from_db_error(e),
            other => Self::Pool(other.to_string()),
        }
    }
}
