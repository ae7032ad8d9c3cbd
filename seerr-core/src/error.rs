use thiserror::Error;
use uuid::Uuid;

use crate::domain::requests::RequestType;

#[derive(Error, Debug)]
pub enum SeerrError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    ActiveRequestExists(#[from] ActiveRequestExistsError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Raised when a create would produce a second active request for the same
/// media (or, for TV, the same episode).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("an active {request_type} request already exists for tmdb id {tmdb_id}")]
pub struct ActiveRequestExistsError {
    pub request_type: RequestType,
    pub tmdb_id: i64,
    /// Id of the request that holds the slot. `None` when the follow-up
    /// lookup failed or the conflicting row vanished in between.
    pub existing_request_id: Option<Uuid>,
}

impl SeerrError {
    /// HTTP status the route layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            SeerrError::ActiveRequestExists(_) | SeerrError::Conflict(_) => 409,
            SeerrError::NotFound(_) => 404,
            SeerrError::InvalidInput(_) => 400,
            SeerrError::Configuration(_)
            | SeerrError::Database(_)
            | SeerrError::Migration(_)
            | SeerrError::Serialization(_)
            | SeerrError::Internal(_) => 500,
        }
    }

    /// True for Postgres `23505 unique_violation`.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            SeerrError::Database(sqlx::Error::Database(db_err)) => {
                db_err.is_unique_violation()
            }
            _ => false,
        }
    }

    /// Postgres aborted the transaction to break a lock cycle (`40P01`).
    pub fn is_deadlock(&self) -> bool {
        match self {
            SeerrError::Database(sqlx::Error::Database(db_err)) => {
                db_err.code().as_deref() == Some("40P01")
            }
            _ => false,
        }
    }

    /// Name of the violated constraint, when the database reported one.
    pub fn constraint(&self) -> Option<&str> {
        match self {
            SeerrError::Database(sqlx::Error::Database(db_err)) => {
                db_err.constraint()
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SeerrError>;
