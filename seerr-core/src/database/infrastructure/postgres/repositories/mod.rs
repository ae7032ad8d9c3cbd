//! PostgreSQL-backed repository implementations.

pub mod approval_rules;
pub mod calendar;
pub mod credentials;
pub mod jellyfin;
pub mod jobs;
pub mod media;
pub mod notifications;
pub mod requests;
pub mod sessions;
pub mod settings;
pub mod users;

use std::str::FromStr;

use sqlx::postgres::PgRow;
use sqlx::{Decode, Postgres, Row, Type};

use crate::error::{Result, SeerrError};

/// Read one column, naming it in the error.
pub(crate) fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get(name).map_err(|e| {
        SeerrError::Internal(format!("Failed to read {name}: {e}"))
    })
}

/// Read a TEXT column holding one of our enum spellings.
pub(crate) fn parsed<T>(row: &PgRow, name: &str) -> Result<T>
where
    T: FromStr<Err = SeerrError>,
{
    let raw: String = column(row, name)?;
    raw.parse()
}

/// Turn a unique violation into [`SeerrError::Conflict`] with `message`;
/// other errors pass through.
pub(crate) fn conflict_on_unique(
    err: sqlx::Error,
    message: impl FnOnce() -> String,
) -> SeerrError {
    if is_unique_violation(&err) {
        SeerrError::Conflict(message())
    } else {
        SeerrError::Database(err)
    }
}

/// Turn a foreign key violation into [`SeerrError::NotFound`].
pub(crate) fn not_found_on_foreign_key(
    err: sqlx::Error,
    message: impl FnOnce() -> String,
) -> SeerrError {
    if is_foreign_key_violation(&err) {
        SeerrError::NotFound(message())
    } else {
        SeerrError::Database(err)
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}
