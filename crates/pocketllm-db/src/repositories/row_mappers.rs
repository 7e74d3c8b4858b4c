//! Row mapping helpers for `SQLite` queries.
//!
//! Records are stored as JSON bodies next to a few indexed columns; these
//! helpers convert between the two and map driver errors into
//! `RepositoryError`.

use chrono::{DateTime, SecondsFormat, Utc};
use pocketllm_core::RepositoryError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

/// Map a driver error into the port's error type.
///
/// A primary-key or unique violation means a concurrent writer got there
/// first (for example two versions racing for the same `seq`).
pub fn storage(e: &sqlx::Error) -> RepositoryError {
    match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::AlreadyExists(db.message().to_string())
        }
        _ => RepositoryError::Storage(e.to_string()),
    }
}

/// Serialize a record body.
pub fn to_body<T: Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

/// Deserialize the `body` column of a row.
pub fn from_body<T: DeserializeOwned>(row: &SqliteRow) -> Result<T, RepositoryError> {
    let json: String = row.try_get("body").map_err(|e| storage(&e))?;
    serde_json::from_str(&json).map_err(|e| RepositoryError::Serialization(e.to_string()))
}

/// Timestamp format that sorts lexicographically.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a timestamp written by `format_timestamp`.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Serialization(format!("bad timestamp {value:?}: {e}")))
}
