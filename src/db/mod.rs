pub mod sqlite;

pub use sqlite::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Corrupt JSON in column {column}: {reason}")]
    CorruptJson { column: &'static str, reason: String },

    #[error("Corrupt timestamp in column {column}: {value}")]
    CorruptTimestamp { column: &'static str, value: String },
}

/// Parse an RFC 3339 text column into a UTC instant.
pub(crate) fn decode_timestamp(
    column: &'static str,
    raw: &str,
) -> Result<chrono::DateTime<chrono::Utc>, DatabaseError> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|_| DatabaseError::CorruptTimestamp {
            column,
            value: raw.into(),
        })
}

/// Parse a UTC epoch-millisecond column into an instant.
pub(crate) fn decode_millis(
    column: &'static str,
    ms: i64,
) -> Result<chrono::DateTime<chrono::Utc>, DatabaseError> {
    chrono::DateTime::from_timestamp_millis(ms).ok_or(DatabaseError::CorruptTimestamp {
        column,
        value: ms.to_string(),
    })
}

/// Parse a `YYYY-MM-DD` text column.
pub(crate) fn decode_date(
    column: &'static str,
    raw: &str,
) -> Result<chrono::NaiveDate, DatabaseError> {
    chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        DatabaseError::CorruptTimestamp {
            column,
            value: raw.into(),
        }
    })
}

/// Decode a JSON text column into its typed document.
pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(
    column: &'static str,
    raw: &str,
) -> Result<T, DatabaseError> {
    serde_json::from_str(raw).map_err(|e| DatabaseError::CorruptJson {
        column,
        reason: e.to_string(),
    })
}

/// Encode a typed document for a JSON text column.
pub(crate) fn encode_json<T: serde::Serialize>(
    column: &'static str,
    value: &T,
) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::CorruptJson {
        column,
        reason: e.to_string(),
    })
}
