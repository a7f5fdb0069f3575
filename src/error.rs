//! Domain errors surfaced by schedule, calendar and reminder operations.

use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The proposed interval overlaps these committed events.
    #[error("Interval conflicts with existing events: {}", event_ids.join(", "))]
    Conflict { event_ids: Vec<String> },

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for SchedulingError {
    fn from(err: rusqlite::Error) -> Self {
        SchedulingError::Database(DatabaseError::Sqlite(err))
    }
}

impl SchedulingError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        SchedulingError::Validation(msg.into())
    }
}
