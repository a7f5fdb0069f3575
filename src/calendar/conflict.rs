//! Conflict detection — one event per instant per user.
//!
//! Overlap is half-open: `existing.start < proposed.end AND
//! existing.end > proposed.start`. Touching events do not conflict.

use rusqlite::{params, Connection};

use super::events::{event_from_row, EVENT_COLUMNS};
use super::interval::TimeInterval;
use crate::error::SchedulingError;
use crate::models::CalendarEvent;

/// All of the user's events overlapping `interval`, ordered by start.
/// `exclude_event_id` leaves one event out (the one being updated).
pub fn find_overlapping(
    conn: &Connection,
    user_id: &str,
    interval: &TimeInterval,
    exclude_event_id: Option<&str>,
) -> Result<Vec<CalendarEvent>, SchedulingError> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM calendar_events
         WHERE user_id = ?1 AND start_ms < ?2 AND end_ms > ?3
           AND (?4 IS NULL OR id != ?4)
         ORDER BY start_ms ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![user_id, interval.end_ms(), interval.start_ms(), exclude_event_id],
        event_from_row,
    )?;

    let mut events = Vec::new();
    for row in rows {
        events.push(row?.into_event()?);
    }
    Ok(events)
}

/// Fail with `Conflict` naming every overlapping event.
pub fn ensure_no_conflict(
    conn: &Connection,
    user_id: &str,
    interval: &TimeInterval,
    exclude_event_id: Option<&str>,
) -> Result<(), SchedulingError> {
    let overlapping = find_overlapping(conn, user_id, interval, exclude_event_id)?;
    if overlapping.is_empty() {
        return Ok(());
    }
    let event_ids: Vec<String> = overlapping.into_iter().map(|e| e.id).collect();
    tracing::info!(
        user_id,
        conflicts = event_ids.len(),
        "Rejected interval overlapping existing events"
    );
    Err(SchedulingError::Conflict { event_ids })
}
