//! Calendar event CRUD.
//!
//! Creation and interval-changing updates run the overlap check and the
//! write inside one `BEGIN IMMEDIATE` transaction, so two writers cannot
//! both pass the check for the same slot.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use uuid::Uuid;

use super::conflict::ensure_no_conflict;
use super::interval::TimeInterval;
use super::recurrence::occurrences;
use crate::availability::parse_timezone;
use crate::db::{decode_json, decode_millis, decode_timestamp, encode_json, DatabaseError};
use crate::error::SchedulingError;
use crate::models::{
    CalendarEvent, CalendarEventPatch, EventOccurrence, NewCalendarEvent, Recurrence, ReminderSpec,
};
use crate::reminders::schedule_reminder;

/// Longest reminder lead time accepted: 30 days.
pub const MAX_REMINDER_LEAD_MINUTES: u32 = 30 * 24 * 60;

pub(crate) const EVENT_COLUMNS: &str = "id, user_id, event_type, title, description, start_ms, end_ms,
     timezone, recurrence, location, visibility, reminders, appointment_id, created_at, updated_at";

/// Raw column values; decoded outside the rusqlite row closure.
pub(crate) struct EventRow {
    id: String,
    user_id: String,
    event_type: String,
    title: String,
    description: Option<String>,
    start_ms: i64,
    end_ms: i64,
    timezone: String,
    recurrence: Option<String>,
    location: Option<String>,
    visibility: String,
    reminders: String,
    appointment_id: Option<String>,
    created_at: String,
    updated_at: String,
}

pub(crate) fn event_from_row(row: &Row<'_>) -> rusqlite::Result<EventRow> {
    Ok(EventRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        event_type: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        start_ms: row.get(5)?,
        end_ms: row.get(6)?,
        timezone: row.get(7)?,
        recurrence: row.get(8)?,
        location: row.get(9)?,
        visibility: row.get(10)?,
        reminders: row.get(11)?,
        appointment_id: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

impl EventRow {
    pub(crate) fn into_event(self) -> Result<CalendarEvent, DatabaseError> {
        Ok(CalendarEvent {
            event_type: self.event_type.parse()?,
            title: self.title,
            description: self.description,
            start: decode_millis("calendar_events.start_ms", self.start_ms)?,
            end: decode_millis("calendar_events.end_ms", self.end_ms)?,
            timezone: self.timezone,
            recurrence: self
                .recurrence
                .as_deref()
                .map(|raw| decode_json("calendar_events.recurrence", raw))
                .transpose()?,
            location: self
                .location
                .as_deref()
                .map(|raw| decode_json("calendar_events.location", raw))
                .transpose()?,
            visibility: self.visibility.parse()?,
            reminders: decode_json("calendar_events.reminders", &self.reminders)?,
            appointment_id: self.appointment_id,
            created_at: decode_timestamp("calendar_events.created_at", &self.created_at)?,
            updated_at: decode_timestamp("calendar_events.updated_at", &self.updated_at)?,
            id: self.id,
            user_id: self.user_id,
        })
    }
}

fn validate_event(
    title: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    timezone: &str,
    recurrence: Option<&Recurrence>,
) -> Result<TimeInterval, SchedulingError> {
    if title.trim().is_empty() {
        return Err(SchedulingError::validation("event title must not be empty"));
    }
    parse_timezone(timezone)?;
    if let Some(rule) = recurrence {
        if rule.interval == 0 {
            return Err(SchedulingError::validation("recurrence interval must be at least 1"));
        }
        if let Some(end_date) = rule.end_date {
            if end_date < start.date_naive() {
                return Err(SchedulingError::validation(
                    "recurrence end date precedes the event start",
                ));
            }
        }
    }
    TimeInterval::new(start, end)
}

fn validate_reminder_specs(specs: &[ReminderSpec]) -> Result<(), SchedulingError> {
    match specs.iter().find(|s| s.minutes_before > MAX_REMINDER_LEAD_MINUTES) {
        Some(reminder) => Err(SchedulingError::validation(format!(
            "reminder lead time {} minutes exceeds {MAX_REMINDER_LEAD_MINUTES}",
            reminder.minutes_before
        ))),
        None => Ok(()),
    }
}

fn encode_optional<T: serde::Serialize>(
    column: &'static str,
    value: Option<&T>,
) -> Result<Option<String>, DatabaseError> {
    value.map(|v| encode_json(column, v)).transpose()
}

/// Create an event for `user_id`, rejecting any overlap with the user's
/// existing events, and enqueue one pending reminder per configured lead time.
pub fn create_event(
    conn: &Connection,
    user_id: &str,
    new: &NewCalendarEvent,
) -> Result<CalendarEvent, SchedulingError> {
    let interval = validate_event(
        &new.title,
        new.start,
        new.end,
        &new.timezone,
        new.recurrence.as_ref(),
    )?;
    validate_reminder_specs(&new.reminders)?;

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    ensure_no_conflict(&tx, user_id, &interval, None)?;

    tx.execute(
        "INSERT INTO calendar_events
         (id, user_id, event_type, title, description, start_ms, end_ms, timezone,
          recurrence, location, visibility, reminders, appointment_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
        params![
            id,
            user_id,
            new.event_type.as_str(),
            new.title,
            new.description,
            interval.start_ms(),
            interval.end_ms(),
            new.timezone,
            encode_optional("calendar_events.recurrence", new.recurrence.as_ref())?,
            encode_optional("calendar_events.location", new.location.as_ref())?,
            new.visibility.as_str(),
            encode_json("calendar_events.reminders", &new.reminders)?,
            new.appointment_id,
            now,
        ],
    )?;

    let appointment_ref = new.appointment_id.as_deref().unwrap_or(&id);
    for reminder in &new.reminders {
        schedule_reminder(
            &tx,
            appointment_ref,
            user_id,
            reminder.channel,
            new.start - Duration::minutes(i64::from(reminder.minutes_before)),
            serde_json::json!({
                "template": "event_reminder",
                "event_id": id,
                "title": new.title,
                "minutes_before": reminder.minutes_before,
            }),
        )?;
    }

    tx.commit()?;
    tracing::info!(
        user_id,
        event_id = %id,
        event_type = new.event_type.as_str(),
        reminders = new.reminders.len(),
        "Calendar event created"
    );
    get_event(conn, &id, user_id)
}

/// Fetch one of the user's events. Events of other users are `NotFound`.
pub fn get_event(conn: &Connection, event_id: &str, user_id: &str) -> Result<CalendarEvent, SchedulingError> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM calendar_events WHERE id = ?1 AND user_id = ?2");
    let row = conn
        .query_row(&sql, params![event_id, user_id], event_from_row)
        .optional()?;
    match row {
        Some(row) => Ok(row.into_event()?),
        None => Err(SchedulingError::NotFound {
            entity_type: "CalendarEvent",
            id: event_id.to_string(),
        }),
    }
}

/// Apply a partial update. When start or end changes, the prospective
/// interval is checked against the user's other events. Absent patch
/// fields keep their stored values; reminders are left as created.
pub fn update_event(
    conn: &Connection,
    event_id: &str,
    user_id: &str,
    patch: &CalendarEventPatch,
) -> Result<CalendarEvent, SchedulingError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let current = get_event(&tx, event_id, user_id)?;

    let title = patch.title.as_ref().unwrap_or(&current.title);
    let timezone = patch.timezone.as_ref().unwrap_or(&current.timezone);
    let recurrence = patch.recurrence.as_ref().or(current.recurrence.as_ref());
    let interval = validate_event(
        title,
        patch.start.unwrap_or(current.start),
        patch.end.unwrap_or(current.end),
        timezone,
        recurrence,
    )?;

    if patch.changes_interval() {
        ensure_no_conflict(&tx, user_id, &interval, Some(event_id))?;
    }

    tx.execute(
        "UPDATE calendar_events SET
             event_type = ?1, title = ?2, description = ?3, start_ms = ?4, end_ms = ?5,
             timezone = ?6, recurrence = ?7, location = ?8, visibility = ?9, updated_at = ?10
         WHERE id = ?11 AND user_id = ?12",
        params![
            patch.event_type.unwrap_or(current.event_type).as_str(),
            title,
            patch.description.as_ref().or(current.description.as_ref()),
            interval.start_ms(),
            interval.end_ms(),
            timezone,
            encode_optional("calendar_events.recurrence", recurrence)?,
            encode_optional(
                "calendar_events.location",
                patch.location.as_ref().or(current.location.as_ref()),
            )?,
            patch.visibility.unwrap_or(current.visibility).as_str(),
            Utc::now().to_rfc3339(),
            event_id,
            user_id,
        ],
    )?;

    tx.commit()?;
    tracing::info!(
        user_id,
        event_id,
        rescheduled = patch.changes_interval(),
        "Calendar event updated"
    );
    get_event(conn, event_id, user_id)
}

/// Concrete occurrences of the user's events overlapping `window`,
/// recurring events expanded, ordered by start.
pub fn list_events(
    conn: &Connection,
    user_id: &str,
    window: &TimeInterval,
) -> Result<Vec<EventOccurrence>, SchedulingError> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM calendar_events
         WHERE user_id = ?1
           AND ((recurrence IS NULL AND start_ms < ?2 AND end_ms > ?3)
                OR (recurrence IS NOT NULL AND start_ms < ?2))
         ORDER BY start_ms ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![user_id, window.end_ms(), window.start_ms()],
        event_from_row,
    )?;

    let mut found = Vec::new();
    for row in rows {
        let event = row?.into_event()?;
        found.extend(occurrences(&event, window));
    }
    found.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.event_id.cmp(&b.event_id)));
    Ok(found)
}

/// Time the user is committed elsewhere inside `window`.
pub fn busy_intervals(
    conn: &Connection,
    user_id: &str,
    window: &TimeInterval,
) -> Result<Vec<TimeInterval>, SchedulingError> {
    Ok(list_events(conn, user_id, window)?
        .into_iter()
        .map(|o| TimeInterval {
            start: o.start,
            end: o.end,
        })
        .collect())
}
