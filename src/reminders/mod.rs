//! Reminder scheduler — persisted reminder rows and the due-now query.
//!
//! Status moves `pending → sent` or `pending → failed` and stops there.
//! Retries belong to whoever delivers.

mod worker;

pub use worker::*;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::{decode_json, decode_millis, decode_timestamp, encode_json, DatabaseError};
use crate::error::SchedulingError;
use crate::models::{Reminder, ReminderChannel, ReminderStatus};

const REMINDER_COLUMNS: &str = "id, appointment_id, user_id, channel, status, scheduled_for_ms,
     sent_at, failure_reason, metadata, created_at";

struct ReminderRow {
    id: String,
    appointment_id: String,
    user_id: String,
    channel: String,
    status: String,
    scheduled_for_ms: i64,
    sent_at: Option<String>,
    failure_reason: Option<String>,
    metadata: String,
    created_at: String,
}

fn reminder_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReminderRow> {
    Ok(ReminderRow {
        id: row.get(0)?,
        appointment_id: row.get(1)?,
        user_id: row.get(2)?,
        channel: row.get(3)?,
        status: row.get(4)?,
        scheduled_for_ms: row.get(5)?,
        sent_at: row.get(6)?,
        failure_reason: row.get(7)?,
        metadata: row.get(8)?,
        created_at: row.get(9)?,
    })
}

impl ReminderRow {
    fn into_reminder(self) -> Result<Reminder, DatabaseError> {
        Ok(Reminder {
            channel: self.channel.parse()?,
            status: self.status.parse()?,
            scheduled_for: decode_millis("reminders.scheduled_for_ms", self.scheduled_for_ms)?,
            sent_at: self
                .sent_at
                .as_deref()
                .map(|raw| decode_timestamp("reminders.sent_at", raw))
                .transpose()?,
            failure_reason: self.failure_reason,
            metadata: decode_json("reminders.metadata", &self.metadata)?,
            created_at: decode_timestamp("reminders.created_at", &self.created_at)?,
            id: self.id,
            appointment_id: self.appointment_id,
            user_id: self.user_id,
        })
    }
}

fn collect(
    conn: &Connection,
    filter: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<Reminder>, SchedulingError> {
    let sql = format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE {filter}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(args, reminder_from_row)?;

    let mut reminders = Vec::new();
    for row in rows {
        reminders.push(row?.into_reminder()?);
    }
    Ok(reminders)
}

/// Enqueue a pending reminder. `scheduled_for` may lie in the past; such a
/// reminder is simply due at once.
pub fn schedule_reminder(
    conn: &Connection,
    appointment_id: &str,
    user_id: &str,
    channel: ReminderChannel,
    scheduled_for: DateTime<Utc>,
    metadata: serde_json::Value,
) -> Result<Reminder, SchedulingError> {
    if appointment_id.trim().is_empty() || user_id.trim().is_empty() {
        return Err(SchedulingError::validation(
            "reminder needs an appointment id and a user id",
        ));
    }
    let metadata = if metadata.is_null() {
        serde_json::json!({})
    } else {
        metadata
    };

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO reminders
         (id, appointment_id, user_id, channel, status, scheduled_for_ms, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            id,
            appointment_id,
            user_id,
            channel.as_str(),
            ReminderStatus::Pending.as_str(),
            scheduled_for.timestamp_millis(),
            encode_json("reminders.metadata", &metadata)?,
            Utc::now().to_rfc3339(),
        ],
    )?;
    tracing::debug!(
        reminder_id = %id,
        appointment_id,
        channel = channel.as_str(),
        scheduled_for = %scheduled_for,
        "Reminder scheduled"
    );
    get_reminder(conn, &id)
}

pub fn get_reminder(conn: &Connection, id: &str) -> Result<Reminder, SchedulingError> {
    let sql = format!("SELECT {REMINDER_COLUMNS} FROM reminders WHERE id = ?1");
    let row = conn.query_row(&sql, params![id], reminder_from_row).optional()?;
    match row {
        Some(row) => Ok(row.into_reminder()?),
        None => Err(SchedulingError::NotFound {
            entity_type: "Reminder",
            id: id.to_string(),
        }),
    }
}

/// Pending reminders with `scheduled_for <= now`, oldest first.
pub fn due_reminders_at(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<Reminder>, SchedulingError> {
    collect(
        conn,
        "status = 'pending' AND scheduled_for_ms <= ?1 ORDER BY scheduled_for_ms ASC, id ASC",
        params![now.timestamp_millis()],
    )
}

pub fn due_reminders(conn: &Connection) -> Result<Vec<Reminder>, SchedulingError> {
    due_reminders_at(conn, Utc::now())
}

pub fn reminders_for_appointment(
    conn: &Connection,
    appointment_id: &str,
) -> Result<Vec<Reminder>, SchedulingError> {
    collect(
        conn,
        "appointment_id = ?1 ORDER BY scheduled_for_ms ASC, id ASC",
        params![appointment_id],
    )
}

fn ensure_pending(reminder: &Reminder, to: ReminderStatus) -> Result<(), SchedulingError> {
    if reminder.status == ReminderStatus::Pending {
        Ok(())
    } else {
        Err(SchedulingError::InvalidTransition {
            from: reminder.status.as_str(),
            to: to.as_str(),
        })
    }
}

/// `pending → sent`.
pub fn mark_sent(conn: &Connection, id: &str, at: DateTime<Utc>) -> Result<Reminder, SchedulingError> {
    let reminder = get_reminder(conn, id)?;
    ensure_pending(&reminder, ReminderStatus::Sent)?;
    conn.execute(
        "UPDATE reminders SET status = 'sent', sent_at = ?1 WHERE id = ?2 AND status = 'pending'",
        params![at.to_rfc3339(), id],
    )?;
    get_reminder(conn, id)
}

/// `pending → failed`, keeping the reason for the delivery worker's logs.
pub fn mark_failed(conn: &Connection, id: &str, reason: &str) -> Result<Reminder, SchedulingError> {
    let reminder = get_reminder(conn, id)?;
    ensure_pending(&reminder, ReminderStatus::Failed)?;
    conn.execute(
        "UPDATE reminders SET status = 'failed', failure_reason = ?1 WHERE id = ?2 AND status = 'pending'",
        params![reason, id],
    )?;
    get_reminder(conn, id)
}
