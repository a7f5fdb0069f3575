//! Schedule store — persistence of weekly templates and date exceptions.
//!
//! One template row per therapist. Exceptions are keyed by
//! `(therapist_id, date)` so a second exception for the same date
//! replaces the first instead of piling up.

use chrono::Utc;
use chrono_tz::Tz;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use super::validation::{
    parse_timezone, validate_preferences, validate_slots, validate_weekly_schedule,
};
use crate::db::{decode_date, decode_json, decode_timestamp, encode_json, DatabaseError};
use crate::error::SchedulingError;
use crate::models::{
    AvailabilityException, DaySchedule, ExceptionType, Preferences, PreferencesPatch,
    SlotDefinition, WeeklyTemplate,
};

const ENTITY: &str = "AvailabilityTemplate";

struct TemplateRow {
    weekly_schedule: String,
    preferences: String,
    version: i64,
    created_at: String,
    updated_at: String,
}

fn read_template_row(
    conn: &Connection,
    therapist_id: &str,
) -> Result<Option<TemplateRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT weekly_schedule, preferences, version, created_at, updated_at
             FROM availability_templates WHERE therapist_id = ?1",
            params![therapist_id],
            |row| {
                Ok(TemplateRow {
                    weekly_schedule: row.get(0)?,
                    preferences: row.get(1)?,
                    version: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn fetch_exceptions(
    conn: &Connection,
    therapist_id: &str,
) -> Result<Vec<AvailabilityException>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT date, type, slots, reason
         FROM availability_exceptions
         WHERE therapist_id = ?1
         ORDER BY date ASC",
    )?;

    let rows = stmt.query_map(params![therapist_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;

    let mut exceptions = Vec::new();
    for row in rows {
        let (date, kind, slots, reason) = row?;
        exceptions.push(AvailabilityException {
            date: decode_date("availability_exceptions.date", &date)?,
            exception_type: kind.parse()?,
            slots: decode_json("availability_exceptions.slots", &slots)?,
            reason,
        });
    }
    Ok(exceptions)
}

/// Load a therapist's template with its exceptions, if one exists.
pub fn load_template(
    conn: &Connection,
    therapist_id: &str,
) -> Result<Option<WeeklyTemplate>, SchedulingError> {
    let Some(row) = read_template_row(conn, therapist_id)? else {
        return Ok(None);
    };

    Ok(Some(WeeklyTemplate {
        therapist_id: therapist_id.to_string(),
        weekly_schedule: decode_json("availability_templates.weekly_schedule", &row.weekly_schedule)?,
        preferences: decode_json("availability_templates.preferences", &row.preferences)?,
        exceptions: fetch_exceptions(conn, therapist_id)?,
        version: row.version,
        created_at: decode_timestamp("availability_templates.created_at", &row.created_at)?,
        updated_at: decode_timestamp("availability_templates.updated_at", &row.updated_at)?,
    }))
}

/// Load a therapist's template or fail with `NotFound`.
pub fn get_template(conn: &Connection, therapist_id: &str) -> Result<WeeklyTemplate, SchedulingError> {
    load_template(conn, therapist_id)?.ok_or_else(|| SchedulingError::NotFound {
        entity_type: ENTITY,
        id: therapist_id.to_string(),
    })
}

/// Timezone of a therapist's template without loading exceptions.
pub fn therapist_timezone(conn: &Connection, therapist_id: &str) -> Result<Tz, SchedulingError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT preferences FROM availability_templates WHERE therapist_id = ?1",
            params![therapist_id],
            |row| row.get(0),
        )
        .optional()?;
    let Some(raw) = raw else {
        return Err(SchedulingError::NotFound {
            entity_type: ENTITY,
            id: therapist_id.to_string(),
        });
    };
    let preferences: Preferences = decode_json("availability_templates.preferences", &raw)?;
    parse_timezone(&preferences.timezone)
}

/// Create the template if absent, otherwise replace the weekly schedule
/// wholesale and merge preferences field by field.
pub fn set_weekly_schedule(
    conn: &Connection,
    therapist_id: &str,
    weekly_schedule: &[DaySchedule],
    preferences: Option<&PreferencesPatch>,
) -> Result<WeeklyTemplate, SchedulingError> {
    validate_weekly_schedule(weekly_schedule)?;

    let now = Utc::now().to_rfc3339();
    let schedule_json = encode_json("availability_templates.weekly_schedule", &weekly_schedule)?;
    let empty_patch = PreferencesPatch::default();
    let patch = preferences.unwrap_or(&empty_patch);

    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    match read_template_row(&tx, therapist_id)? {
        None => {
            let prefs = Preferences::default().merged(patch);
            validate_preferences(&prefs)?;
            tx.execute(
                "INSERT INTO availability_templates
                 (therapist_id, weekly_schedule, preferences, version, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 1, ?4, ?4)",
                params![
                    therapist_id,
                    schedule_json,
                    encode_json("availability_templates.preferences", &prefs)?,
                    now,
                ],
            )?;
            tracing::info!(therapist_id, "Availability template created");
        }
        Some(existing) => {
            let stored: Preferences =
                decode_json("availability_templates.preferences", &existing.preferences)?;
            let prefs = stored.merged(patch);
            validate_preferences(&prefs)?;
            tx.execute(
                "UPDATE availability_templates
                 SET weekly_schedule = ?1, preferences = ?2, version = version + 1, updated_at = ?3
                 WHERE therapist_id = ?4",
                params![
                    schedule_json,
                    encode_json("availability_templates.preferences", &prefs)?,
                    now,
                    therapist_id,
                ],
            )?;
            tracing::info!(
                therapist_id,
                version = existing.version + 1,
                "Availability template replaced"
            );
        }
    }

    tx.commit()?;
    get_template(conn, therapist_id)
}

/// Record a date exception. A later exception for the same date replaces
/// the earlier one. `unavailable` exceptions carry no slots.
pub fn add_exception(
    conn: &Connection,
    therapist_id: &str,
    exception: &AvailabilityException,
) -> Result<WeeklyTemplate, SchedulingError> {
    let slots: &[SlotDefinition] = match exception.exception_type {
        ExceptionType::Modified => {
            validate_slots(&exception.slots)?;
            exception.slots.as_slice()
        }
        ExceptionType::Unavailable => {
            if !exception.slots.is_empty() {
                tracing::debug!(
                    therapist_id,
                    date = %exception.date,
                    "Ignoring slots on unavailable exception"
                );
            }
            &[]
        }
    };

    let now = Utc::now().to_rfc3339();
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    let bumped = tx.execute(
        "UPDATE availability_templates SET version = version + 1, updated_at = ?1
         WHERE therapist_id = ?2",
        params![now, therapist_id],
    )?;
    if bumped == 0 {
        return Err(SchedulingError::NotFound {
            entity_type: ENTITY,
            id: therapist_id.to_string(),
        });
    }

    tx.execute(
        "INSERT INTO availability_exceptions (therapist_id, date, type, slots, reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(therapist_id, date) DO UPDATE SET
             type = excluded.type,
             slots = excluded.slots,
             reason = excluded.reason,
             created_at = excluded.created_at",
        params![
            therapist_id,
            exception.date.format("%Y-%m-%d").to_string(),
            exception.exception_type.as_str(),
            encode_json("availability_exceptions.slots", &slots)?,
            exception.reason,
            now,
        ],
    )?;

    tx.commit()?;
    tracing::info!(
        therapist_id,
        date = %exception.date,
        kind = exception.exception_type.as_str(),
        "Availability exception recorded"
    );
    get_template(conn, therapist_id)
}
