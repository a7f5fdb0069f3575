//! External calendar links. Only the configuration is stored here; the
//! provider exchange itself happens outside the engine.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{decode_timestamp, DatabaseError};
use crate::error::SchedulingError;
use crate::models::{SyncConfig, SyncDirection, SyncProvider};

const SYNC_COLUMNS: &str =
    "therapist_id, provider, external_calendar_id, direction, enabled, last_synced_at";

fn sync_from_row(
    row: &rusqlite::Row<'_>,
) -> rusqlite::Result<(String, String, Option<String>, String, bool, Option<String>)> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_config(
    (therapist_id, provider, external_calendar_id, direction, enabled, last_synced_at): (
        String,
        String,
        Option<String>,
        String,
        bool,
        Option<String>,
    ),
) -> Result<SyncConfig, DatabaseError> {
    Ok(SyncConfig {
        therapist_id,
        provider: provider.parse()?,
        external_calendar_id,
        direction: direction.parse()?,
        enabled,
        last_synced_at: last_synced_at
            .as_deref()
            .map(|raw| decode_timestamp("sync_configs.last_synced_at", raw))
            .transpose()?,
    })
}

/// Create or replace the therapist's link to `provider`. The last sync
/// time survives a replace.
pub fn upsert_sync_config(
    conn: &Connection,
    therapist_id: &str,
    provider: SyncProvider,
    external_calendar_id: Option<&str>,
    direction: SyncDirection,
    enabled: bool,
) -> Result<SyncConfig, SchedulingError> {
    if therapist_id.trim().is_empty() {
        return Err(SchedulingError::validation("therapist id must not be empty"));
    }
    conn.execute(
        "INSERT INTO sync_configs (therapist_id, provider, external_calendar_id, direction, enabled)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(therapist_id, provider) DO UPDATE SET
             external_calendar_id = excluded.external_calendar_id,
             direction = excluded.direction,
             enabled = excluded.enabled",
        params![
            therapist_id,
            provider.as_str(),
            external_calendar_id,
            direction.as_str(),
            enabled
        ],
    )?;
    tracing::info!(therapist_id, provider = provider.as_str(), enabled, "Sync config saved");
    get_sync_config(conn, therapist_id, provider)
}

pub fn get_sync_config(
    conn: &Connection,
    therapist_id: &str,
    provider: SyncProvider,
) -> Result<SyncConfig, SchedulingError> {
    let sql = format!("SELECT {SYNC_COLUMNS} FROM sync_configs WHERE therapist_id = ?1 AND provider = ?2");
    let row = conn
        .query_row(&sql, params![therapist_id, provider.as_str()], sync_from_row)
        .optional()?;
    match row {
        Some(raw) => Ok(into_config(raw)?),
        None => Err(SchedulingError::NotFound {
            entity_type: "SyncConfig",
            id: format!("{therapist_id}/{provider}"),
        }),
    }
}

pub fn list_sync_configs(conn: &Connection, therapist_id: &str) -> Result<Vec<SyncConfig>, SchedulingError> {
    let sql = format!("SELECT {SYNC_COLUMNS} FROM sync_configs WHERE therapist_id = ?1 ORDER BY provider ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![therapist_id], sync_from_row)?;

    let mut configs = Vec::new();
    for row in rows {
        configs.push(into_config(row?)?);
    }
    Ok(configs)
}

/// Record a completed exchange with the provider.
pub fn mark_synced(
    conn: &Connection,
    therapist_id: &str,
    provider: SyncProvider,
    at: DateTime<Utc>,
) -> Result<SyncConfig, SchedulingError> {
    let current = get_sync_config(conn, therapist_id, provider)?;
    if !current.enabled {
        return Err(SchedulingError::validation(format!(
            "sync with {provider} is disabled for {therapist_id}"
        )));
    }
    conn.execute(
        "UPDATE sync_configs SET last_synced_at = ?1 WHERE therapist_id = ?2 AND provider = ?3",
        params![at.to_rfc3339(), therapist_id, provider.as_str()],
    )?;
    get_sync_config(conn, therapist_id, provider)
}
