//! Transport-agnostic engine state.
//!
//! `CoreState` is shared as `Arc<CoreState>` by the HTTP layer and the
//! reminder worker. It serializes database access through one connection,
//! owns the slot cache and announces changes through the injected sink.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;

use crate::availability::{
    self, expand_slots, local_instant, parse_iso_date, parse_timezone, subtract_booked,
    therapist_timezone, InMemorySlotCache, SlotCache, SlotCacheKey,
};
use crate::calendar::{self, TimeInterval};
use crate::config::EngineConfig;
use crate::db;
use crate::error::SchedulingError;
use crate::models::{
    AvailabilityException, AvailableSlot, CalendarEvent, CalendarEventPatch, DaySchedule,
    EventOccurrence, NewCalendarEvent, PreferencesPatch, Reminder, ReminderChannel, SessionType,
    SyncConfig, SyncDirection, SyncProvider, WeeklyTemplate,
};
use crate::notify::{MessageSink, Notification};
use crate::reminders;

pub struct CoreState {
    conn: Mutex<Connection>,
    slot_cache: Arc<dyn SlotCache>,
    sink: Arc<dyn MessageSink>,
    config: EngineConfig,
}

impl CoreState {
    /// State over an already-migrated connection, with an in-memory slot cache.
    pub fn new(conn: Connection, config: EngineConfig, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            conn: Mutex::new(conn),
            slot_cache: Arc::new(InMemorySlotCache::new()),
            sink,
            config,
        }
    }

    /// Replace the slot cache (e.g. with a shared one).
    pub fn with_slot_cache(mut self, cache: Arc<dyn SlotCache>) -> Self {
        self.slot_cache = cache;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sink(&self) -> &Arc<dyn MessageSink> {
        &self.sink
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn.lock().map_err(|_| CoreError::LockPoisoned)
    }

    /// Database reachability check for health probes.
    pub fn ping(&self) -> Result<i64, CoreError> {
        let conn = self.conn()?;
        Ok(db::schema_version(&conn)?)
    }

    // ── Availability ────────────────────────────────────────

    fn availability_changed(&self, template: &WeeklyTemplate) {
        let dropped = self.slot_cache.invalidate_therapist(&template.therapist_id);
        tracing::debug!(
            therapist_id = %template.therapist_id,
            dropped,
            "Slot cache invalidated"
        );
        self.sink.publish(Notification::AvailabilityChanged {
            therapist_id: template.therapist_id.clone(),
            version: template.version,
        });
    }

    /// Create or replace a therapist's weekly template.
    pub fn set_availability(
        &self,
        therapist_id: &str,
        weekly_schedule: &[DaySchedule],
        preferences: Option<&PreferencesPatch>,
    ) -> Result<WeeklyTemplate, CoreError> {
        let template = {
            let conn = self.conn()?;
            availability::set_weekly_schedule(&conn, therapist_id, weekly_schedule, preferences)?
        };
        self.availability_changed(&template);
        Ok(template)
    }

    pub fn get_availability(&self, therapist_id: &str) -> Result<WeeklyTemplate, CoreError> {
        let conn = self.conn()?;
        Ok(availability::get_template(&conn, therapist_id)?)
    }

    pub fn add_exception(
        &self,
        therapist_id: &str,
        exception: &AvailabilityException,
    ) -> Result<WeeklyTemplate, CoreError> {
        let template = {
            let conn = self.conn()?;
            availability::add_exception(&conn, therapist_id, exception)?
        };
        self.availability_changed(&template);
        Ok(template)
    }

    /// Free slots for the inclusive ISO date range, booked time removed.
    ///
    /// The template expansion is cached per `(therapist, start, end)`; the
    /// therapist's committed events are subtracted on every call, so new
    /// bookings show up without touching the cache.
    pub fn get_available_slots(
        &self,
        therapist_id: &str,
        start_iso: &str,
        end_iso: &str,
        session_type: Option<SessionType>,
    ) -> Result<Vec<AvailableSlot>, CoreError> {
        let start = parse_iso_date(start_iso)?;
        let end = parse_iso_date(end_iso)?;

        let conn = self.conn()?;
        let key = SlotCacheKey::new(therapist_id, start, end);
        let (slots, tz) = match self.slot_cache.get(&key) {
            Some(slots) => {
                tracing::debug!(therapist_id, %start, %end, "Slot cache hit");
                (slots, therapist_timezone(&conn, therapist_id)?)
            }
            None => {
                tracing::debug!(therapist_id, %start, %end, "Slot cache miss");
                let template = availability::get_template(&conn, therapist_id)?;
                let slots = expand_slots(&template, start, end, self.config.max_range_days)?;
                self.slot_cache
                    .put(key, slots.clone(), self.config.slot_cache_ttl());
                (slots, parse_timezone(&template.preferences.timezone)?)
            }
        };

        let window = day_window(&tz, start, end)?;
        let busy = calendar::busy_intervals(&conn, therapist_id, &window)?;
        drop(conn);

        let free = subtract_booked(slots, &tz, &busy)?;
        Ok(match session_type {
            Some(wanted) => free
                .into_iter()
                .filter(|slot| slot.session_type.accepts(wanted))
                .collect(),
            None => free,
        })
    }

    // ── Calendar ────────────────────────────────────────────

    pub fn create_event(
        &self,
        user_id: &str,
        new: &NewCalendarEvent,
    ) -> Result<CalendarEvent, CoreError> {
        let event = {
            let conn = self.conn()?;
            calendar::create_event(&conn, user_id, new)?
        };
        self.sink.publish(Notification::EventCreated {
            user_id: event.user_id.clone(),
            event_id: event.id.clone(),
            start: event.start,
            end: event.end,
        });
        Ok(event)
    }

    pub fn update_event(
        &self,
        event_id: &str,
        user_id: &str,
        patch: &CalendarEventPatch,
    ) -> Result<CalendarEvent, CoreError> {
        let event = {
            let conn = self.conn()?;
            calendar::update_event(&conn, event_id, user_id, patch)?
        };
        self.sink.publish(Notification::EventUpdated {
            user_id: event.user_id.clone(),
            event_id: event.id.clone(),
            start: event.start,
            end: event.end,
        });
        Ok(event)
    }

    pub fn get_event(&self, event_id: &str, user_id: &str) -> Result<CalendarEvent, CoreError> {
        let conn = self.conn()?;
        Ok(calendar::get_event(&conn, event_id, user_id)?)
    }

    pub fn list_events(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<EventOccurrence>, CoreError> {
        let window = TimeInterval::new(from, to)?;
        let conn = self.conn()?;
        Ok(calendar::list_events(&conn, user_id, &window)?)
    }

    // ── Reminders ───────────────────────────────────────────

    pub fn schedule_reminder(
        &self,
        appointment_id: &str,
        user_id: &str,
        channel: ReminderChannel,
        scheduled_for: DateTime<Utc>,
        metadata: serde_json::Value,
    ) -> Result<Reminder, CoreError> {
        let conn = self.conn()?;
        let reminder = reminders::schedule_reminder(
            &conn,
            appointment_id,
            user_id,
            channel,
            scheduled_for,
            metadata,
        )?;
        tracing::info!(
            reminder_id = %reminder.id,
            appointment_id,
            channel = channel.as_str(),
            "Reminder scheduled"
        );
        Ok(reminder)
    }

    pub fn due_reminders(&self) -> Result<Vec<Reminder>, CoreError> {
        self.due_reminders_at(Utc::now())
    }

    pub fn due_reminders_at(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>, CoreError> {
        let conn = self.conn()?;
        Ok(reminders::due_reminders_at(&conn, now)?)
    }

    pub fn mark_reminder_sent(&self, id: &str, at: DateTime<Utc>) -> Result<Reminder, CoreError> {
        let conn = self.conn()?;
        Ok(reminders::mark_sent(&conn, id, at)?)
    }

    pub fn mark_reminder_failed(&self, id: &str, reason: &str) -> Result<Reminder, CoreError> {
        let conn = self.conn()?;
        Ok(reminders::mark_failed(&conn, id, reason)?)
    }

    // ── External calendar links ─────────────────────────────

    pub fn upsert_sync_config(
        &self,
        therapist_id: &str,
        provider: SyncProvider,
        external_calendar_id: Option<&str>,
        direction: SyncDirection,
        enabled: bool,
    ) -> Result<SyncConfig, CoreError> {
        let conn = self.conn()?;
        Ok(calendar::upsert_sync_config(
            &conn,
            therapist_id,
            provider,
            external_calendar_id,
            direction,
            enabled,
        )?)
    }

    pub fn list_sync_configs(&self, therapist_id: &str) -> Result<Vec<SyncConfig>, CoreError> {
        let conn = self.conn()?;
        Ok(calendar::list_sync_configs(&conn, therapist_id)?)
    }

    pub fn mark_synced(
        &self,
        therapist_id: &str,
        provider: SyncProvider,
        at: DateTime<Utc>,
    ) -> Result<SyncConfig, CoreError> {
        let conn = self.conn()?;
        Ok(calendar::mark_synced(&conn, therapist_id, provider, at)?)
    }
}

/// Instants spanning local midnight of `start` to local midnight after `end`.
fn day_window(tz: &chrono_tz::Tz, start: NaiveDate, end: NaiveDate) -> Result<TimeInterval, SchedulingError> {
    let after_end = end
        .succ_opt()
        .ok_or_else(|| SchedulingError::validation(format!("date {end} is out of range")))?;
    TimeInterval::new(
        local_instant(tz, start, NaiveTime::MIN),
        local_instant(tz, after_end, NaiveTime::MIN),
    )
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error(transparent)]
    Scheduling(#[from] SchedulingError),
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
}
