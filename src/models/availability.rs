use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{DayOfWeek, ExceptionType, SessionType};

fn default_available() -> bool {
    true
}

fn default_session_type() -> SessionType {
    SessionType::Both
}

/// One declared window inside a day, `HH:MM` 24h wall-clock times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotDefinition {
    pub start_time: String,
    pub end_time: String,
    #[serde(default = "default_available")]
    pub is_available: bool,
    #[serde(default = "default_session_type")]
    pub session_type: SessionType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day: DayOfWeek,
    #[serde(default)]
    pub slots: Vec<SlotDefinition>,
}

/// Therapist scheduling preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub session_duration_minutes: u32,
    pub break_duration_minutes: u32,
    pub max_daily_hours: u32,
    pub timezone: String,
    pub auto_confirm: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            session_duration_minutes: 60,
            break_duration_minutes: 15,
            max_daily_hours: 8,
            timezone: "UTC".into(),
            auto_confirm: false,
        }
    }
}

/// Partial preferences update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesPatch {
    pub session_duration_minutes: Option<u32>,
    pub break_duration_minutes: Option<u32>,
    pub max_daily_hours: Option<u32>,
    pub timezone: Option<String>,
    pub auto_confirm: Option<bool>,
}

impl Preferences {
    /// Field-by-field merge of a patch into the stored preferences.
    pub fn merged(&self, patch: &PreferencesPatch) -> Preferences {
        Preferences {
            session_duration_minutes: patch
                .session_duration_minutes
                .unwrap_or(self.session_duration_minutes),
            break_duration_minutes: patch
                .break_duration_minutes
                .unwrap_or(self.break_duration_minutes),
            max_daily_hours: patch.max_daily_hours.unwrap_or(self.max_daily_hours),
            timezone: patch.timezone.clone().unwrap_or_else(|| self.timezone.clone()),
            auto_confirm: patch.auto_confirm.unwrap_or(self.auto_confirm),
        }
    }
}

/// Date-specific override of the weekly template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityException {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub exception_type: ExceptionType,
    #[serde(default)]
    pub slots: Vec<SlotDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A therapist's weekly availability plus its date exceptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyTemplate {
    pub therapist_id: String,
    pub weekly_schedule: Vec<DaySchedule>,
    pub preferences: Preferences,
    /// Sorted by date, at most one per date.
    pub exceptions: Vec<AvailabilityException>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WeeklyTemplate {
    /// Schedule for a weekday. When the day is listed more than once the
    /// last entry applies.
    pub fn day_schedule(&self, day: DayOfWeek) -> Option<&DaySchedule> {
        self.weekly_schedule.iter().rev().find(|d| d.day == day)
    }

    pub fn exception_on(&self, date: NaiveDate) -> Option<&AvailabilityException> {
        self.exceptions
            .binary_search_by(|e| e.date.cmp(&date))
            .ok()
            .map(|i| &self.exceptions[i])
    }
}

/// A concrete bookable window produced by slot expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableSlot {
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub session_type: SessionType,
}
