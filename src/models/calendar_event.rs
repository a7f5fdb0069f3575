use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{DayOfWeek, EventType, LocationType, RecurrenceType, ReminderChannel, Visibility};

fn default_interval() -> u32 {
    1
}

fn default_timezone() -> String {
    "UTC".into()
}

fn default_visibility() -> Visibility {
    Visibility::Private
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    #[serde(rename = "type")]
    pub recurrence_type: RecurrenceType,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub days_of_week: Vec<DayOfWeek>,
    #[serde(default)]
    pub exclusion_dates: Vec<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLocation {
    #[serde(rename = "type")]
    pub location_type: LocationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
}

/// Reminder request attached to an event: notify `minutes_before` start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSpec {
    pub channel: ReminderChannel,
    pub minutes_before: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub user_id: String,
    pub event_type: EventType,
    pub title: String,
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub timezone: String,
    pub recurrence: Option<Recurrence>,
    pub location: Option<EventLocation>,
    pub visibility: Visibility,
    pub reminders: Vec<ReminderSpec>,
    pub appointment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCalendarEvent {
    pub event_type: EventType,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
    #[serde(default)]
    pub location: Option<EventLocation>,
    #[serde(default = "default_visibility")]
    pub visibility: Visibility,
    #[serde(default)]
    pub reminders: Vec<ReminderSpec>,
    #[serde(default)]
    pub appointment_id: Option<String>,
}

/// Partial update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarEventPatch {
    pub event_type: Option<EventType>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
    pub recurrence: Option<Recurrence>,
    pub location: Option<EventLocation>,
    pub visibility: Option<Visibility>,
}

impl CalendarEventPatch {
    pub fn changes_interval(&self) -> bool {
        self.start.is_some() || self.end.is_some()
    }
}

/// One concrete occurrence of a (possibly recurring) event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventOccurrence {
    pub event_id: String,
    pub title: String,
    pub event_type: EventType,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}
