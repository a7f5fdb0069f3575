use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{ReminderChannel, ReminderStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub appointment_id: String,
    pub user_id: String,
    pub channel: ReminderChannel,
    pub status: ReminderStatus,
    pub scheduled_for: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    /// Template name and variables for the delivery worker.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
