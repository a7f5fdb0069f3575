use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{SyncDirection, SyncProvider};

/// Link between a therapist and an external calendar provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub therapist_id: String,
    pub provider: SyncProvider,
    pub external_calendar_id: Option<String>,
    pub direction: SyncDirection,
    pub enabled: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}
