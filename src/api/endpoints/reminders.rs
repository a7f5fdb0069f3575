//! Reminder endpoints for external schedulers and delivery workers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{Reminder, ReminderChannel};

#[derive(Deserialize)]
pub struct ScheduleReminderRequest {
    pub appointment_id: String,
    pub user_id: String,
    pub channel: ReminderChannel,
    pub scheduled_for: DateTime<Utc>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// `POST /api/reminders`
pub async fn schedule(
    State(ctx): State<ApiContext>,
    Json(request): Json<ScheduleReminderRequest>,
) -> Result<(StatusCode, Json<Reminder>), ApiError> {
    let reminder = ctx.core.schedule_reminder(
        &request.appointment_id,
        &request.user_id,
        request.channel,
        request.scheduled_for,
        request.metadata,
    )?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

/// `GET /api/reminders/due` — pending reminders due now.
pub async fn due(State(ctx): State<ApiContext>) -> Result<Json<Vec<Reminder>>, ApiError> {
    Ok(Json(ctx.core.due_reminders()?))
}
