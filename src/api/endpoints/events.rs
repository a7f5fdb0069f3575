//! Calendar event endpoints, scoped to a user.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{CalendarEvent, CalendarEventPatch, EventOccurrence, NewCalendarEvent};

/// `POST /api/users/:id/events` — 409 with the clashing event ids on overlap.
pub async fn create(
    State(ctx): State<ApiContext>,
    Path(user_id): Path<String>,
    Json(new): Json<NewCalendarEvent>,
) -> Result<(StatusCode, Json<CalendarEvent>), ApiError> {
    let event = ctx.core.create_event(&user_id, &new)?;
    Ok((StatusCode::CREATED, Json(event)))
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub user_id: String,
    pub occurrences: Vec<EventOccurrence>,
}

pub async fn list(
    State(ctx): State<ApiContext>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    let occurrences = ctx.core.list_events(&user_id, query.from, query.to)?;
    Ok(Json(EventsResponse {
        user_id,
        occurrences,
    }))
}

pub async fn detail(
    State(ctx): State<ApiContext>,
    Path((user_id, event_id)): Path<(String, String)>,
) -> Result<Json<CalendarEvent>, ApiError> {
    Ok(Json(ctx.core.get_event(&event_id, &user_id)?))
}

pub async fn update(
    State(ctx): State<ApiContext>,
    Path((user_id, event_id)): Path<(String, String)>,
    Json(patch): Json<CalendarEventPatch>,
) -> Result<Json<CalendarEvent>, ApiError> {
    Ok(Json(ctx.core.update_event(&event_id, &user_id, &patch)?))
}
