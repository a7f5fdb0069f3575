//! Therapist availability endpoints.
//!
//! - `GET /api/therapists/:id/availability` — weekly template + exceptions
//! - `PUT /api/therapists/:id/availability` — replace weekly schedule
//! - `POST /api/therapists/:id/exceptions` — add or replace a date exception
//! - `GET /api/therapists/:id/slots` — free slots for a date range

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{
    AvailabilityException, AvailableSlot, DaySchedule, PreferencesPatch, SessionType,
    WeeklyTemplate,
};

#[derive(Deserialize)]
pub struct SetAvailabilityRequest {
    pub weekly_schedule: Vec<DaySchedule>,
    #[serde(default)]
    pub preferences: Option<PreferencesPatch>,
}

pub async fn get(
    State(ctx): State<ApiContext>,
    Path(therapist_id): Path<String>,
) -> Result<Json<WeeklyTemplate>, ApiError> {
    Ok(Json(ctx.core.get_availability(&therapist_id)?))
}

pub async fn set(
    State(ctx): State<ApiContext>,
    Path(therapist_id): Path<String>,
    Json(request): Json<SetAvailabilityRequest>,
) -> Result<Json<WeeklyTemplate>, ApiError> {
    let template = ctx.core.set_availability(
        &therapist_id,
        &request.weekly_schedule,
        request.preferences.as_ref(),
    )?;
    Ok(Json(template))
}

pub async fn add_exception(
    State(ctx): State<ApiContext>,
    Path(therapist_id): Path<String>,
    Json(exception): Json<AvailabilityException>,
) -> Result<Json<WeeklyTemplate>, ApiError> {
    Ok(Json(ctx.core.add_exception(&therapist_id, &exception)?))
}

#[derive(Deserialize)]
pub struct SlotQuery {
    pub start: String,
    pub end: String,
    pub session_type: Option<SessionType>,
}

#[derive(Serialize)]
pub struct SlotsResponse {
    pub therapist_id: String,
    pub start: String,
    pub end: String,
    pub slots: Vec<AvailableSlot>,
}

pub async fn slots(
    State(ctx): State<ApiContext>,
    Path(therapist_id): Path<String>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<SlotsResponse>, ApiError> {
    let slots =
        ctx.core
            .get_available_slots(&therapist_id, &query.start, &query.end, query.session_type)?;
    Ok(Json(SlotsResponse {
        therapist_id,
        start: query.start,
        end: query.end,
        slots,
    }))
}
