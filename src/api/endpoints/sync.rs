//! External calendar link endpoints.

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{SyncConfig, SyncDirection, SyncProvider};

fn enabled_by_default() -> bool {
    true
}

#[derive(Deserialize)]
pub struct SyncConfigRequest {
    #[serde(default)]
    pub external_calendar_id: Option<String>,
    pub direction: SyncDirection,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

/// `PUT /api/therapists/:id/sync/:provider`
pub async fn upsert(
    State(ctx): State<ApiContext>,
    Path((therapist_id, provider)): Path<(String, SyncProvider)>,
    Json(request): Json<SyncConfigRequest>,
) -> Result<Json<SyncConfig>, ApiError> {
    let config = ctx.core.upsert_sync_config(
        &therapist_id,
        provider,
        request.external_calendar_id.as_deref(),
        request.direction,
        request.enabled,
    )?;
    Ok(Json(config))
}

/// `GET /api/therapists/:id/sync`
pub async fn list(
    State(ctx): State<ApiContext>,
    Path(therapist_id): Path<String>,
) -> Result<Json<Vec<SyncConfig>>, ApiError> {
    Ok(Json(ctx.core.list_sync_configs(&therapist_id)?))
}

/// `POST /api/therapists/:id/sync/:provider/synced` — record a finished exchange.
pub async fn mark_synced(
    State(ctx): State<ApiContext>,
    Path((therapist_id, provider)): Path<(String, SyncProvider)>,
) -> Result<Json<SyncConfig>, ApiError> {
    Ok(Json(ctx.core.mark_synced(&therapist_id, provider, chrono::Utc::now())?))
}
