//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub schema_version: i64,
    pub version: &'static str,
}

/// `GET /api/health` — liveness plus database reachability.
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let schema_version = ctx.core.ping()?;
    Ok(Json(HealthResponse {
        status: "ok",
        schema_version,
        version: crate::config::APP_VERSION,
    }))
}
