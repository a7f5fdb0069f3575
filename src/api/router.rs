//! Scheduling API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`. No auth layer: callers sit behind the
//! platform gateway.

use std::sync::Arc;

use axum::http::{header, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the scheduling API router.
///
/// NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
pub fn api_router(core: Arc<CoreState>) -> Router {
    let ctx = ApiContext::new(core);

    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/therapists/:id/availability",
            get(endpoints::availability::get).put(endpoints::availability::set),
        )
        .route(
            "/therapists/:id/exceptions",
            post(endpoints::availability::add_exception),
        )
        .route("/therapists/:id/slots", get(endpoints::availability::slots))
        .route("/therapists/:id/sync", get(endpoints::sync::list))
        .route("/therapists/:id/sync/:provider", put(endpoints::sync::upsert))
        .route(
            "/therapists/:id/sync/:provider/synced",
            post(endpoints::sync::mark_synced),
        )
        .route(
            "/users/:id/events",
            post(endpoints::events::create).get(endpoints::events::list),
        )
        .route(
            "/users/:id/events/:event_id",
            get(endpoints::events::detail).patch(endpoints::events::update),
        )
        .route("/reminders", post(endpoints::reminders::schedule))
        .route("/reminders/due", get(endpoints::reminders::due))
        .with_state(ctx);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(Any);

    Router::new()
        .nest("/api", routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
