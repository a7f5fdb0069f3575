//! HTTP surface for the scheduling engine.
//!
//! Thin glue: each handler maps one route onto a `CoreState` operation
//! and turns domain errors into structured JSON responses.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
