//! Defines routes for the recordings API.
//!
//! ## Structure
//! - **Recordings**
//!   - `GET /api/spaces/list` — paired metadata/media records for the caller's tenant
//!     (supports prefix, continuationToken, jsonLimit, jsonConcurrency)
//!   - `GET /api/spaces/file` — stream one object under the caller's tenant prefix
//!
//! - **Probes**
//!   - `GET /healthz` — liveness
//!   - `GET /readyz`  — readiness (bucket configured + storage reachable)

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        recording_handlers::{get_file, list_recordings},
    },
    services::recording_service::RecordingService,
};
use axum::{Router, routing::get};

/// Build and return the router for all routes.
///
/// The router carries shared state (`RecordingService`) to all handlers.
pub fn routes() -> Router<RecordingService> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // recordings
        .route("/api/spaces/list", get(list_recordings))
        .route("/api/spaces/file", get(get_file))
}
