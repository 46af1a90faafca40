//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks configuration and storage reachability

use crate::services::{
    context::RequestContext,
    recording_service::{PairingError, RecordingService},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Verifies a bucket is configured.
/// 2. Lists a single key from the bucket under the listing deadline.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(service): State<RecordingService>) -> impl IntoResponse {
    let config_check = if service.bucket().is_empty() {
        (false, Some("bucket not configured".to_string()))
    } else {
        (true, None)
    };

    let storage_check = match service.check_store(&RequestContext::new()).await {
        Ok(()) => (true, None),
        Err(PairingError::BucketNotConfigured) => (false, Some("skipped".to_string())),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    let overall_ok = config_check.0 && storage_check.0;

    let mut checks = HashMap::new();
    checks.insert(
        "config",
        CheckStatus {
            ok: config_check.0,
            error: config_check.1,
        },
    );
    checks.insert(
        "storage",
        CheckStatus {
            ok: storage_check.0,
            error: storage_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{memory_store::MemoryStore, recording_service::PairingSettings};
    use std::sync::Arc;

    #[tokio::test]
    async fn readyz_reports_storage_failures() {
        let store = Arc::new(MemoryStore::new());
        let healthy = RecordingService::new(
            store.clone(),
            "recs",
            Vec::new(),
            PairingSettings::default(),
        );
        let response = readyz(State(healthy.clone())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        store.fail_listing();
        let response = readyz(State(healthy)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let unconfigured =
            RecordingService::new(store, "", Vec::new(), PairingSettings::default());
        let response = readyz(State(unconfigured)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
