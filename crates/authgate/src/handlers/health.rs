//! Health check handlers.
//!
//! - `/health`: Liveness check - returns OK if the process is running
//! - `/ready`: Readiness check - verification key material is cached

use crate::auth::key_cache::KeyStatus;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    pub verification_key: KeyStatus,
}

/// Liveness check handler. Checks nothing beyond the process answering.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness check handler.
///
/// Returns 200 when key material is cached (stale material still counts,
/// it is refreshed on demand), 503 otherwise. Never triggers a key fetch.
///
/// Opaque credentials can still be verified remotely without a key, but a
/// process that cannot verify signed tokens locally would push all of that
/// load onto the authority.
#[tracing::instrument(skip_all, name = "authgate.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let key_status = state.authenticator.key_cache().status().await;

    if !key_status.cached {
        tracing::warn!(target: "authgate.availability", "Readiness check failed: no verification key material cached");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready",
                verification_key: key_status,
            }),
        );
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            verification_key: key_status,
        }),
    )
}
