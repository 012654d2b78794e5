//! Admin operations.
//!
//! Mounted behind `require_auth` and `require_admin`.

use crate::auth::key_cache::KeyStatus;
use crate::errors::AuthError;
use crate::routes::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

/// Response for POST /api/v1/admin/key-refresh.
#[derive(Debug, Serialize)]
pub struct KeyRefreshResponse {
    /// Whether new material was fetched. False when the fetch failed and the
    /// previous material is still being served.
    pub refreshed: bool,

    /// Key material before the refresh.
    pub previous: KeyStatus,

    pub current: KeyStatus,
}

/// Handler for POST /api/v1/admin/key-refresh
///
/// Forces a verification key fetch, bypassing the TTL.
///
/// # Errors
///
/// `AuthServiceUnavailable` (503) if no key material is available after the
/// attempt.
#[instrument(skip_all, name = "authgate.handlers.admin.refresh_key")]
pub async fn refresh_key(
    State(state): State<Arc<AppState>>,
) -> Result<Json<KeyRefreshResponse>, AuthError> {
    let keys = state.authenticator.key_cache();

    let previous = keys.status().await;

    if keys.get(true).await.is_none() {
        return Err(AuthError::AuthServiceUnavailable(
            "verification key unavailable after forced refresh".to_string(),
        ));
    }

    let current = keys.status().await;
    // A failed fetch keeps the previous material, fetched_at unchanged
    let refreshed = current.fetched_at != previous.fetched_at;

    tracing::info!(
        target: "authgate.auth.keys",
        refreshed,
        previous_key_id = ?previous.key_id,
        current_key_id = ?current.key_id,
        "Admin forced verification key refresh"
    );

    Ok(Json(KeyRefreshResponse {
        refreshed,
        previous,
        current,
    }))
}
