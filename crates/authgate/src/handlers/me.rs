//! Current identity handler.

use crate::auth::Claims;
use axum::{Extension, Json};
use tracing::instrument;

/// Handler for GET /api/v1/me
///
/// Returns the claims the auth middleware attached to this request. The
/// extra authority fields are included as given.
#[instrument(skip_all, name = "authgate.handlers.me")]
pub async fn get_me(Extension(claims): Extension<Claims>) -> Json<Claims> {
    tracing::debug!(target: "authgate.handlers.me", "Returning caller claims");
    Json(claims)
}
