//! Authentication middleware for protected routes.
//!
//! Provides two middleware functions:
//! - `require_auth` - authenticates the `Authorization` header and injects
//!   `Claims` into request extensions
//! - `require_admin` - requires `is_admin` on those claims; layer it inside
//!   `require_auth`
//!
//! Claims travel with the request, never through shared state.

use crate::auth::{authorize_admin, Authenticator, Claims};
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub authenticator: Arc<Authenticator>,
}

/// Raw `Authorization` value. Scheme handling is the authenticator's job.
fn authorization_value(req: &Request) -> Result<&str, AuthError> {
    let value = req.headers().get(AUTHORIZATION).ok_or_else(|| {
        tracing::debug!(target: "authgate.middleware.auth", "Missing Authorization header");
        AuthError::MissingCredential
    })?;

    value.to_str().map_err(|_| {
        tracing::debug!(target: "authgate.middleware.auth", "Authorization header is not visible ASCII");
        AuthError::MalformedCredential
    })
}

/// Authentication middleware.
///
/// # Response
///
/// - 401 if the credential is missing, malformed, invalid or expired
/// - 503 if the authority could not be reached to check it
/// - Continues to next handler with `Claims` in extensions otherwise
#[instrument(skip_all, name = "authgate.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthError> {
    // Owned: the request body is not Sync, so no borrow of `req` may span the await
    let raw = authorization_value(&req)?.to_owned();

    let claims = state.authenticator.authenticate(&raw).await?;

    // Store claims in request extensions for downstream handlers
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Admin authorization middleware.
///
/// # Response
///
/// - 401 if no authenticated claims are present (`require_auth` not applied)
/// - 403 if the caller is not an admin
#[instrument(skip_all, name = "authgate.middleware.admin")]
pub async fn require_admin(req: Request, next: Next) -> Result<impl IntoResponse, AuthError> {
    let claims = req.claims().ok_or_else(|| {
        tracing::warn!(target: "authgate.middleware.auth", "Admin check reached without authenticated claims");
        AuthError::MissingCredential
    })?;

    authorize_admin(claims)?;

    Ok(next.run(req).await)
}

/// Extension trait for extracting claims from request.
pub trait ClaimsExt {
    /// Get the authenticated claims from request extensions.
    ///
    /// Returns `None` if auth middleware was not applied to this request.
    fn claims(&self) -> Option<&Claims>;
}

impl<B> ClaimsExt for axum::extract::Request<B> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }
}
