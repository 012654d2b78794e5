//! HTTP routes for authgate.
//!
//! Defines the Axum router and application state.

use crate::auth::Authenticator;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_admin, require_auth, AuthState};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Shared by the auth middleware and the operational handlers.
    pub authenticator: Arc<Authenticator>,
}

/// Build the application routes.
///
/// - `/health`, `/ready` - health checks
/// - `/metrics` - Prometheus scrape
/// - `/api/v1/me` - authenticated
/// - `/api/v1/admin/key-refresh` - authenticated, admin only
///
/// Layer order (outermost first): HTTP metrics, timeout, trace.
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        authenticator: Arc::clone(&state.authenticator),
    });

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // require_admin reads the claims require_auth inserts, so it sits inside
    let admin_routes = Router::new()
        .route("/api/v1/admin/key-refresh", post(handlers::refresh_key))
        .route_layer(middleware::from_fn(require_admin));

    let protected_routes = Router::new()
        .route("/api/v1/me", get(handlers::get_me))
        .merge(admin_routes)
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
