//! HTTP middleware for authgate.
//!
//! # Components
//!
//! - `auth` - Authentication and admin authorization for protected routes
//! - `http_metrics` - HTTP request metrics middleware

pub mod auth;
pub mod http_metrics;

pub use auth::{require_admin, require_auth, AuthState, ClaimsExt};
pub use http_metrics::http_metrics_middleware;
