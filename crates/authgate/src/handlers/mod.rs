//! HTTP request handlers for authgate.

pub mod admin;
pub mod health;
pub mod me;
pub mod metrics;

pub use admin::refresh_key;
pub use health::{health_check, readiness_check};
pub use me::get_me;
pub use metrics::metrics_handler;
