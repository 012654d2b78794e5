//! Metrics definitions for authgate.
//!
//! All metrics follow Prometheus naming conventions:
//! - `authgate_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `outcome`: `success` or an `AuthError` code (7 values)
//! - `path`: cache, local, local_retry, remote, none
//! - `result`: hit, miss
//! - `status`: success, error / success, rejected, unavailable
//! - `endpoint`: known static paths, everything else is `/other`
//!
//! Credentials, fingerprints and user identifiers are never used as labels.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("authgate_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Cache hits are sub-millisecond; remote verification is bounded by the
        // authority timeout.
        .set_buckets_for_metric(
            Matcher::Prefix("authgate_authentication".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
                5.000,
            ],
        )
        .map_err(|e| format!("Failed to set authentication buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("authgate_key_fetch".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000],
        )
        .map_err(|e| format!("Failed to set key fetch buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("authgate_remote_verify".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000,
            ],
        )
        .map_err(|e| format!("Failed to set remote verify buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `authgate_http_requests_total`, `authgate_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("authgate_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("authgate_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/ready" => "/ready",
        "/metrics" => "/metrics",
        "/api/v1/me" => "/api/v1/me",
        "/api/v1/admin/key-refresh" => "/api/v1/admin/key-refresh",
        _ => "/other",
    }
}

// ============================================================================
// Authentication Metrics
// ============================================================================

/// Record the outcome of one `authenticate` call.
///
/// Metric: `authgate_authentications_total`, `authgate_authentication_duration_seconds`
/// Labels: `outcome`, `path`
///
/// `path` is the stage that produced the decision: `cache`, `local`,
/// `local_retry`, `remote`, or `none` for credentials rejected before any
/// verifier ran.
pub fn record_authentication(outcome: &'static str, path: &'static str, duration: Duration) {
    histogram!("authgate_authentication_duration_seconds",
        "path" => path
    )
    .record(duration.as_secs_f64());

    counter!("authgate_authentications_total",
        "outcome" => outcome,
        "path" => path
    )
    .increment(1);
}

/// Record a validation cache lookup.
///
/// Metric: `authgate_validation_cache_lookups_total`
/// Labels: `result` (hit, miss)
pub fn record_validation_cache_lookup(hit: bool) {
    counter!("authgate_validation_cache_lookups_total",
        "result" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

/// Record an admin authorization denial.
///
/// Metric: `authgate_authorization_denied_total`
pub fn record_authorization_denied() {
    counter!("authgate_authorization_denied_total").increment(1);
}

// ============================================================================
// Authority Client Metrics
// ============================================================================

/// Record a key material fetch from the authority.
///
/// Metric: `authgate_key_fetch_total`, `authgate_key_fetch_duration_seconds`
/// Labels: `status` (success, error)
pub fn record_key_fetch(status: &'static str, duration: Duration) {
    histogram!("authgate_key_fetch_duration_seconds").record(duration.as_secs_f64());

    counter!("authgate_key_fetch_total",
        "status" => status
    )
    .increment(1);
}

/// Record the result of a retry after a forced key refresh.
///
/// Metric: `authgate_key_refresh_retries_total`
/// Labels: `outcome` (success, failed, skipped)
pub fn record_key_refresh_retry(outcome: &'static str) {
    counter!("authgate_key_refresh_retries_total",
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a remote verification call.
///
/// Metric: `authgate_remote_verify_total`, `authgate_remote_verify_duration_seconds`
/// Labels: `status` (success, rejected, unavailable)
pub fn record_remote_verify(status: &'static str, duration: Duration) {
    histogram!("authgate_remote_verify_duration_seconds",
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("authgate_remote_verify_total",
        "status" => status
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // The metrics crate records to a global no-op recorder when none is
    // installed, so these only exercise the recording paths.

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, Duration::from_millis(5));
        record_http_request("GET", "/api/v1/me", 200, Duration::from_millis(50));
        record_http_request("GET", "/api/v1/me", 401, Duration::from_millis(10));
        record_http_request(
            "POST",
            "/api/v1/admin/key-refresh",
            403,
            Duration::from_millis(3),
        );
        record_http_request("GET", "/api/v1/me", 504, Duration::from_secs(30));
    }

    #[test]
    fn test_categorize_status_code() {
        assert_eq!(categorize_status_code(200), "success");
        assert_eq!(categorize_status_code(204), "success");
        assert_eq!(categorize_status_code(408), "timeout");
        assert_eq!(categorize_status_code(504), "timeout");
        assert_eq!(categorize_status_code(401), "error");
        assert_eq!(categorize_status_code(403), "error");
        assert_eq!(categorize_status_code(503), "error");
    }

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/health"), "/health");
        assert_eq!(normalize_endpoint("/ready"), "/ready");
        assert_eq!(normalize_endpoint("/api/v1/me"), "/api/v1/me");
        assert_eq!(
            normalize_endpoint("/api/v1/admin/key-refresh"),
            "/api/v1/admin/key-refresh"
        );
        assert_eq!(normalize_endpoint("/api/v1/users/42"), "/other");
        assert_eq!(normalize_endpoint("/"), "/other");
    }

    #[test]
    fn test_record_auth_paths() {
        record_authentication("success", "cache", Duration::from_micros(200));
        record_authentication("success", "local_retry", Duration::from_millis(40));
        record_authentication("TOKEN_EXPIRED", "local", Duration::from_micros(50));
        record_authentication("MALFORMED_CREDENTIAL", "none", Duration::from_micros(10));
        record_validation_cache_lookup(true);
        record_validation_cache_lookup(false);
        record_authorization_denied();
    }

    #[test]
    fn test_record_authority_calls() {
        record_key_fetch("success", Duration::from_millis(30));
        record_key_fetch("error", Duration::from_secs(5));
        record_key_refresh_retry("success");
        record_key_refresh_retry("skipped");
        record_remote_verify("success", Duration::from_millis(80));
        record_remote_verify("rejected", Duration::from_millis(20));
        record_remote_verify("unavailable", Duration::from_secs(5));
    }
}
