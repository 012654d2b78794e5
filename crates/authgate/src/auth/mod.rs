//! Credential authentication.
//!
//! - `credential` - parse and fingerprint raw `Authorization` values
//! - `claims` - normalized identity produced by every verification path
//! - `key_cache` - authority public key with TTL and single-flight refresh
//! - `jwt` - local signature and expiry verification
//! - `remote` - the authority's verify endpoint
//! - `validation_cache` - memoized successes
//! - `authenticator` - the decision procedure tying these together

pub mod authenticator;
pub mod claims;
pub mod credential;
pub mod jwt;
pub mod key_cache;
pub mod remote;
pub mod validation_cache;

pub use authenticator::{authorize_admin, Authenticator};
pub use claims::Claims;

use std::time::Duration;

/// HTTP client shared by the key cache and the remote verifier. Requests set
/// their own timeout; `timeout` here bounds connection setup.
pub fn build_http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(target: "authgate.auth", error = %e, "Failed to build HTTP client with custom config, using defaults");
            reqwest::Client::new()
        })
}
