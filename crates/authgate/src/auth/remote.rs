//! Remote verification against the authority's verify endpoint.
//!
//! `GET {base}{verify_path}?header_types=<list>&response_format=json_body`
//! with the caller's `Authorization` header forwarded verbatim.
//!
//! | Authority answer              | Result                          |
//! |-------------------------------|---------------------------------|
//! | 200 + claims JSON             | `Ok(Claims)`                    |
//! | 401                           | `RemoteRejection::Unauthorized` |
//! | other status, bad body,       | `RemoteRejection::Unavailable`  |
//! | timeout, transport error      |                                 |
//!
//! Only the authority's explicit 401 judges the credential. Everything else
//! means the credential was never checked.

use crate::auth::claims::Claims;
use crate::observability::metrics;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::instrument;

/// Why remote verification did not produce claims.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteRejection {
    /// The authority looked at the credential and said no.
    #[error("authority rejected the credential")]
    Unauthorized,

    /// The authority could not be asked, or answered nonsense.
    #[error("authority unavailable: {0}")]
    Unavailable(String),
}

/// Client for the authority's verify endpoint.
pub struct RemoteVerifier {
    verify_url: String,
    header_types: String,
    http_client: reqwest::Client,
    request_timeout: Duration,
}

impl RemoteVerifier {
    pub fn new(
        verify_url: String,
        header_types: &[String],
        http_client: reqwest::Client,
        request_timeout: Duration,
    ) -> Self {
        Self {
            verify_url,
            header_types: header_types.join(","),
            http_client,
            request_timeout,
        }
    }

    /// Ask the authority to verify `authorization` (scheme included).
    ///
    /// # Errors
    ///
    /// See [`RemoteRejection`].
    #[instrument(skip_all)]
    pub async fn verify(&self, authorization: &str) -> Result<Claims, RemoteRejection> {
        let start = Instant::now();
        let result = self.verify_inner(authorization).await;

        let status = match &result {
            Ok(_) => "success",
            Err(RemoteRejection::Unauthorized) => "rejected",
            Err(RemoteRejection::Unavailable(_)) => "unavailable",
        };
        metrics::record_remote_verify(status, start.elapsed());

        result
    }

    async fn verify_inner(&self, authorization: &str) -> Result<Claims, RemoteRejection> {
        let response = self
            .http_client
            .get(&self.verify_url)
            .query(&[
                ("header_types", self.header_types.as_str()),
                ("response_format", "json_body"),
            ])
            .header(AUTHORIZATION, authorization)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| {
                let reason = if e.is_timeout() {
                    "verify request timed out".to_string()
                } else {
                    format!("verify request failed: {e}")
                };
                tracing::error!(target: "authgate.auth.remote", reason = %reason, "Authority unreachable");
                RemoteRejection::Unavailable(reason)
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!(target: "authgate.auth.remote", "Authority rejected credential");
            return Err(RemoteRejection::Unauthorized);
        }

        if status != StatusCode::OK {
            let reason = format!("verify endpoint returned {status}");
            tracing::error!(target: "authgate.auth.remote", reason = %reason, "Authority error");
            return Err(RemoteRejection::Unavailable(reason));
        }

        response.json::<Claims>().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "verify response timed out".to_string()
            } else {
                format!("verify response body is not a claims object: {e}")
            };
            tracing::error!(target: "authgate.auth.remote", reason = %reason, "Authority returned an unusable response");
            RemoteRejection::Unavailable(reason)
        })
    }
}
