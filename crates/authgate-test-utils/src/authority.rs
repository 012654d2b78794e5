//! Mock authority server.
//!
//! Wraps a `wiremock::MockServer` exposing the two endpoints authgate talks
//! to: the public key endpoint and the verify endpoint. Helpers that take a
//! `calls` argument register `.expect(calls)`, which wiremock asserts when the
//! server is dropped at the end of the test.

use crate::keys::TestKeypair;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PUBLIC_KEY_PATH: &str = "/iam/public-key";
pub const VERIFY_PATH: &str = "/auth/verify";

/// A running mock authority.
pub struct MockAuthority {
    server: MockServer,
}

impl MockAuthority {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL, suitable for `AUTH_SERVICE_URL`.
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// Environment for `Config::from_vars` pointing at this authority.
    pub fn config_vars(&self) -> HashMap<String, String> {
        HashMap::from([
            ("AUTH_SERVICE_URL".to_string(), self.uri()),
            ("AUTH_HTTP_TIMEOUT_SECONDS".to_string(), "1".to_string()),
        ])
    }

    // ------------------------------------------------------------------------
    // Key endpoint
    // ------------------------------------------------------------------------

    /// Serve `keypair`'s public key on every request.
    pub async fn serve_public_key(&self, keypair: TestKeypair) {
        public_key_mock(keypair).mount(&self.server).await;
    }

    /// Serve `keypair`'s public key and assert it is fetched exactly `calls` times.
    pub async fn expect_public_key(&self, keypair: TestKeypair, calls: u64) {
        public_key_mock(keypair)
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Serve `keypair` for the next `times` requests only. Mount the next key
    /// afterwards to model a rotation.
    pub async fn serve_public_key_times(&self, keypair: TestKeypair, times: u64) {
        public_key_mock(keypair)
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    /// Serve `keypair` after `delay`, asserting exactly `calls` fetches.
    pub async fn expect_slow_public_key(&self, keypair: TestKeypair, delay: Duration, calls: u64) {
        Mock::given(method("GET"))
            .and(path(PUBLIC_KEY_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "public_key": keypair.public_pem }))
                    .set_delay(delay),
            )
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Fail every key request with `status`.
    pub async fn fail_public_key(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(PUBLIC_KEY_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Assert the key endpoint is never called.
    pub async fn forbid_public_key(&self) {
        Mock::given(method("GET"))
            .and(path(PUBLIC_KEY_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.server)
            .await;
    }

    // ------------------------------------------------------------------------
    // Verify endpoint
    // ------------------------------------------------------------------------

    /// Accept exactly `authorization` (scheme included) and answer with `claims`,
    /// asserting `calls` verify requests for it.
    pub async fn expect_verify(&self, authorization: &str, claims: Value, calls: u64) {
        verify_mock(authorization)
            .respond_with(ResponseTemplate::new(200).set_body_json(claims))
            .expect(calls)
            .mount(&self.server)
            .await;
    }

    /// Accept exactly `authorization` and answer with `claims`, any number of times.
    pub async fn accept(&self, authorization: &str, claims: Value) {
        verify_mock(authorization)
            .respond_with(ResponseTemplate::new(200).set_body_json(claims))
            .mount(&self.server)
            .await;
    }

    /// Answer every verify request with `status` and an empty JSON object.
    pub async fn verify_status(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(VERIFY_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({})))
            .mount(&self.server)
            .await;
    }

    /// Reject every verify request with 401 (the authority's "no").
    pub async fn reject_all(&self) {
        self.verify_status(401).await;
    }

    /// Answer every verify request after `delay`.
    pub async fn slow_verify(&self, delay: Duration) {
        Mock::given(method("GET"))
            .and(path(VERIFY_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "user_id": "late" }))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Assert the verify endpoint is never called.
    pub async fn forbid_verify(&self) {
        Mock::given(method("GET"))
            .and(path(VERIFY_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&self.server)
            .await;
    }

    // ------------------------------------------------------------------------
    // Request inspection
    // ------------------------------------------------------------------------

    pub async fn key_requests(&self) -> usize {
        self.requests_to(PUBLIC_KEY_PATH).await
    }

    pub async fn verify_requests(&self) -> usize {
        self.requests_to(VERIFY_PATH).await
    }

    pub async fn total_requests(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or(0)
    }

    async fn requests_to(&self, wanted: &str) -> usize {
        self.server
            .received_requests()
            .await
            .map(|requests| {
                requests
                    .iter()
                    .filter(|request| request.url.path() == wanted)
                    .count()
            })
            .unwrap_or(0)
    }
}

fn public_key_mock(keypair: TestKeypair) -> Mock {
    Mock::given(method("GET"))
        .and(path(PUBLIC_KEY_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "public_key": keypair.public_pem })),
        )
}

fn verify_mock(authorization: &str) -> wiremock::MockBuilder {
    Mock::given(method("GET"))
        .and(path(VERIFY_PATH))
        .and(query_param("response_format", "json_body"))
        .and(header("Authorization", authorization))
}
