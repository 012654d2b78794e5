//! Authentication orchestration.
//!
//! Composes the validation cache, key cache, local verifier and remote
//! verifier into the single `authenticate` decision:
//!
//! ```text
//! parse ──► cache hit? ──► yes: claims
//!              │ no
//!              ▼
//!     opaque ─────────────────────────────────────► remote
//!     signed ─► screen (shape, exp, alg) ─► key ─► local verify
//!                                                   │ signature mismatch
//!                                                   ▼
//!                                     forced key refresh ─► local verify once
//!                                                   │ still failing
//!                                                   ▼
//!                                                 remote
//! ```
//!
//! Expired and malformed signed tokens are terminal. Successes are cached;
//! failures never are.

use crate::auth::claims::Claims;
use crate::auth::credential::Credential;
use crate::auth::jwt::{LocalVerifier, VerifyError};
use crate::auth::key_cache::{KeyMaterial, KeyMaterialCache};
use crate::auth::remote::{RemoteRejection, RemoteVerifier};
use crate::auth::validation_cache::ValidationCache;
use crate::auth::build_http_client;
use crate::config::Config;
use crate::errors::AuthError;
use crate::observability::metrics;
use common::secret::ExposeSecret;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Stage that produced an authentication decision. Bounded metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionPath {
    /// Rejected before any verifier ran.
    None,
    Cache,
    Local,
    /// Local verification after a forced key refresh.
    LocalRetry,
    Remote,
}

impl DecisionPath {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionPath::None => "none",
            DecisionPath::Cache => "cache",
            DecisionPath::Local => "local",
            DecisionPath::LocalRetry => "local_retry",
            DecisionPath::Remote => "remote",
        }
    }
}

/// Per-process authenticator. Cheap to share behind an `Arc`.
pub struct Authenticator {
    keys: Arc<KeyMaterialCache>,
    local: LocalVerifier,
    remote: RemoteVerifier,
    cache: ValidationCache,
}

impl Authenticator {
    pub fn new(
        keys: Arc<KeyMaterialCache>,
        local: LocalVerifier,
        remote: RemoteVerifier,
        cache: ValidationCache,
    ) -> Self {
        Self {
            keys,
            local,
            remote,
            cache,
        }
    }

    /// Wire all components from configuration, sharing one HTTP client
    /// between the key and verify endpoints.
    pub fn from_config(config: &Config) -> Self {
        let http_client = build_http_client(config.http_timeout());

        let keys = Arc::new(KeyMaterialCache::new(
            config.public_key_url(),
            config.jwt_algorithm,
            http_client.clone(),
            config.http_timeout(),
            config.key_cache_ttl(),
        ));
        let local = LocalVerifier::new(config.jwt_algorithm, config.jwt_leeway());
        let remote = RemoteVerifier::new(
            config.verify_url(),
            &config.header_types,
            http_client,
            config.http_timeout(),
        );
        let cache = ValidationCache::new(
            config.validation_cache_capacity,
            config.validation_cache_ttl(),
        );

        Self::new(keys, local, remote, cache)
    }

    pub fn key_cache(&self) -> &Arc<KeyMaterialCache> {
        &self.keys
    }

    pub fn validation_cache(&self) -> &ValidationCache {
        &self.cache
    }

    /// Authenticate a raw `Authorization` header value.
    ///
    /// # Errors
    ///
    /// - `MissingCredential` / `MalformedCredential` - value unusable as given
    /// - `TokenExpired` - signed token past its `exp`
    /// - `InvalidCredential` - signature or authority said no
    /// - `AuthServiceUnavailable` - the credential could not be checked
    #[instrument(skip_all, fields(credential_kind = tracing::field::Empty, path = tracing::field::Empty))]
    pub async fn authenticate(&self, raw_authorization: &str) -> Result<Claims, AuthError> {
        let start = Instant::now();
        let (result, path) = self.decide(raw_authorization).await;

        tracing::Span::current().record("path", path.as_str());
        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.code(),
        };
        metrics::record_authentication(outcome, path.as_str(), start.elapsed());

        match &result {
            Ok(_) => {
                tracing::debug!(target: "authgate.auth", path = path.as_str(), "Credential accepted");
            }
            Err(e) => {
                tracing::debug!(target: "authgate.auth", path = path.as_str(), error = %e, "Credential not accepted");
            }
        }

        result
    }

    async fn decide(&self, raw_authorization: &str) -> (Result<Claims, AuthError>, DecisionPath) {
        let credential = match Credential::parse(raw_authorization) {
            Ok(credential) => credential,
            Err(e) => return (Err(e), DecisionPath::None),
        };
        tracing::Span::current().record("credential_kind", credential.kind());

        let fingerprint = credential.fingerprint();
        if let Some(claims) = self.cache.get(&fingerprint) {
            metrics::record_validation_cache_lookup(true);
            return (Ok(claims), DecisionPath::Cache);
        }
        metrics::record_validation_cache_lookup(false);

        let (result, path) = match &credential {
            Credential::OpaqueKey { header } => (
                self.verify_remote(header.expose_secret()).await,
                DecisionPath::Remote,
            ),
            Credential::SignedToken { header, token } => {
                self.verify_signed(token.expose_secret(), header.expose_secret())
                    .await
            }
        };

        if let Ok(claims) = &result {
            self.cache.insert(fingerprint, claims.clone());
        }

        (result, path)
    }

    async fn verify_signed(
        &self,
        token: &str,
        header: &str,
    ) -> (Result<Claims, AuthError>, DecisionPath) {
        // Expired or broken tokens are settled before any key lookup.
        match self.local.screen(token) {
            Ok(()) => {}
            Err(VerifyError::AlgorithmRejected | VerifyError::SignatureMismatch) => {
                tracing::debug!(target: "authgate.auth", "Token algorithm not verifiable locally, asking authority");
                return (self.verify_remote(header).await, DecisionPath::Remote);
            }
            Err(e) => return (Err(terminal_error(e)), DecisionPath::Local),
        }

        let Some(key) = self.keys.get(false).await else {
            tracing::warn!(target: "authgate.auth", "No verification key available, asking authority");
            return (self.verify_remote(header).await, DecisionPath::Remote);
        };

        match self.local.verify_screened(token, &key) {
            Ok(claims) => (Ok(claims), DecisionPath::Local),
            Err(VerifyError::SignatureMismatch) => self.retry_after_refresh(token, header, &key).await,
            Err(VerifyError::AlgorithmRejected) => {
                (self.verify_remote(header).await, DecisionPath::Remote)
            }
            Err(e) => (Err(terminal_error(e)), DecisionPath::Local),
        }
    }

    /// The key may have rotated: refresh once, verify once, then defer to
    /// the authority.
    async fn retry_after_refresh(
        &self,
        token: &str,
        header: &str,
        stale: &KeyMaterial,
    ) -> (Result<Claims, AuthError>, DecisionPath) {
        tracing::info!(target: "authgate.auth", key_id = %stale.key_id(), "Signature mismatch, refreshing verification key");

        let refreshed = self
            .keys
            .get(true)
            .await
            .filter(|key| key.key_id() != stale.key_id());

        let Some(key) = refreshed else {
            metrics::record_key_refresh_retry("skipped");
            tracing::debug!(target: "authgate.auth", "Key unchanged after refresh, asking authority");
            return (self.verify_remote(header).await, DecisionPath::Remote);
        };

        match self.local.verify_screened(token, &key) {
            Ok(claims) => {
                metrics::record_key_refresh_retry("success");
                (Ok(claims), DecisionPath::LocalRetry)
            }
            Err(e @ (VerifyError::Expired | VerifyError::Malformed)) => {
                metrics::record_key_refresh_retry("failed");
                (Err(terminal_error(e)), DecisionPath::LocalRetry)
            }
            Err(VerifyError::SignatureMismatch | VerifyError::AlgorithmRejected) => {
                metrics::record_key_refresh_retry("failed");
                tracing::debug!(target: "authgate.auth", "Signature still mismatched after refresh, asking authority");
                (self.verify_remote(header).await, DecisionPath::Remote)
            }
        }
    }

    async fn verify_remote(&self, header: &str) -> Result<Claims, AuthError> {
        self.remote.verify(header).await.map_err(|rejection| match rejection {
            RemoteRejection::Unauthorized => AuthError::InvalidCredential,
            RemoteRejection::Unavailable(reason) => AuthError::AuthServiceUnavailable(reason),
        })
    }
}

/// Local outcomes that end the decision without asking the authority.
fn terminal_error(e: VerifyError) -> AuthError {
    match e {
        VerifyError::Expired => AuthError::TokenExpired,
        VerifyError::Malformed => AuthError::MalformedCredential,
        VerifyError::SignatureMismatch | VerifyError::AlgorithmRejected => {
            AuthError::InvalidCredential
        }
    }
}

/// Require the admin flag on already-authenticated claims.
///
/// # Errors
///
/// Returns `AuthError::Forbidden` if `claims.is_admin` is false.
pub fn authorize_admin(claims: &Claims) -> Result<(), AuthError> {
    if claims.is_admin {
        return Ok(());
    }

    metrics::record_authorization_denied();
    tracing::debug!(
        target: "authgate.auth",
        client_id = ?claims.client_id,
        "Admin access denied"
    );
    Err(AuthError::Forbidden("Admin access required".to_string()))
}
