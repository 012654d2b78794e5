//! Verification key cache.
//!
//! Fetches the authority's public key from its key endpoint
//! (`GET {base}{key_path}` returning `{"public_key": "<PEM>"}`) and keeps the
//! current material for a configurable TTL.
//!
//! # Behavior
//!
//! - A fresh key is served from memory with no network call.
//! - Expired material or a forced refresh triggers a fetch. Concurrent callers
//!   that need a fetch at the same time share a single request.
//! - A failed fetch keeps the previous material in place. Callers get stale
//!   material rather than nothing, and `None` only before the first success.
//! - Material is replaced, never mutated. Readers holding an `Arc` to the old
//!   key keep a consistent view.

use crate::observability::metrics;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// Errors from a single key fetch. These never leave this module; a failed
/// fetch degrades to the previous material.
#[derive(Debug, Error)]
pub enum KeyFetchError {
    #[error("key endpoint request failed: {0}")]
    Transport(String),

    #[error("key endpoint returned status {0}")]
    Status(u16),

    #[error("key endpoint returned an unreadable body: {0}")]
    InvalidBody(String),

    #[error("key material is not a usable {algorithm:?} public key: {reason}")]
    UnusableKey {
        algorithm: Algorithm,
        reason: String,
    },
}

/// Body of the key endpoint.
#[derive(Debug, Deserialize)]
struct PublicKeyResponse {
    public_key: String,
}

/// One fetched verification key.
pub struct KeyMaterial {
    decoding_key: DecodingKey,
    key_id: String,
    fetched_at: Instant,
    fetched_at_utc: DateTime<Utc>,
}

impl KeyMaterial {
    /// Parse PEM material for the given algorithm family.
    ///
    /// # Errors
    ///
    /// Returns `KeyFetchError::UnusableKey` if the PEM does not hold a public
    /// key of the family `algorithm` belongs to.
    pub fn from_pem(algorithm: Algorithm, pem: &str) -> Result<Self, KeyFetchError> {
        let decoding_key = decoding_key_from_pem(algorithm, pem).map_err(|e| {
            KeyFetchError::UnusableKey {
                algorithm,
                reason: e.to_string(),
            }
        })?;

        let digest = Sha256::digest(pem.trim().as_bytes());
        let key_id = hex::encode(digest.iter().take(8).copied().collect::<Vec<u8>>());

        Ok(Self {
            decoding_key,
            key_id,
            fetched_at: Instant::now(),
            fetched_at_utc: Utc::now(),
        })
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Short, stable identifier derived from the PEM (first 8 bytes of its
    /// SHA-256, hex). Public keys are not secret; this lets operators confirm
    /// a rotation without dumping the key.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at_utc
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_id", &self.key_id)
            .field("fetched_at", &self.fetched_at_utc)
            .finish_non_exhaustive()
    }
}

/// Select the PEM parser by algorithm family. The token never chooses this.
fn decoding_key_from_pem(
    algorithm: Algorithm,
    pem: &str,
) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
    match algorithm {
        Algorithm::RS256
        | Algorithm::RS384
        | Algorithm::RS512
        | Algorithm::PS256
        | Algorithm::PS384
        | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem.as_bytes()),
        Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem.as_bytes()),
        Algorithm::EdDSA => DecodingKey::from_ed_pem(pem.as_bytes()),
        Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
            Err(jsonwebtoken::errors::ErrorKind::InvalidAlgorithm.into())
        }
    }
}

/// Snapshot of the cache for readiness reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct KeyStatus {
    pub cached: bool,
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

struct KeyState {
    current: Option<Arc<KeyMaterial>>,

    /// Completed fetch attempts (success or failure). Lets a caller that
    /// waited on the refresh lock see that someone else already fetched.
    attempts: u64,
}

/// Process-wide holder of the current verification key.
pub struct KeyMaterialCache {
    key_url: String,
    algorithm: Algorithm,
    http_client: reqwest::Client,
    request_timeout: Duration,
    ttl: Duration,
    state: RwLock<KeyState>,
    refresh_lock: Mutex<()>,
}

impl KeyMaterialCache {
    /// Create an empty cache. Nothing is fetched until the first `get`.
    pub fn new(
        key_url: String,
        algorithm: Algorithm,
        http_client: reqwest::Client,
        request_timeout: Duration,
        ttl: Duration,
    ) -> Self {
        Self {
            key_url,
            algorithm,
            http_client,
            request_timeout,
            ttl,
            state: RwLock::new(KeyState {
                current: None,
                attempts: 0,
            }),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Get the current key material.
    ///
    /// Serves cached material while it is younger than the TTL unless
    /// `force_refresh` is set. Otherwise fetches, coalescing with any fetch
    /// already in flight. Returns the previous material if the fetch fails,
    /// and `None` only if no fetch has ever succeeded.
    #[instrument(skip_all, fields(force_refresh = force_refresh))]
    pub async fn get(&self, force_refresh: bool) -> Option<Arc<KeyMaterial>> {
        let observed_attempts = {
            let state = self.state.read().await;
            if !force_refresh {
                if let Some(current) = state.current.as_ref() {
                    if current.age() < self.ttl {
                        return Some(Arc::clone(current));
                    }
                }
            }
            state.attempts
        };

        let _refresh_guard = self.refresh_lock.lock().await;

        {
            let state = self.state.read().await;
            if state.attempts != observed_attempts {
                tracing::debug!(target: "authgate.auth.keys", "Joined key refresh completed by another request");
                return state.current.clone();
            }
        }

        let result = self.fetch().await;

        let mut state = self.state.write().await;
        state.attempts = state.attempts.wrapping_add(1);
        match result {
            Ok(material) => {
                tracing::info!(
                    target: "authgate.auth.keys",
                    key_id = %material.key_id(),
                    rotated = state
                        .current
                        .as_ref()
                        .is_some_and(|previous| previous.key_id() != material.key_id()),
                    "Verification key refreshed"
                );
                let material = Arc::new(material);
                state.current = Some(Arc::clone(&material));
                Some(material)
            }
            Err(e) => {
                if state.current.is_some() {
                    tracing::warn!(target: "authgate.auth.keys", error = %e, "Key refresh failed, keeping previous key material");
                } else {
                    tracing::error!(target: "authgate.auth.keys", error = %e, "Key fetch failed and no key material is cached");
                }
                state.current.clone()
            }
        }
    }

    /// Fetch at startup so the first request does not pay for it.
    /// Returns whether key material is available afterwards.
    pub async fn prefetch(&self) -> bool {
        self.get(false).await.is_some()
    }

    /// Report cache state without triggering a fetch.
    pub async fn status(&self) -> KeyStatus {
        let state = self.state.read().await;
        match state.current.as_ref() {
            Some(material) => {
                let age = material.age();
                KeyStatus {
                    cached: true,
                    stale: age >= self.ttl,
                    key_id: Some(material.key_id().to_string()),
                    age_seconds: Some(age.as_secs()),
                    fetched_at: Some(material.fetched_at()),
                }
            }
            None => KeyStatus {
                cached: false,
                stale: false,
                key_id: None,
                age_seconds: None,
                fetched_at: None,
            },
        }
    }

    async fn fetch(&self) -> Result<KeyMaterial, KeyFetchError> {
        let start = Instant::now();
        let result = self.fetch_inner().await;
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::record_key_fetch(status, start.elapsed());
        result
    }

    async fn fetch_inner(&self) -> Result<KeyMaterial, KeyFetchError> {
        tracing::debug!(target: "authgate.auth.keys", url = %self.key_url, "Fetching verification key");

        let response = self
            .http_client
            .get(&self.key_url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| KeyFetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyFetchError::Status(status.as_u16()));
        }

        let body: PublicKeyResponse = response
            .json()
            .await
            .map_err(|e| KeyFetchError::InvalidBody(e.to_string()))?;

        KeyMaterial::from_pem(self.algorithm, &body.public_key)
    }
}
