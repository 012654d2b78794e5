//! Local verification of signed tokens.
//!
//! Verifies a compact JWS against the cached authority key. The algorithm is
//! fixed by configuration; the token's own `alg` header is only compared
//! against it, never used to pick how the key is interpreted.
//!
//! Acceptance depends on two things only: a valid signature and an `exp` claim
//! in the future. `iat`, `nbf` and `aud` are not checked.

use crate::auth::claims::Claims;
use crate::auth::key_cache::KeyMaterial;
use common::jwt::{check_compact_jws, peek_expiry, validate_expiry_at, JwtValidationError};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use std::time::Duration;
use thiserror::Error;

/// Why a token failed local verification. The distinction drives the
/// authenticator's retry policy.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum VerifyError {
    /// Not a well-formed token, or no usable `exp` claim.
    #[error("token is malformed")]
    Malformed,

    /// `exp` is in the past (beyond leeway).
    #[error("token has expired")]
    Expired,

    /// Signature does not verify under the given key. The key may be stale.
    #[error("token signature does not match the current key")]
    SignatureMismatch,

    /// Token header names a different algorithm than the configured one.
    #[error("token algorithm is not accepted")]
    AlgorithmRejected,
}

/// Stateless verifier for the configured signature algorithm.
#[derive(Debug, Clone)]
pub struct LocalVerifier {
    algorithm: Algorithm,
    leeway: Duration,
    validation: Validation,
}

impl LocalVerifier {
    pub fn new(algorithm: Algorithm, leeway: Duration) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.leeway = leeway.as_secs();
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            algorithm,
            leeway,
            validation,
        }
    }

    /// Key-free checks: shape, header, expiry, algorithm.
    ///
    /// Runs before any key lookup so expired or broken tokens never cost a
    /// key fetch.
    ///
    /// # Errors
    ///
    /// Any `VerifyError` except `SignatureMismatch`.
    pub fn screen(&self, token: &str) -> Result<(), VerifyError> {
        self.screen_at(token, chrono::Utc::now().timestamp())
    }

    /// [`screen`](Self::screen) against an explicit `now` (Unix seconds).
    pub fn screen_at(&self, token: &str, now: i64) -> Result<(), VerifyError> {
        check_compact_jws(token).map_err(|_| VerifyError::Malformed)?;

        let header = decode_header(token).map_err(|e| {
            tracing::debug!(target: "authgate.auth.local", error = %e, "Token header does not decode");
            VerifyError::Malformed
        })?;

        let exp = peek_expiry(token).map_err(|e| {
            tracing::debug!(target: "authgate.auth.local", error = ?e, "Token has no usable exp claim");
            VerifyError::Malformed
        })?;

        validate_expiry_at(exp, self.leeway, now).map_err(|e| match e {
            JwtValidationError::Expired => VerifyError::Expired,
            JwtValidationError::TokenTooLarge
            | JwtValidationError::MalformedToken
            | JwtValidationError::MissingExpiry => VerifyError::Malformed,
        })?;

        if header.alg != self.algorithm {
            tracing::debug!(
                target: "authgate.auth.local",
                token_alg = ?header.alg,
                expected_alg = ?self.algorithm,
                "Token algorithm does not match configured algorithm"
            );
            return Err(VerifyError::AlgorithmRejected);
        }

        Ok(())
    }

    /// Verify `token` against `key` and return its claims.
    ///
    /// # Errors
    ///
    /// See [`VerifyError`].
    pub fn verify(&self, token: &str, key: &KeyMaterial) -> Result<Claims, VerifyError> {
        self.screen(token)?;
        self.verify_screened(token, key)
    }

    /// Signature check and claim decoding for a token that already passed
    /// [`screen`](Self::screen).
    pub(crate) fn verify_screened(
        &self,
        token: &str,
        key: &KeyMaterial,
    ) -> Result<Claims, VerifyError> {
        let data = decode::<Claims>(token, key.decoding_key(), &self.validation).map_err(|e| {
            let mapped = map_jwt_error(e.kind());
            tracing::debug!(
                target: "authgate.auth.local",
                error = %e,
                key_id = %key.key_id(),
                outcome = ?mapped,
                "Local verification failed"
            );
            mapped
        })?;

        Ok(data.claims)
    }
}

fn map_jwt_error(kind: &ErrorKind) -> VerifyError {
    match kind {
        // A key that cannot check this signature is as suspect as a key that
        // checks it and says no.
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidRsaKey(_)
        | ErrorKind::InvalidEcdsaKey
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::Crypto(_) => VerifyError::SignatureMismatch,
        ErrorKind::ExpiredSignature => VerifyError::Expired,
        ErrorKind::InvalidAlgorithm => VerifyError::AlgorithmRejected,
        _ => VerifyError::Malformed,
    }
}
