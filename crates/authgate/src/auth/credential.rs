//! Credential parsing and fingerprinting.
//!
//! A raw `Authorization` value is classified once, up front, into either an
//! opaque API key or a signed token. Classification is purely structural;
//! nothing here talks to the network or checks a signature.
//!
//! # Accepted shapes
//!
//! ```text
//! APIKey <key>             -> OpaqueKey
//! Bearer <h>.<p>.<s>       -> SignedToken (header segment must decode)
//! Bearer <value-without-.> -> OpaqueKey
//! ```
//!
//! Anything else (no scheme, unknown scheme, empty value, a dotted bearer
//! value that is not a compact JWS, or an oversized token) is malformed.

use crate::errors::AuthError;
use common::jwt::{check_compact_jws, JwtValidationError};
use common::secret::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::fmt;

/// A parsed credential. The raw header is kept verbatim (including its scheme)
/// because the remote verifier must receive it unchanged.
#[derive(Debug, Clone)]
pub enum Credential {
    /// API key or other opaque bearer value; only the authority can judge it.
    OpaqueKey { header: SecretString },

    /// Compact JWS that can be verified locally.
    SignedToken {
        header: SecretString,
        token: SecretString,
    },
}

impl Credential {
    /// Parse a raw `Authorization` header value.
    ///
    /// # Errors
    ///
    /// - `AuthError::MissingCredential` - value is empty or whitespace
    /// - `AuthError::MalformedCredential` - value matches no known shape
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let header = raw.trim();
        if header.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let (scheme, value) = header.split_once(char::is_whitespace).ok_or_else(|| {
            tracing::debug!(target: "authgate.auth", "Authorization value has no scheme");
            AuthError::MalformedCredential
        })?;
        let value = value.trim_start();

        if value.is_empty() || value.contains(char::is_whitespace) {
            tracing::debug!(target: "authgate.auth", scheme = %scheme, "Authorization value is empty or contains whitespace");
            return Err(AuthError::MalformedCredential);
        }

        if scheme.eq_ignore_ascii_case("apikey") {
            return Ok(Credential::OpaqueKey {
                header: SecretString::from(header),
            });
        }

        if !scheme.eq_ignore_ascii_case("bearer") {
            tracing::debug!(target: "authgate.auth", scheme = %scheme, "Unsupported authorization scheme");
            return Err(AuthError::MalformedCredential);
        }

        if !value.contains('.') {
            return Ok(Credential::OpaqueKey {
                header: SecretString::from(header),
            });
        }

        check_compact_jws(value).map_err(|e| {
            tracing::debug!(target: "authgate.auth", error = ?e, "Bearer value is not a compact JWS");
            match e {
                JwtValidationError::TokenTooLarge
                | JwtValidationError::MalformedToken
                | JwtValidationError::MissingExpiry
                | JwtValidationError::Expired => AuthError::MalformedCredential,
            }
        })?;

        // The header segment must be a decodable JOSE header before we commit
        // to the signed path.
        jsonwebtoken::decode_header(value).map_err(|e| {
            tracing::debug!(target: "authgate.auth", error = %e, "Bearer token header does not decode");
            AuthError::MalformedCredential
        })?;

        Ok(Credential::SignedToken {
            header: SecretString::from(header),
            token: SecretString::from(value),
        })
    }

    /// The full header value, scheme included.
    pub fn header(&self) -> &str {
        match self {
            Credential::OpaqueKey { header } | Credential::SignedToken { header, .. } => {
                header.expose_secret()
            }
        }
    }

    /// Bounded label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::OpaqueKey { .. } => "opaque",
            Credential::SignedToken { .. } => "signed",
        }
    }

    /// SHA-256 of the full header value.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self.header())
    }
}

/// Collision-resistant digest of a raw credential, used as the validation
/// cache key. Deterministic, so treat it like the credential: never log it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(raw: &str) -> Self {
        Self(Sha256::digest(raw.as_bytes()).into())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Fingerprint([REDACTED])")
    }
}
