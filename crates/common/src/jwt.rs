//! JWT shape and expiry helpers shared across authgate crates.
//!
//! This module provides the network-free, key-free checks that run before any
//! signature verification:
//! - Size limits for DoS prevention
//! - Compact JWS shape detection (`header.payload.signature`)
//! - Expiry (`exp`) extraction from the unverified payload
//! - Deterministic expiry validation with leeway
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Nothing here verifies a signature. A token that passes these checks
//!   MUST still be verified against trusted key material.
//! - Tokens without an `exp` claim are rejected (fail closed)
//! - Error messages are intentionally generic to prevent information leakage
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{check_compact_jws, peek_expiry, validate_expiry_at, DEFAULT_LEEWAY};
//!
//! check_compact_jws(token)?;
//! let exp = peek_expiry(token)?;
//! validate_expiry_at(exp, DEFAULT_LEEWAY, now)?;
//! // ... verify the signature
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this size are rejected BEFORE any parsing or cryptographic
/// operations. Typical authority-issued tokens are well under 2KB even with
/// a long `user_groups` list.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default expiry leeway (none).
///
/// The authority and this service are expected to be NTP-synchronized, so an
/// `exp` in the past is rejected immediately.
pub const DEFAULT_LEEWAY: Duration = Duration::from_secs(0);

/// Maximum allowed expiry leeway (10 minutes).
///
/// Prevents misconfiguration that would keep expired tokens usable for long.
pub const MAX_LEEWAY: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors from the pre-verification JWT checks.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token is not a compact JWS or its payload is not a JSON object.
    #[error("The access token is invalid or expired")]
    MalformedToken,

    /// Token payload has no numeric `exp` claim.
    #[error("The access token is invalid or expired")]
    MissingExpiry,

    /// Token `exp` claim is in the past (beyond leeway).
    #[error("The access token is invalid or expired")]
    Expired,
}

// =============================================================================
// Functions
// =============================================================================

/// Check the compact JWS shape: three non-empty base64url segments separated
/// by dots, within the size limit. An empty signature segment (unsigned
/// `alg: none` tokens) does not count.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Not exactly three non-empty base64url segments
pub fn check_compact_jws(token: &str) -> Result<(), JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut segments = 0usize;
    for segment in token.split('.') {
        segments += 1;
        if segment.is_empty() || !segment.bytes().all(is_base64url_byte) {
            tracing::debug!(
                target: "common.jwt",
                segment_index = segments - 1,
                "Token rejected: segment is empty or not base64url"
            );
            return Err(JwtValidationError::MalformedToken);
        }
    }

    if segments != 3 {
        tracing::debug!(
            target: "common.jwt",
            parts = segments,
            "Token rejected: invalid JWT format"
        );
        return Err(JwtValidationError::MalformedToken);
    }

    Ok(())
}

/// Extract the `exp` claim from a JWT payload without verifying the signature.
///
/// Used to screen out expired tokens before any key lookup so that an expired
/// token never costs a network round trip.
///
/// # Errors
///
/// - `TokenTooLarge` / `MalformedToken` - see [`check_compact_jws`]
/// - `MalformedToken` - payload is not base64url JSON object
/// - `MissingExpiry` - payload has no numeric `exp`
pub fn peek_expiry(token: &str) -> Result<i64, JwtValidationError> {
    check_compact_jws(token)?;

    let payload_part = token
        .split('.')
        .nth(1)
        .ok_or(JwtValidationError::MalformedToken)?;

    let payload_bytes = URL_SAFE_NO_PAD.decode(payload_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT payload base64");
        JwtValidationError::MalformedToken
    })?;

    let payload: serde_json::Value = serde_json::from_slice(&payload_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT payload JSON");
        JwtValidationError::MalformedToken
    })?;

    if !payload.is_object() {
        return Err(JwtValidationError::MalformedToken);
    }

    let exp = payload.get("exp").ok_or(JwtValidationError::MissingExpiry)?;

    // Fractional timestamps are truncated; anything else is not an expiry.
    #[allow(clippy::cast_possible_truncation)]
    let exp = exp
        .as_i64()
        .or_else(|| exp.as_f64().map(|f| f as i64))
        .ok_or(JwtValidationError::MissingExpiry)?;

    Ok(exp)
}

/// Validate the `exp` claim against an explicit `now` (Unix seconds).
///
/// Callers supply the clock so boundary conditions stay testable.
///
/// # Errors
///
/// Returns `JwtValidationError::Expired` if `exp <= now - leeway`.
pub fn validate_expiry_at(exp: i64, leeway: Duration, now: i64) -> Result<(), JwtValidationError> {
    // Safe cast: leeway is bounded to MAX_LEEWAY (600 seconds), well within i64 range
    #[allow(clippy::cast_possible_wrap)]
    let leeway_secs = leeway.as_secs() as i64;

    if exp <= now.saturating_sub(leeway_secs) {
        tracing::debug!(
            target: "common.jwt",
            exp = exp,
            now = now,
            leeway_secs = leeway_secs,
            "Token rejected: expired"
        );
        return Err(JwtValidationError::Expired);
    }

    Ok(())
}

fn is_base64url_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

// =============================================================================
// Tests
// =============================================================================
