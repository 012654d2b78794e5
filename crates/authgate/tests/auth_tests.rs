//! Authenticator integration tests against a mock authority.
//!
//! Every test gets its own wiremock server. Mocks registered with a call
//! count are verified when the server drops, so "no network call" and
//! "fetched exactly once" are asserted by the mock itself.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use authgate::auth::{authorize_admin, Authenticator};
use authgate::config::Config;
use authgate::errors::AuthError;
use authgate_test_utils::{tamper_signature, MockAuthority, TestClaims, TestKeypair};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn authenticator_for(authority: &MockAuthority) -> Authenticator {
    authenticator_with(authority, &[])
}

fn authenticator_with(authority: &MockAuthority, extra: &[(&str, &str)]) -> Authenticator {
    let mut vars: HashMap<String, String> = authority.config_vars();
    for (key, value) in extra {
        vars.insert((*key).to_string(), (*value).to_string());
    }
    let config = Config::from_vars(&vars).expect("test config should be valid");
    Authenticator::from_config(&config)
}

// ============================================================================
// Opaque credentials
// ============================================================================

#[tokio::test]
async fn test_opaque_key_is_verified_remotely_once_then_cached() {
    let authority = MockAuthority::start().await;
    authority.forbid_public_key().await;
    authority
        .expect_verify(
            "APIKey abc123",
            json!({"user_id": "u1", "client_id": "c1", "is_admin": false}),
            1,
        )
        .await;

    let authenticator = authenticator_for(&authority);

    let first = authenticator.authenticate("APIKey abc123").await.unwrap();
    assert_eq!(first.user_id.as_deref(), Some("u1"));
    assert_eq!(first.client_id.as_deref(), Some("c1"));
    assert!(!first.is_admin);

    let second = authenticator.authenticate("APIKey abc123").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(authenticator.validation_cache().len(), 1);
}

#[tokio::test]
async fn test_bearer_without_dots_is_treated_as_opaque() {
    let authority = MockAuthority::start().await;
    authority.forbid_public_key().await;
    authority
        .expect_verify("Bearer opaque-session-value", json!({"user_id": 42}), 1)
        .await;

    let authenticator = authenticator_for(&authority);

    let claims = authenticator
        .authenticate("Bearer opaque-session-value")
        .await
        .unwrap();
    assert_eq!(claims.user_id.as_deref(), Some("42"));
}

#[tokio::test]
async fn test_authority_rejection_is_invalid_and_not_cached() {
    let authority = MockAuthority::start().await;
    authority.reject_all().await;

    let authenticator = authenticator_for(&authority);

    for _ in 0..2 {
        assert_eq!(
            authenticator.authenticate("APIKey revoked").await,
            Err(AuthError::InvalidCredential)
        );
    }

    assert_eq!(authority.verify_requests().await, 2);
    assert!(authenticator.validation_cache().is_empty());
}

#[tokio::test]
async fn test_authority_error_status_is_unavailable() {
    let authority = MockAuthority::start().await;
    authority.verify_status(502).await;

    let authenticator = authenticator_for(&authority);

    let result = authenticator.authenticate("APIKey abc123").await;
    assert!(matches!(result, Err(AuthError::AuthServiceUnavailable(_))));
    assert!(authenticator.validation_cache().is_empty());
}

#[tokio::test]
async fn test_remote_timeout_is_unavailable_and_not_cached() {
    let authority = MockAuthority::start().await;
    // Config timeout is 1 second
    authority.slow_verify(Duration::from_secs(3)).await;

    let authenticator = authenticator_for(&authority);

    let result = authenticator.authenticate("APIKey slow").await;
    assert!(
        matches!(result, Err(AuthError::AuthServiceUnavailable(_))),
        "expected unavailable, got {result:?}"
    );
    assert!(authenticator.validation_cache().is_empty());
}

// ============================================================================
// Signed tokens
// ============================================================================

#[tokio::test]
async fn test_signed_token_verified_locally_without_remote_call() {
    let authority = MockAuthority::start().await;
    authority
        .expect_public_key(TestKeypair::primary(), 1)
        .await;
    authority.forbid_verify().await;

    let authenticator = authenticator_for(&authority);
    let token = TestClaims::new()
        .user("u7")
        .groups(&["eng", "ops"])
        .claim("tenant", json!("acme"))
        .sign(TestKeypair::primary());
    let header = format!("Bearer {token}");

    let claims = authenticator.authenticate(&header).await.unwrap();
    assert_eq!(claims.user_id.as_deref(), Some("u7"));
    assert_eq!(claims.user_groups, vec!["eng", "ops"]);
    assert_eq!(claims.extra("tenant"), Some(&json!("acme")));

    // Served from the validation cache; the key is not fetched again either
    let again = authenticator.authenticate(&header).await.unwrap();
    assert_eq!(claims, again);
}

#[tokio::test]
async fn test_expired_token_fails_without_any_network_call() {
    let authority = MockAuthority::start().await;
    authority.forbid_public_key().await;
    authority.forbid_verify().await;

    let authenticator = authenticator_for(&authority);
    let token = TestClaims::new()
        .expires_in(-60)
        .sign(TestKeypair::primary());

    assert_eq!(
        authenticator.authenticate(&format!("Bearer {token}")).await,
        Err(AuthError::TokenExpired)
    );
    assert!(authenticator.validation_cache().is_empty());
}

#[tokio::test]
async fn test_token_without_exp_is_rejected_without_network_call() {
    let authority = MockAuthority::start().await;
    authority.forbid_public_key().await;
    authority.forbid_verify().await;

    let authenticator = authenticator_for(&authority);
    let token = TestClaims::new()
        .without_exp()
        .sign(TestKeypair::primary());

    assert_eq!(
        authenticator.authenticate(&format!("Bearer {token}")).await,
        Err(AuthError::MalformedCredential)
    );
}

#[tokio::test]
async fn test_key_rotation_refreshes_once_and_succeeds_locally() {
    let authority = MockAuthority::start().await;
    authority
        .serve_public_key_times(TestKeypair::primary(), 1)
        .await;
    authority.serve_public_key(TestKeypair::rotated()).await;
    authority.forbid_verify().await;

    let authenticator = authenticator_for(&authority);
    assert!(authenticator.key_cache().prefetch().await);
    let stale_key = authenticator.key_cache().status().await.key_id;

    let token = TestClaims::new()
        .user("rotated-user")
        .sign(TestKeypair::rotated());

    let claims = authenticator
        .authenticate(&format!("Bearer {token}"))
        .await
        .unwrap();
    assert_eq!(claims.user_id.as_deref(), Some("rotated-user"));

    // Prefetch plus exactly one forced refresh
    assert_eq!(authority.key_requests().await, 2);
    let current_key = authenticator.key_cache().status().await.key_id;
    assert_ne!(stale_key, current_key);
}

#[tokio::test]
async fn test_bad_signature_retries_once_then_defers_to_authority() {
    let authority = MockAuthority::start().await;
    authority.serve_public_key(TestKeypair::primary()).await;
    authority.reject_all().await;

    let authenticator = authenticator_for(&authority);
    assert!(authenticator.key_cache().prefetch().await);

    let token = tamper_signature(&TestClaims::new().sign(TestKeypair::primary()));

    assert_eq!(
        authenticator.authenticate(&format!("Bearer {token}")).await,
        Err(AuthError::InvalidCredential)
    );

    // One forced refresh, never a loop
    assert_eq!(authority.key_requests().await, 2);
    assert_eq!(authority.verify_requests().await, 1);
}

#[tokio::test]
async fn test_foreign_algorithm_goes_to_authority_without_key_fetch() {
    let authority = MockAuthority::start().await;
    authority.forbid_public_key().await;

    // Configured for RS256; an EdDSA token is the authority's to judge
    let token = TestClaims::new()
        .user("federated")
        .sign(TestKeypair::ed25519());
    let header = format!("Bearer {token}");
    authority
        .expect_verify(&header, json!({"user_id": "federated"}), 1)
        .await;

    let authenticator = authenticator_for(&authority);

    let claims = authenticator.authenticate(&header).await.unwrap();
    assert_eq!(claims.user_id.as_deref(), Some("federated"));
}

#[tokio::test]
async fn test_unreachable_key_endpoint_falls_back_to_authority() {
    let authority = MockAuthority::start().await;
    authority.fail_public_key(503).await;

    let token = TestClaims::new().sign(TestKeypair::primary());
    let header = format!("Bearer {token}");
    authority
        .expect_verify(&header, json!({"user_id": "u1"}), 1)
        .await;

    let authenticator = authenticator_for(&authority);

    let claims = authenticator.authenticate(&header).await.unwrap();
    assert_eq!(claims.user_id.as_deref(), Some("u1"));
    assert!(!authenticator.key_cache().status().await.cached);
}

#[tokio::test]
async fn test_eddsa_configuration_verifies_locally() {
    let authority = MockAuthority::start().await;
    authority
        .expect_public_key(TestKeypair::ed25519(), 1)
        .await;
    authority.forbid_verify().await;

    let authenticator = authenticator_with(&authority, &[("JWT_ALGORITHM", "EdDSA")]);
    let token = TestClaims::new()
        .user("edge")
        .sign(TestKeypair::ed25519());

    let claims = authenticator
        .authenticate(&format!("Bearer {token}"))
        .await
        .unwrap();
    assert_eq!(claims.user_id.as_deref(), Some("edge"));
}

#[tokio::test]
async fn test_concurrent_requests_share_one_key_fetch() {
    let authority = MockAuthority::start().await;
    authority
        .expect_slow_public_key(TestKeypair::primary(), Duration::from_millis(200), 1)
        .await;
    authority.forbid_verify().await;

    let authenticator = Arc::new(authenticator_for(&authority));

    // Distinct tokens so the validation cache cannot absorb the burst
    let headers: Vec<String> = (0..16)
        .map(|i| {
            let token = TestClaims::new()
                .user(&format!("user-{i}"))
                .sign(TestKeypair::primary());
            format!("Bearer {token}")
        })
        .collect();

    let results = futures::future::join_all(headers.iter().map(|header| {
        let authenticator = Arc::clone(&authenticator);
        async move { authenticator.authenticate(header).await }
    }))
    .await;

    for (i, result) in results.into_iter().enumerate() {
        let claims = result.unwrap();
        assert_eq!(claims.user_id, Some(format!("user-{i}")));
    }
    assert_eq!(authenticator.validation_cache().len(), 16);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_refresh_of_expired_key() {
    let authority = MockAuthority::start().await;
    // Prefetch plus exactly one refresh once the material expires
    authority
        .expect_slow_public_key(TestKeypair::primary(), Duration::from_millis(200), 2)
        .await;
    authority.forbid_verify().await;

    let authenticator = Arc::new(authenticator_with(
        &authority,
        &[("KEY_CACHE_TTL_SECONDS", "1")],
    ));
    assert!(authenticator.key_cache().prefetch().await);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(authenticator.key_cache().status().await.stale);

    let headers: Vec<String> = (0..16)
        .map(|i| {
            let token = TestClaims::new()
                .user(&format!("user-{i}"))
                .sign(TestKeypair::primary());
            format!("Bearer {token}")
        })
        .collect();

    let results = futures::future::join_all(headers.iter().map(|header| {
        let authenticator = Arc::clone(&authenticator);
        async move { authenticator.authenticate(header).await }
    }))
    .await;

    for (i, result) in results.into_iter().enumerate() {
        let claims = result.unwrap();
        assert_eq!(claims.user_id, Some(format!("user-{i}")));
    }
    assert!(!authenticator.key_cache().status().await.stale);
}

// ============================================================================
// Rejected before any verifier
// ============================================================================

#[tokio::test]
async fn test_malformed_and_missing_credentials_make_no_network_calls() {
    let authority = MockAuthority::start().await;
    let authenticator = authenticator_for(&authority);

    for raw in ["Bearer a.b", "Bearer a..c", "Basic dXNlcjpwYXNz", "Bearer", "APIKey two words"] {
        assert_eq!(
            authenticator.authenticate(raw).await,
            Err(AuthError::MalformedCredential),
            "{raw:?} should be malformed"
        );
    }

    for raw in ["", "   "] {
        assert_eq!(
            authenticator.authenticate(raw).await,
            Err(AuthError::MissingCredential)
        );
    }

    let oversized = format!("Bearer {}.{}.{}", "a".repeat(4000), "b".repeat(4000), "c".repeat(400));
    assert_eq!(
        authenticator.authenticate(&oversized).await,
        Err(AuthError::MalformedCredential)
    );

    assert_eq!(authority.total_requests().await, 0);
}

// ============================================================================
// Authorization
// ============================================================================

#[tokio::test]
async fn test_authorize_admin_on_authenticated_claims() {
    let authority = MockAuthority::start().await;
    authority
        .accept("APIKey admin-key", json!({"user_id": "root", "is_admin": true}))
        .await;
    authority
        .accept("APIKey user-key", json!({"user_id": "u1", "is_admin": null}))
        .await;

    let authenticator = authenticator_for(&authority);

    let admin = authenticator.authenticate("APIKey admin-key").await.unwrap();
    assert_eq!(authorize_admin(&admin), Ok(()));

    let user = authenticator.authenticate("APIKey user-key").await.unwrap();
    assert!(!user.is_admin);
    assert!(matches!(
        authorize_admin(&user),
        Err(AuthError::Forbidden(_))
    ));
}
