//! Fixed signing keys and token minting.
//!
//! The PEM fixtures under `fixtures/` were generated once with openssl and are
//! checked in, so tokens are reproducible across runs. They protect nothing.

use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Map, Value};

const PRIMARY_PRIVATE_PEM: &str = include_str!("../fixtures/primary_private.pem");
const PRIMARY_PUBLIC_PEM: &str = include_str!("../fixtures/primary_public.pem");
const ROTATED_PRIVATE_PEM: &str = include_str!("../fixtures/rotated_private.pem");
const ROTATED_PUBLIC_PEM: &str = include_str!("../fixtures/rotated_public.pem");
const ED25519_PRIVATE_PEM: &str = include_str!("../fixtures/ed25519_private.pem");
const ED25519_PUBLIC_PEM: &str = include_str!("../fixtures/ed25519_public.pem");

/// A signing key pair plus the algorithm it signs with.
#[derive(Debug, Clone, Copy)]
pub struct TestKeypair {
    pub algorithm: Algorithm,
    pub private_pem: &'static str,
    pub public_pem: &'static str,
}

impl TestKeypair {
    /// RSA-2048 key the mock authority serves first.
    pub const fn primary() -> Self {
        Self {
            algorithm: Algorithm::RS256,
            private_pem: PRIMARY_PRIVATE_PEM,
            public_pem: PRIMARY_PUBLIC_PEM,
        }
    }

    /// RSA-2048 key the authority rotates to.
    pub const fn rotated() -> Self {
        Self {
            algorithm: Algorithm::RS256,
            private_pem: ROTATED_PRIVATE_PEM,
            public_pem: ROTATED_PUBLIC_PEM,
        }
    }

    /// Ed25519 key for `EdDSA` deployments.
    pub const fn ed25519() -> Self {
        Self {
            algorithm: Algorithm::EdDSA,
            private_pem: ED25519_PRIVATE_PEM,
            public_pem: ED25519_PUBLIC_PEM,
        }
    }

    pub fn encoding_key(&self) -> EncodingKey {
        let pem = self.private_pem.as_bytes();
        match self.algorithm {
            Algorithm::EdDSA => EncodingKey::from_ed_pem(pem).expect("valid Ed25519 fixture"),
            _ => EncodingKey::from_rsa_pem(pem).expect("valid RSA fixture"),
        }
    }

    /// Sign arbitrary claims with this key's algorithm.
    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with(self.algorithm, claims)
    }

    /// Sign with an explicit algorithm (RS256 vs PS256 with the same RSA key).
    pub fn sign_with(&self, algorithm: Algorithm, claims: &Value) -> String {
        encode(&Header::new(algorithm), claims, &self.encoding_key()).expect("token signs")
    }
}

/// Builder for authority-style token claims.
///
/// # Example
/// ```rust,ignore
/// let token = TestClaims::new()
///     .user("u1")
///     .admin(true)
///     .groups(&["Administrators"])
///     .expires_in(3600)
///     .sign(TestKeypair::primary());
/// ```
#[derive(Debug, Clone)]
pub struct TestClaims {
    claims: Map<String, Value>,
}

impl TestClaims {
    /// Non-admin user `u1` of client `c1`, expiring in one hour.
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("user_id".to_string(), json!("u1"));
        claims.insert("client_id".to_string(), json!("c1"));
        claims.insert("email".to_string(), json!("u1@example.com"));
        claims.insert("user_type".to_string(), json!("standard"));
        claims.insert("is_admin".to_string(), json!(false));
        claims.insert("user_groups".to_string(), json!([]));
        claims.insert("iat".to_string(), json!(now));
        claims.insert("exp".to_string(), json!(now + 3600));
        Self { claims }
    }

    pub fn user(self, user_id: &str) -> Self {
        self.claim("user_id", json!(user_id))
    }

    pub fn client(self, client_id: &str) -> Self {
        self.claim("client_id", json!(client_id))
    }

    pub fn admin(self, is_admin: bool) -> Self {
        self.claim("is_admin", json!(is_admin))
    }

    pub fn groups(self, groups: &[&str]) -> Self {
        self.claim("user_groups", json!(groups))
    }

    /// Set expiration in seconds from now (negative for already expired).
    pub fn expires_in(self, seconds: i64) -> Self {
        self.claim("exp", json!(Utc::now().timestamp() + seconds))
    }

    /// Set an absolute expiration timestamp.
    pub fn expires_at(self, exp: i64) -> Self {
        self.claim("exp", json!(exp))
    }

    pub fn without_exp(mut self) -> Self {
        self.claims.remove("exp");
        self
    }

    /// Set any claim, including authority-specific extras.
    pub fn claim(mut self, key: &str, value: Value) -> Self {
        self.claims.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    pub fn sign(self, keypair: TestKeypair) -> String {
        keypair.sign(&self.build())
    }
}

impl Default for TestClaims {
    fn default() -> Self {
        Self::new()
    }
}

/// Replace the signature segment with one from a different token shape,
/// keeping the header and payload intact.
pub fn tamper_signature(token: &str) -> String {
    let (signed_part, _signature) = token.rsplit_once('.').expect("compact JWS");
    format!("{signed_part}.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
}
