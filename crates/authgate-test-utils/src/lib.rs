//! # authgate Test Utilities
//!
//! Shared test utilities for authgate.
//!
//! This crate provides:
//! - Fixed RSA and Ed25519 key pairs (`keys`)
//! - Signed token minting with a claims builder (`keys::TestClaims`)
//! - A `wiremock`-backed authority with key and verify endpoints (`authority`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use authgate_test_utils::{MockAuthority, TestClaims, TestKeypair};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let authority = MockAuthority::start().await;
//!     authority.serve_public_key(TestKeypair::primary()).await;
//!
//!     let token = TestClaims::new().user("u1").sign(TestKeypair::primary());
//!     let header = format!("Bearer {token}");
//!     // ... authenticate `header` against a config pointing at `authority.uri()`
//! }
//! ```

pub mod authority;
pub mod keys;

// Re-export commonly used items
pub use authority::*;
pub use keys::*;
