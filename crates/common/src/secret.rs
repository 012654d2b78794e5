//! Secret types for holding credentials without leaking them into logs.
//!
//! This module re-exports types from the [`secrecy`] crate. Raw authorization
//! header values (API keys, bearer tokens) are wrapped in [`SecretString`] as
//! soon as they are parsed, so any struct that derives `Debug` around them
//! stays safe to log.
//!
//! Secrets are zeroized on drop. To read the value, call
//! [`ExposeSecret::expose_secret`] explicitly, and only at the point where
//! the credential is actually needed (hashing, signature verification, or
//! forwarding to the authority).
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct Presented {
//!     scheme: &'static str,
//!     value: SecretString,
//! }
//!
//! let presented = Presented {
//!     scheme: "APIKey",
//!     value: SecretString::from("1234$abcdef"),
//! };
//!
//! assert!(!format!("{presented:?}").contains("abcdef"));
//! assert_eq!(presented.value.expose_secret(), "1234$abcdef");
//! ```

pub use secrecy::{ExposeSecret, SecretString};
