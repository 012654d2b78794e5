//! Common utilities shared across authgate crates.

#![warn(clippy::pedantic)]

/// Module for JWT shape and expiry helpers (no cryptography, no I/O)
pub mod jwt;

/// Module for secret types that prevent accidental logging
pub mod secret;
