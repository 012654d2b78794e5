//! authgate library.
//!
//! Request authentication against a central authority: signed tokens are
//! verified locally with the authority's cached public key, everything else
//! is checked with the authority's verify endpoint, and successes are
//! memoized per credential.
//!
//! The binary (`main.rs`) wires these modules into an HTTP server; the
//! library is what integration tests and embedding services use.

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod observability;
pub mod routes;
