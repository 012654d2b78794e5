//! Observability module for authgate.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
