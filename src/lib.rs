//! Workspace umbrella crate.
//!
//! Exposes the assembled offline core behind a feature flag so host
//! applications can depend on `shelf-workspace` alone instead of wiring
//! each member crate individually.

#[cfg(feature = "service")]
pub use core_service as service;
