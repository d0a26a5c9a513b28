//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host
//! platform embedding the offline library core.
//!
//! ## Overview
//!
//! This crate defines the contract between the core and its collaborators.
//! Each trait is a capability the core requires but does not own:
//!
//! - [`KeyValueStore`](store::KeyValueStore) - durable device key-value storage
//! - [`NetworkMonitor`](network::NetworkMonitor) - reachability detection
//! - [`LibraryApi`](api::LibraryApi) - the remote catalog service
//! - [`Clock`](time::Clock) - time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Host
//! implementations should convert platform-specific errors into it and keep
//! messages actionable. The core never propagates a `BridgeError` to the UI
//! under expected failure conditions (offline, server error); those are
//! absorbed into cache fallback and queue retention.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync` so the core can share them across async
//! tasks.

pub mod api;
pub mod error;
pub mod network;
pub mod store;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use api::{Book, Category, DownloadRecord, LibraryApi, ReadingProgress, UserProfile};
pub use network::{NetworkChangeStream, NetworkMonitor, NetworkStatus};
pub use store::KeyValueStore;
pub use time::{Clock, SystemClock};
