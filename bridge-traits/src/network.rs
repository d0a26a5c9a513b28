//! Network Reachability Abstraction
//!
//! Provides connectivity information so the core can decide between live
//! fetches and cache fallback, and defer queued mutations until the device
//! is back online.

use async_trait::async_trait;

use crate::error::Result;

/// Network connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Connected to a network
    Connected,
    /// Not connected to any network
    Disconnected,
    /// Connection status unknown or indeterminate
    Indeterminate,
}

/// Network reachability monitor.
///
/// The core treats anything other than [`NetworkStatus::Connected`] as
/// offline: an unknown status must never trigger a live fetch that would
/// otherwise have been served from cache.
///
/// # Platform Support
///
/// - **iOS**: Network framework, Reachability
/// - **Android**: ConnectivityManager
/// - **Desktop**: system network APIs
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Get the current network status.
    async fn status(&self) -> NetworkStatus;

    /// Check whether the device is currently reachable.
    ///
    /// Indeterminate counts as offline.
    async fn is_connected(&self) -> bool {
        matches!(self.status().await, NetworkStatus::Connected)
    }

    /// Subscribe to reachability changes.
    ///
    /// Implementations emit an update whenever the status changes. The
    /// returned stream is owned by the subscriber and must be dropped (or
    /// the owning task cancelled) to release the underlying platform
    /// observer.
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

/// Stream of reachability updates.
#[async_trait]
pub trait NetworkChangeStream: Send {
    /// Get the next status update, `None` when the stream is closed.
    async fn next(&mut self) -> Option<NetworkStatus>;
}
