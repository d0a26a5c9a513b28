//! Device Storage Abstraction
//!
//! Provides a platform-agnostic key-value store for the offline cache and the
//! mutation queue. This trait is the only place raw device storage I/O
//! happens; everything above it (cache manager, mutation queue) is engine
//! agnostic, so the backing store can be swapped without touching cache or
//! queue logic.

use async_trait::async_trait;

use crate::error::Result;

/// Durable key-value store scoped to the device.
///
/// Values are opaque strings; callers layer their own serialization on top
/// (the core stores JSON). Implementations exist for:
/// - Desktop/mobile: SQLite
/// - Tests and ephemeral hosts: in-memory map
///
/// # Example
///
/// ```ignore
/// use bridge_traits::store::KeyValueStore;
///
/// async fn remember(store: &dyn KeyValueStore) -> bridge_traits::error::Result<()> {
///     store.set("last_opened_book", "book-42").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieve a value, `Ok(None)` when the key is absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value, replacing any previous value under the key.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a key. Deleting an absent key is a successful no-op.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Delete a set of keys in one call. Absent keys are skipped.
    async fn clear(&self, keys: &[&str]) -> Result<()>;

    /// Check for a key without retrieving the value.
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
