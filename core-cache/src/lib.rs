//! # Offline Cache
//!
//! Typed collection caches over the device [`KeyValueStore`], plus the two
//! store adapters shipped with the core.
//!
//! ## Components
//!
//! - **Cache Entry** (`entry`): envelope pairing cached data with its write
//!   timestamp, the basis for staleness decisions
//! - **Cache Manager** (`manager`): per-collection read/write/invalidate
//!   operations (catalog, categories, downloads, book detail, profile,
//!   favorites, search history, reading progress)
//! - **Adapters** (`adapters`): SQLite-backed and in-memory
//!   [`KeyValueStore`] implementations
//!
//! Every cache collection is disposable: it can be deleted and rebuilt from
//! the remote source with no loss beyond temporary staleness. The cache is
//! also a hard failure boundary; storage and deserialization errors degrade
//! to empty/default values and are logged, never propagated.
//!
//! [`KeyValueStore`]: bridge_traits::store::KeyValueStore

pub mod adapters;
pub mod entry;
pub mod keys;
pub mod manager;

pub use adapters::{MemoryKeyValueStore, SqliteKeyValueStore};
pub use entry::CacheEntry;
pub use manager::CacheManager;
