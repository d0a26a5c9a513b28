//! Key-value store adapters.
//!
//! Concrete [`KeyValueStore`](bridge_traits::store::KeyValueStore)
//! implementations: SQLite for devices, in-memory for tests and ephemeral
//! hosts.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryKeyValueStore;
pub use sqlite::SqliteKeyValueStore;
