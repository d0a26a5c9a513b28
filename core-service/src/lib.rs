//! Host-facing facade over the library core.
//!
//! Embedding hosts construct a [`LibraryCore`] from their platform bridges
//! (storage, network, remote API), call [`LibraryCore::start`] once, and
//! talk to the accessor for reads and the coordinator for sync and writes.
//! Everything underneath is wired here so the host never assembles the
//! cache, queue and coordinator by hand.

pub mod accessor;
pub mod error;
pub mod logging;

use std::sync::Arc;

use tracing::info;

use bridge_traits::{
    api::LibraryApi,
    network::NetworkMonitor,
    store::KeyValueStore,
    time::{Clock, SystemClock},
};
use core_cache::{adapters::SqliteKeyValueStore, CacheManager};
use core_sync::{MutationQueue, SyncCoordinator};

pub use accessor::{BookFilter, BookQuery, BookSort, DataAccessor, DataResult};
pub use core_sync::{SyncConfig, SyncStatus, WriteOutcome};
pub use error::{CoreError, Result};
pub use logging::{init_logging, LogFormat, LoggingConfig};

/// Platform bridges the host must provide.
pub struct CoreDependencies {
    pub store: Arc<dyn KeyValueStore>,
    pub api: Arc<dyn LibraryApi>,
    pub network: Arc<dyn NetworkMonitor>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Bridges with the real system clock.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        api: Arc<dyn LibraryApi>,
        network: Arc<dyn NetworkMonitor>,
    ) -> Self {
        Self {
            store,
            api,
            network,
            clock: Arc::new(SystemClock),
        }
    }
}

/// The assembled core: cache, queue, coordinator and accessor sharing one
/// store and one clock.
pub struct LibraryCore {
    cache: Arc<CacheManager>,
    coordinator: Arc<SyncCoordinator>,
    accessor: Arc<DataAccessor>,
}

impl LibraryCore {
    pub fn new(deps: CoreDependencies, config: SyncConfig) -> Self {
        let cache = Arc::new(CacheManager::new(deps.store.clone(), deps.clock.clone()));
        let queue = Arc::new(MutationQueue::new(
            deps.store,
            deps.api.clone(),
            deps.clock.clone(),
        ));
        let coordinator = Arc::new(SyncCoordinator::new(
            config.clone(),
            deps.api.clone(),
            cache.clone(),
            queue,
            deps.network.clone(),
            deps.clock,
        ));
        let accessor = Arc::new(DataAccessor::new(
            deps.api,
            cache.clone(),
            deps.network,
            config,
        ));
        Self {
            cache,
            coordinator,
            accessor,
        }
    }

    /// Convenience constructor for hosts that use the bundled SQLite store.
    pub async fn with_sqlite(
        database_url: &str,
        api: Arc<dyn LibraryApi>,
        network: Arc<dyn NetworkMonitor>,
        config: SyncConfig,
    ) -> Result<Self> {
        let store = SqliteKeyValueStore::connect(database_url)
            .await
            .map_err(|e| CoreError::Initialization(e.to_string()))?;
        Ok(Self::new(
            CoreDependencies::new(Arc::new(store), api, network),
            config,
        ))
    }

    /// Restore queued actions from the previous session and start the
    /// connectivity listener.
    pub async fn start(&self) -> Result<()> {
        self.coordinator.clone().start().await?;
        info!("Library core started");
        Ok(())
    }

    /// Stop the connectivity listener. The core remains usable for reads
    /// and queued writes.
    pub async fn stop(&self) {
        self.coordinator.stop().await;
        info!("Library core stopped");
    }

    pub fn data(&self) -> Arc<DataAccessor> {
        self.accessor.clone()
    }

    pub fn sync(&self) -> Arc<SyncCoordinator> {
        self.coordinator.clone()
    }

    pub fn cache(&self) -> Arc<CacheManager> {
        self.cache.clone()
    }

    pub async fn status(&self) -> SyncStatus {
        self.coordinator.status().await
    }

    // Write-path shortcuts, mirrored from the coordinator so hosts with a
    // thin binding layer only need one handle.

    pub async fn record_download(&self, book_id: &str) -> WriteOutcome {
        self.coordinator.record_download(book_id).await
    }

    pub async fn toggle_favorite(&self, book_id: &str) -> bool {
        self.coordinator.toggle_favorite(book_id).await
    }

    pub async fn log_search(&self, query: &str) -> WriteOutcome {
        self.coordinator.log_search(query).await
    }

    pub async fn save_progress(
        &self,
        book_id: &str,
        page: u32,
        total_pages: Option<u32>,
    ) -> WriteOutcome {
        self.coordinator.save_progress(book_id, page, total_pages).await
    }
}
