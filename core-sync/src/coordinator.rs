//! Synchronization coordinator.
//!
//! Single entry point for keeping the local cache and the remote library in
//! agreement: full pulls on demand or on a freshness interval, queue drains
//! when connectivity returns, and the write path that prefers immediate
//! delivery but falls back to queueing.
//!
//! One sync runs at a time. Overlapping triggers (pull-to-refresh during a
//! foreground sync, a connectivity event mid-drain) are rejected, not
//! queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use bridge_traits::{
    api::{DownloadRecord, LibraryApi, ReadingProgress},
    network::{NetworkMonitor, NetworkStatus},
    time::Clock,
};
use core_cache::CacheManager;

use crate::action::ActionKind;
use crate::error::{Result, SyncError};
use crate::queue::MutationQueue;

/// Tunables for sync scheduling and pull sizes.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Minimum age of the last sync before [`SyncCoordinator::auto_sync`]
    /// triggers a full pass.
    pub auto_sync_interval_secs: u64,
    /// Age past which cached pull data is evicted after a successful sync.
    pub cache_max_age_secs: u64,
    /// Page size for catalog pulls.
    pub catalog_page_size: u32,
    /// Page size for download-history pulls.
    pub history_page_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            auto_sync_interval_secs: 30 * 60,
            cache_max_age_secs: 7 * 24 * 60 * 60,
            catalog_page_size: 100,
            history_page_size: 50,
        }
    }
}

/// Snapshot of sync state for the host UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub last_sync_ms: Option<i64>,
    pub queue_length: usize,
    pub is_online: bool,
    pub sync_in_progress: bool,
    pub has_offline_data: bool,
    /// Writes refused this session because the queue was full. Nonzero means
    /// user actions were lost and the host should prompt for a sync.
    pub rejected_writes: u64,
}

/// How a write entry point resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOutcome {
    /// The remote confirmed the operation immediately.
    Confirmed,
    /// Queued for delivery on the next drain. The local cache already
    /// reflects the write.
    Deferred,
    /// The queue was full; the local cache reflects the write but the
    /// remote will never see it.
    Rejected,
}

impl WriteOutcome {
    pub fn is_confirmed(self) -> bool {
        self == Self::Confirmed
    }
}

struct ListenerHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Orchestrates pulls, drains and the write path.
pub struct SyncCoordinator {
    config: SyncConfig,
    api: Arc<dyn LibraryApi>,
    cache: Arc<CacheManager>,
    queue: Arc<MutationQueue>,
    network: Arc<dyn NetworkMonitor>,
    clock: Arc<dyn Clock>,
    syncing: AtomicBool,
    listener: Mutex<Option<ListenerHandle>>,
}

impl SyncCoordinator {
    pub fn new(
        config: SyncConfig,
        api: Arc<dyn LibraryApi>,
        cache: Arc<CacheManager>,
        queue: Arc<MutationQueue>,
        network: Arc<dyn NetworkMonitor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            api,
            cache,
            queue,
            network,
            clock,
            syncing: AtomicBool::new(false),
            listener: Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------
    // Sync passes
    // ------------------------------------------------------------------

    /// Full sync: pull catalog, categories and download history into the
    /// cache, then drain the mutation queue.
    ///
    /// Returns `true` when all three pulls succeeded. Offline or while
    /// another sync is running, returns `false` without side effects.
    #[instrument(skip(self))]
    pub async fn sync_all(&self) -> bool {
        if !self.network.is_connected().await {
            debug!("Offline, skipping sync");
            return false;
        }
        if !self.begin_sync() {
            debug!("Sync already in progress, skipping");
            return false;
        }
        let result = self.run_full_sync().await;
        self.end_sync();
        result
    }

    /// Sync only when the last successful sync is older than the configured
    /// interval.
    pub async fn auto_sync(&self) -> bool {
        let interval_ms = self.config.auto_sync_interval_secs as i64 * 1000;
        if let Some(last) = self.cache.last_sync().await {
            let age_ms = self.clock.unix_timestamp_millis() - last;
            if age_ms < interval_ms {
                debug!(age_ms, "Cache fresh, skipping auto sync");
                return false;
            }
        }
        self.sync_all().await
    }

    /// Drain the mutation queue without pulling. Cheap enough for
    /// connectivity-restored and app-foregrounded triggers.
    ///
    /// Returns `true` when the queue is empty afterwards.
    pub async fn background_sync(&self) -> bool {
        if !self.network.is_connected().await {
            debug!("Offline, skipping background sync");
            return false;
        }
        if !self.begin_sync() {
            debug!("Sync already in progress, skipping background sync");
            return false;
        }
        let result = self.queue.drain().await;
        self.end_sync();
        result
    }

    /// Discard the cached bulk collections and pull fresh. User state and
    /// the queue survive; a failed pull leaves the cache empty rather than
    /// resurrecting the discarded data.
    pub async fn force_refresh(&self) -> bool {
        if !self.network.is_connected().await {
            debug!("Offline, refusing forced refresh");
            return false;
        }
        info!("Forced refresh, clearing bulk collections");
        self.cache.clear_bulk_collections().await;
        self.sync_all().await
    }

    pub async fn status(&self) -> SyncStatus {
        SyncStatus {
            last_sync_ms: self.cache.last_sync().await,
            queue_length: self.queue.load().await,
            is_online: self.network.is_connected().await,
            sync_in_progress: self.syncing.load(Ordering::SeqCst),
            has_offline_data: self.cache.has_offline_data().await,
            rejected_writes: self.queue.rejected_count(),
        }
    }

    async fn run_full_sync(&self) -> bool {
        let mut pulls_ok = true;

        match self.api.fetch_catalog(self.config.catalog_page_size).await {
            Ok(books) => {
                debug!(count = books.len(), "Pulled catalog");
                self.cache.cache_books(&books).await;
            }
            Err(e) => {
                warn!(error = %e, "Catalog pull failed");
                pulls_ok = false;
            }
        }

        match self.api.fetch_categories().await {
            Ok(categories) => {
                debug!(count = categories.len(), "Pulled categories");
                self.cache.cache_categories(&categories).await;
            }
            Err(e) => {
                warn!(error = %e, "Categories pull failed");
                pulls_ok = false;
            }
        }

        match self
            .api
            .fetch_download_history(self.config.history_page_size)
            .await
        {
            Ok(records) => {
                debug!(count = records.len(), "Pulled download history");
                self.cache.cache_downloads(&records).await;
            }
            Err(e) => {
                warn!(error = %e, "Download history pull failed");
                pulls_ok = false;
            }
        }

        if !self.queue.drain().await {
            debug!("Mutation queue not fully drained");
        }

        if pulls_ok {
            self.cache
                .set_last_sync(self.clock.unix_timestamp_millis())
                .await;
            self.cache
                .clean_expired(self.config.cache_max_age_secs as i64 * 1000)
                .await;
            info!("Sync completed");
        } else {
            warn!("Sync finished with failed pulls, last sync time unchanged");
        }
        pulls_ok
    }

    fn begin_sync(&self) -> bool {
        self.syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn end_sync(&self) {
        self.syncing.store(false, Ordering::SeqCst);
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Record a download: prepend to the cached history, then deliver or
    /// queue.
    pub async fn record_download(&self, book_id: &str) -> WriteOutcome {
        let mut records = self.cache.get_cached_downloads().await;
        records.insert(
            0,
            DownloadRecord {
                book_id: book_id.to_string(),
                downloaded_at_ms: self.clock.unix_timestamp_millis(),
            },
        );
        self.cache.cache_downloads(&records).await;

        self.apply_remote(ActionKind::Download {
            book_id: book_id.to_string(),
        })
        .await
    }

    /// Flip the favorite flag for a book locally, then deliver or queue.
    /// Returns the new membership state; delivery is observable through
    /// [`status`](Self::status) (`queue_length`, `rejected_writes`).
    pub async fn toggle_favorite(&self, book_id: &str) -> bool {
        let favorite = !self.cache.is_favorite(book_id).await;
        if favorite {
            self.cache.add_favorite(book_id).await;
        } else {
            self.cache.remove_favorite(book_id).await;
        }

        self.apply_remote(ActionKind::FavoriteToggle {
            book_id: book_id.to_string(),
            favorite,
        })
        .await;
        favorite
    }

    /// Record a search query locally, then deliver or queue. Blank queries
    /// are ignored; nothing is pending for them, so they report `Confirmed`.
    pub async fn log_search(&self, query: &str) -> WriteOutcome {
        let query = query.trim();
        if query.is_empty() {
            return WriteOutcome::Confirmed;
        }
        self.cache.log_search(query).await;

        self.apply_remote(ActionKind::SearchLogged {
            query: query.to_string(),
        })
        .await
    }

    /// Save a reading position locally, then deliver or queue.
    pub async fn save_progress(
        &self,
        book_id: &str,
        page: u32,
        total_pages: Option<u32>,
    ) -> WriteOutcome {
        let progress = ReadingProgress {
            book_id: book_id.to_string(),
            page,
            total_pages,
            updated_at_ms: self.clock.unix_timestamp_millis(),
        };
        self.cache.save_progress(&progress).await;

        self.apply_remote(ActionKind::ProgressSaved {
            book_id: book_id.to_string(),
            page,
            total_pages,
        })
        .await
    }

    /// Deliver immediately when online; queue on failure or when offline.
    /// The local cache was already updated by the caller. A full queue is
    /// the one case where the write will never reach the remote, and it is
    /// reported as such rather than folded into the deferred case.
    async fn apply_remote(&self, kind: ActionKind) -> WriteOutcome {
        let label = kind.label();
        if self.network.is_connected().await {
            match self.queue.deliver_now(&kind).await {
                Ok(()) => return WriteOutcome::Confirmed,
                Err(e) => {
                    warn!(kind = label, error = %e, "Immediate delivery failed, queueing")
                }
            }
        }
        if self.queue.enqueue(kind).await {
            WriteOutcome::Deferred
        } else {
            error!(kind = label, "Mutation queue full, write will not reach the remote");
            WriteOutcome::Rejected
        }
    }

    // ------------------------------------------------------------------
    // Connectivity listener
    // ------------------------------------------------------------------

    /// Hydrate the queue from a prior session and start the reachability
    /// listener. An offline-to-online transition triggers a queue drain.
    pub async fn start(self: Arc<Self>) -> Result<()> {
        let mut listener = self.listener.lock().await;
        if listener.is_some() {
            return Err(SyncError::ListenerAlreadyStarted);
        }

        let pending = self.queue.load().await;
        if pending > 0 {
            info!(pending, "Restored queued actions from a prior session");
        }

        let mut stream = self
            .network
            .subscribe_changes()
            .await
            .map_err(|e| SyncError::Subscribe(e.to_string()))?;

        let token = CancellationToken::new();
        let task_token = token.clone();
        let coordinator = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let mut online = coordinator.network.is_connected().await;
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    status = stream.next() => {
                        let Some(status) = status else { break };
                        let now_online = matches!(status, NetworkStatus::Connected);
                        if now_online && !online {
                            info!("Connectivity restored, draining offline queue");
                            coordinator.background_sync().await;
                        }
                        online = now_online;
                    }
                }
            }
            debug!("Network listener stopped");
        });

        *listener = Some(ListenerHandle { token, handle });
        Ok(())
    }

    /// Stop the reachability listener. Idempotent.
    pub async fn stop(&self) {
        let handle = self.listener.lock().await.take();
        if let Some(ListenerHandle { token, handle }) = handle {
            token.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "Network listener task panicked");
            }
        }
    }
}
