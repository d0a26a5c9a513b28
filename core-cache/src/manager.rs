//! Cache manager: typed collection caches over the key-value store.
//!
//! Each logical collection is one JSON [`CacheEntry`] under one key. Reads
//! always return whatever is cached, valid or not; staleness is surfaced to
//! callers through [`CacheManager::is_cache_valid`], never hidden by
//! refusing a read. Storage and deserialization failures degrade to the
//! empty/default value with a `warn!`; the cache must never be the reason a
//! screen crashes.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use bridge_traits::{
    api::{Book, Category, DownloadRecord, ReadingProgress, UserProfile},
    store::KeyValueStore,
    time::Clock,
};

use crate::entry::CacheEntry;
use crate::keys;

/// Maximum retained search queries.
const SEARCH_HISTORY_LIMIT: usize = 20;

/// Typed read/write/invalidate operations over the cached collections.
pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
}

impl CacheManager {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    // ------------------------------------------------------------------
    // Bulk collections
    // ------------------------------------------------------------------

    /// Replace the cached catalog wholesale.
    pub async fn cache_books(&self, books: &[Book]) -> bool {
        self.write_entry(keys::BOOKS, books).await
    }

    /// Cached catalog, `[]` when absent.
    pub async fn get_cached_books(&self) -> Vec<Book> {
        self.read_collection(keys::BOOKS).await
    }

    pub async fn cache_categories(&self, categories: &[Category]) -> bool {
        self.write_entry(keys::CATEGORIES, categories).await
    }

    pub async fn get_cached_categories(&self) -> Vec<Category> {
        self.read_collection(keys::CATEGORIES).await
    }

    pub async fn cache_downloads(&self, records: &[DownloadRecord]) -> bool {
        self.write_entry(keys::DOWNLOADS, records).await
    }

    pub async fn get_cached_downloads(&self) -> Vec<DownloadRecord> {
        self.read_collection(keys::DOWNLOADS).await
    }

    // ------------------------------------------------------------------
    // Single-book detail
    // ------------------------------------------------------------------

    /// Upsert one book into the detail cache (find-by-id, replace-or-append).
    ///
    /// Detail views are fetched individually, so this is the one collection
    /// that merges at item granularity instead of replacing wholesale.
    pub async fn cache_book_detail(&self, book: &Book) -> bool {
        let mut details: Vec<Book> = self.read_collection(keys::BOOK_DETAILS).await;
        match details.iter_mut().find(|b| b.id == book.id) {
            Some(existing) => *existing = book.clone(),
            None => details.push(book.clone()),
        }
        self.write_entry(keys::BOOK_DETAILS, &details).await
    }

    pub async fn get_cached_book_detail(&self, id: &str) -> Option<Book> {
        self.read_collection::<Book>(keys::BOOK_DETAILS)
            .await
            .into_iter()
            .find(|b| b.id == id)
    }

    // ------------------------------------------------------------------
    // User profile
    // ------------------------------------------------------------------

    pub async fn cache_user_profile(&self, profile: &UserProfile) -> bool {
        self.write_entry(keys::USER_PROFILE, profile).await
    }

    pub async fn get_cached_user_profile(&self) -> Option<UserProfile> {
        self.read_entry::<UserProfile>(keys::USER_PROFILE)
            .await
            .map(|e| e.data)
    }

    // ------------------------------------------------------------------
    // Favorites
    // ------------------------------------------------------------------

    /// Add a book to the favorites set. Idempotent: adding a present id is a
    /// successful no-op.
    pub async fn add_favorite(&self, book_id: &str) -> bool {
        let mut favorites = self.favorites().await;
        if favorites.iter().any(|id| id == book_id) {
            return true;
        }
        favorites.push(book_id.to_string());
        self.write_entry(keys::FAVORITES, &favorites).await
    }

    /// Remove a book from the favorites set. Removing an absent id is a
    /// successful no-op.
    pub async fn remove_favorite(&self, book_id: &str) -> bool {
        let mut favorites = self.favorites().await;
        let before = favorites.len();
        favorites.retain(|id| id != book_id);
        if favorites.len() == before {
            return true;
        }
        self.write_entry(keys::FAVORITES, &favorites).await
    }

    pub async fn is_favorite(&self, book_id: &str) -> bool {
        self.favorites().await.iter().any(|id| id == book_id)
    }

    pub async fn favorites(&self) -> Vec<String> {
        self.read_collection(keys::FAVORITES).await
    }

    // ------------------------------------------------------------------
    // Search history
    // ------------------------------------------------------------------

    /// Record a search query: trimmed, case-insensitively deduplicated,
    /// most recent first, capped at 20.
    pub async fn log_search(&self, query: &str) -> bool {
        let query = query.trim();
        if query.is_empty() {
            return true;
        }
        let mut history = self.search_history().await;
        history.retain(|q| !q.eq_ignore_ascii_case(query));
        history.insert(0, query.to_string());
        history.truncate(SEARCH_HISTORY_LIMIT);
        self.write_entry(keys::SEARCH_HISTORY, &history).await
    }

    pub async fn search_history(&self) -> Vec<String> {
        self.read_collection(keys::SEARCH_HISTORY).await
    }

    // ------------------------------------------------------------------
    // Reading progress
    // ------------------------------------------------------------------

    /// Upsert the reading position for one book.
    pub async fn save_progress(&self, progress: &ReadingProgress) -> bool {
        let mut all: Vec<ReadingProgress> = self.read_collection(keys::READING_PROGRESS).await;
        match all.iter_mut().find(|p| p.book_id == progress.book_id) {
            Some(existing) => *existing = progress.clone(),
            None => all.push(progress.clone()),
        }
        self.write_entry(keys::READING_PROGRESS, &all).await
    }

    pub async fn get_progress(&self, book_id: &str) -> Option<ReadingProgress> {
        self.read_collection::<ReadingProgress>(keys::READING_PROGRESS)
            .await
            .into_iter()
            .find(|p| p.book_id == book_id)
    }

    // ------------------------------------------------------------------
    // Staleness & lifecycle
    // ------------------------------------------------------------------

    /// Whether the entry under `key` was written within `max_age_ms`.
    /// An absent entry is invalid.
    pub async fn is_cache_valid(&self, key: &str, max_age_ms: i64) -> bool {
        match self.read_entry::<serde_json::Value>(key).await {
            Some(entry) => entry.is_valid(self.clock.unix_timestamp_millis(), max_age_ms),
            None => false,
        }
    }

    /// Remove expiring collections older than `max_age_ms`.
    ///
    /// Intended to run opportunistically after a successful sync, not on
    /// every read. Favorites, search history and reading progress are user
    /// state and never expire.
    pub async fn clean_expired(&self, max_age_ms: i64) {
        for key in keys::EXPIRING_COLLECTIONS {
            let stale = match self.read_entry::<serde_json::Value>(key).await {
                Some(entry) => !entry.is_valid(self.clock.unix_timestamp_millis(), max_age_ms),
                None => false,
            };
            if stale {
                debug!(key, "Removing expired cache entry");
                if let Err(e) = self.store.remove(key).await {
                    warn!(key, error = %e, "Failed to remove expired cache entry");
                }
            }
        }
    }

    /// Delete the bulk collections (catalog, categories, downloads).
    /// User state and the mutation queue are untouched.
    pub async fn clear_bulk_collections(&self) -> bool {
        match self.store.clear(&keys::BULK_COLLECTIONS).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to clear bulk collections");
                false
            }
        }
    }

    pub async fn set_last_sync(&self, at_ms: i64) -> bool {
        match self.store.set(keys::LAST_SYNC, &at_ms.to_string()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to record last sync time");
                false
            }
        }
    }

    pub async fn last_sync(&self) -> Option<i64> {
        match self.store.get(keys::LAST_SYNC).await {
            Ok(Some(raw)) => raw.parse().ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read last sync time");
                None
            }
        }
    }

    /// Whether any catalog data is available for offline browsing.
    pub async fn has_offline_data(&self) -> bool {
        match self.store.has_key(keys::BOOKS).await {
            Ok(present) => present,
            Err(e) => {
                warn!(error = %e, "Failed to check for offline data");
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Envelope plumbing
    // ------------------------------------------------------------------

    async fn read_entry<T: DeserializeOwned>(&self, key: &str) -> Option<CacheEntry<T>> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed, treating as empty");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(key, error = %e, "Cache entry corrupt, discarding");
                None
            }
        }
    }

    async fn read_collection<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.read_entry::<Vec<T>>(key)
            .await
            .map(|e| e.data)
            .unwrap_or_default()
    }

    async fn write_entry<T: Serialize + ?Sized>(&self, key: &str, data: &T) -> bool {
        let entry = CacheEntry::new(data, self.clock.unix_timestamp_millis());
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize cache entry");
                return false;
            }
        };
        match self.store.set(key, &raw).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Cache write failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryKeyValueStore;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::atomic::{AtomicI64, Ordering};

    /// Clock that only moves when the test advances it.
    struct ManualClock {
        now_ms: AtomicI64,
    }

    impl ManualClock {
        fn new(now_ms: i64) -> Self {
            Self {
                now_ms: AtomicI64::new(now_ms),
            }
        }

        fn advance(&self, ms: i64) {
            self.now_ms.fetch_add(ms, Ordering::SeqCst);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            Utc.timestamp_millis_opt(self.now_ms.load(Ordering::SeqCst))
                .unwrap()
        }
    }

    fn book(id: &str, title: &str) -> Book {
        Book {
            id: id.to_string(),
            title: title.to_string(),
            author: "Author".to_string(),
            category: None,
            cover_url: None,
            page_count: None,
            added_at_ms: 0,
        }
    }

    fn setup() -> (CacheManager, Arc<MemoryKeyValueStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryKeyValueStore::default());
        let clock = Arc::new(ManualClock::new(1_000));
        let manager = CacheManager::new(store.clone(), clock.clone());
        (manager, store, clock)
    }

    #[tokio::test]
    async fn test_collection_round_trip() {
        let (cache, _, _) = setup();
        let books = vec![book("b1", "Dune"), book("b2", "Solaris")];
        assert!(cache.cache_books(&books).await);
        assert_eq!(cache.get_cached_books().await, books);
    }

    #[tokio::test]
    async fn test_empty_collection_round_trip() {
        let (cache, _, _) = setup();
        assert!(cache.cache_books(&[]).await);
        assert_eq!(cache.get_cached_books().await, Vec::<Book>::new());
        // Entry exists even though the list is empty.
        assert!(cache.has_offline_data().await);
    }

    #[tokio::test]
    async fn test_absent_collection_reads_empty() {
        let (cache, _, _) = setup();
        assert!(cache.get_cached_books().await.is_empty());
        assert!(cache.get_cached_categories().await.is_empty());
        assert!(!cache.has_offline_data().await);
    }

    #[tokio::test]
    async fn test_written_at_strictly_increases() {
        let (cache, store, clock) = setup();
        cache.cache_books(&[book("b1", "Dune")]).await;
        let first: CacheEntry<Vec<Book>> =
            serde_json::from_str(&store.get(keys::BOOKS).await.unwrap().unwrap()).unwrap();

        clock.advance(1);
        cache.cache_books(&[book("b2", "Solaris")]).await;
        let second: CacheEntry<Vec<Book>> =
            serde_json::from_str(&store.get(keys::BOOKS).await.unwrap().unwrap()).unwrap();

        assert!(second.written_at_ms > first.written_at_ms);
    }

    #[tokio::test]
    async fn test_cache_validity_window() {
        let (cache, _, clock) = setup();
        cache.cache_books(&[book("b1", "Dune")]).await;
        assert!(cache.is_cache_valid(keys::BOOKS, 10_000).await);

        clock.advance(10_000);
        assert!(!cache.is_cache_valid(keys::BOOKS, 10_000).await);
        // Absent entry is invalid.
        assert!(!cache.is_cache_valid(keys::CATEGORIES, 10_000).await);
    }

    #[tokio::test]
    async fn test_reads_ignore_staleness() {
        let (cache, _, clock) = setup();
        let books = vec![book("b1", "Dune")];
        cache.cache_books(&books).await;
        clock.advance(1_000_000);
        assert_eq!(cache.get_cached_books().await, books);
    }

    #[tokio::test]
    async fn test_book_detail_upsert() {
        let (cache, _, _) = setup();
        cache.cache_book_detail(&book("b1", "Dune")).await;
        cache.cache_book_detail(&book("b2", "Solaris")).await;
        cache.cache_book_detail(&book("b1", "Dune Messiah")).await;

        let detail = cache.get_cached_book_detail("b1").await.unwrap();
        assert_eq!(detail.title, "Dune Messiah");
        // Replace-or-append: still exactly two entries.
        let all: Vec<Book> = cache.read_collection(keys::BOOK_DETAILS).await;
        assert_eq!(all.len(), 2);
        assert!(cache.get_cached_book_detail("b3").await.is_none());
    }

    #[tokio::test]
    async fn test_favorite_toggle_idempotent() {
        let (cache, _, _) = setup();
        assert!(cache.add_favorite("b1").await);
        assert!(cache.add_favorite("b1").await);
        assert_eq!(cache.favorites().await, vec!["b1".to_string()]);
        assert!(cache.is_favorite("b1").await);

        assert!(cache.remove_favorite("b1").await);
        assert!(cache.remove_favorite("b1").await);
        assert!(cache.favorites().await.is_empty());
        assert!(!cache.is_favorite("b1").await);
    }

    #[tokio::test]
    async fn test_search_history_dedup_and_cap() {
        let (cache, _, _) = setup();
        cache.log_search("dune").await;
        cache.log_search("solaris").await;
        cache.log_search("  DUNE  ").await;

        // Case-insensitive dedup, most recent first, trimmed.
        assert_eq!(
            cache.search_history().await,
            vec!["DUNE".to_string(), "solaris".to_string()]
        );

        for i in 0..30 {
            cache.log_search(&format!("query {i}")).await;
        }
        let history = cache.search_history().await;
        assert_eq!(history.len(), SEARCH_HISTORY_LIMIT);
        assert_eq!(history[0], "query 29");
    }

    #[tokio::test]
    async fn test_blank_search_not_logged() {
        let (cache, _, _) = setup();
        assert!(cache.log_search("   ").await);
        assert!(cache.search_history().await.is_empty());
    }

    #[tokio::test]
    async fn test_reading_progress_upsert() {
        let (cache, _, _) = setup();
        let first = ReadingProgress {
            book_id: "b1".to_string(),
            page: 10,
            total_pages: Some(300),
            updated_at_ms: 1_000,
        };
        let second = ReadingProgress {
            page: 42,
            ..first.clone()
        };
        cache.save_progress(&first).await;
        cache.save_progress(&second).await;
        assert_eq!(cache.get_progress("b1").await.unwrap().page, 42);
        assert!(cache.get_progress("b2").await.is_none());
    }

    #[tokio::test]
    async fn test_clear_bulk_keeps_user_state() {
        let (cache, _, _) = setup();
        cache.cache_books(&[book("b1", "Dune")]).await;
        cache.cache_categories(&[]).await;
        cache.add_favorite("b1").await;
        cache.log_search("dune").await;

        assert!(cache.clear_bulk_collections().await);
        assert!(cache.get_cached_books().await.is_empty());
        assert!(!cache.has_offline_data().await);
        assert_eq!(cache.favorites().await, vec!["b1".to_string()]);
        assert_eq!(cache.search_history().await, vec!["dune".to_string()]);
    }

    #[tokio::test]
    async fn test_clean_expired_removes_only_old_entries() {
        let (cache, store, clock) = setup();
        cache.cache_books(&[book("b1", "Dune")]).await;
        clock.advance(5_000);
        cache.cache_categories(&[Category {
            id: "c1".to_string(),
            name: "Sci-fi".to_string(),
        }])
        .await;

        clock.advance(6_000);
        // Books are 11s old, categories 6s old.
        cache.clean_expired(10_000).await;
        assert!(store.get(keys::BOOKS).await.unwrap().is_none());
        assert!(!cache.get_cached_categories().await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_entry_degrades_to_empty() {
        let (cache, store, _) = setup();
        store.set(keys::BOOKS, "not json").await.unwrap();
        assert!(cache.get_cached_books().await.is_empty());
        assert!(!cache.is_cache_valid(keys::BOOKS, i64::MAX).await);
    }

    #[tokio::test]
    async fn test_last_sync_round_trip() {
        let (cache, _, _) = setup();
        assert!(cache.last_sync().await.is_none());
        cache.set_last_sync(123_456).await;
        assert_eq!(cache.last_sync().await, Some(123_456));
    }

    #[tokio::test]
    async fn test_user_profile_round_trip() {
        let (cache, _, _) = setup();
        let profile = UserProfile {
            id: "u1".to_string(),
            display_name: "Reader".to_string(),
            email: None,
        };
        cache.cache_user_profile(&profile).await;
        assert_eq!(cache.get_cached_user_profile().await, Some(profile));
    }
}
