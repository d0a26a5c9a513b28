//! Read path: live fetch with write-through, cache fallback when offline.
//!
//! Every read resolves the same way: if the device is reachable and the
//! caller did not ask for cache-only, try the remote and write the result
//! through to the cache; otherwise, or when the fetch fails, serve whatever
//! the cache holds. The result always says which tier it came from, so the
//! UI can show an offline indicator instead of an error dialog.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use bridge_traits::{
    api::{Book, Category, DownloadRecord, LibraryApi, ReadingProgress, UserProfile},
    network::NetworkMonitor,
};
use core_cache::CacheManager;
use core_sync::SyncConfig;

/// Outcome of one read: the data plus where it came from.
///
/// `error` is set only when the result is empty AND the live path was
/// wanted but unavailable; the one case the UI cannot paper over with
/// cached data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataResult<T> {
    pub data: T,
    /// `true` when served from cache instead of the remote.
    pub is_offline: bool,
    /// When the last full sync completed, unix millis.
    pub last_sync_ms: Option<i64>,
    pub error: Option<String>,
}

impl<T> DataResult<T> {
    fn fresh(data: T, last_sync_ms: Option<i64>) -> Self {
        Self {
            data,
            is_offline: false,
            last_sync_ms,
            error: None,
        }
    }

    fn cached(data: T, last_sync_ms: Option<i64>, error: Option<String>) -> Self {
        Self {
            data,
            is_offline: true,
            last_sync_ms,
            error,
        }
    }
}

/// In-memory filter over the catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookFilter {
    /// Exact category match.
    pub category: Option<String>,
    /// Case-insensitive substring match on title or author.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookSort {
    TitleAsc,
    TitleDesc,
    Newest,
    Oldest,
}

/// Catalog read parameters. `Default` is the plain unfiltered listing.
/// Deserializable so hosts can hand queries across a binding layer as JSON.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookQuery {
    pub filter: Option<BookFilter>,
    pub sort: Option<BookSort>,
    /// Skip the live fetch even when reachable.
    pub cache_only: bool,
}

/// Two-tier reads over the remote library and the local cache.
pub struct DataAccessor {
    api: Arc<dyn LibraryApi>,
    cache: Arc<CacheManager>,
    network: Arc<dyn NetworkMonitor>,
    config: SyncConfig,
}

impl DataAccessor {
    pub fn new(
        api: Arc<dyn LibraryApi>,
        cache: Arc<CacheManager>,
        network: Arc<dyn NetworkMonitor>,
        config: SyncConfig,
    ) -> Self {
        Self {
            api,
            cache,
            network,
            config,
        }
    }

    /// Catalog listing, filtered and sorted in memory.
    pub async fn books(&self, query: &BookQuery) -> DataResult<Vec<Book>> {
        let last_sync = self.cache.last_sync().await;

        if !query.cache_only && self.network.is_connected().await {
            match self.api.fetch_catalog(self.config.catalog_page_size).await {
                Ok(books) => {
                    self.cache.cache_books(&books).await;
                    return DataResult::fresh(Self::apply_query(books, query), last_sync);
                }
                Err(e) => {
                    warn!(error = %e, "Live catalog fetch failed, serving cache");
                    let cached = Self::apply_query(self.cache.get_cached_books().await, query);
                    let error = cached.is_empty().then(|| e.to_string());
                    return DataResult::cached(cached, last_sync, error);
                }
            }
        }

        debug!(cache_only = query.cache_only, "Serving catalog from cache");
        let cached = Self::apply_query(self.cache.get_cached_books().await, query);
        let error = (cached.is_empty() && !query.cache_only)
            .then(|| "offline with no cached catalog".to_string());
        DataResult::cached(cached, last_sync, error)
    }

    pub async fn categories(&self, cache_only: bool) -> DataResult<Vec<Category>> {
        let last_sync = self.cache.last_sync().await;

        if !cache_only && self.network.is_connected().await {
            match self.api.fetch_categories().await {
                Ok(categories) => {
                    self.cache.cache_categories(&categories).await;
                    return DataResult::fresh(categories, last_sync);
                }
                Err(e) => {
                    warn!(error = %e, "Live categories fetch failed, serving cache");
                    let cached = self.cache.get_cached_categories().await;
                    let error = cached.is_empty().then(|| e.to_string());
                    return DataResult::cached(cached, last_sync, error);
                }
            }
        }

        let cached = self.cache.get_cached_categories().await;
        let error =
            (cached.is_empty() && !cache_only).then(|| "offline with no cached data".to_string());
        DataResult::cached(cached, last_sync, error)
    }

    pub async fn download_history(&self, cache_only: bool) -> DataResult<Vec<DownloadRecord>> {
        let last_sync = self.cache.last_sync().await;

        if !cache_only && self.network.is_connected().await {
            match self
                .api
                .fetch_download_history(self.config.history_page_size)
                .await
            {
                Ok(records) => {
                    self.cache.cache_downloads(&records).await;
                    return DataResult::fresh(records, last_sync);
                }
                Err(e) => {
                    warn!(error = %e, "Live download history fetch failed, serving cache");
                    let cached = self.cache.get_cached_downloads().await;
                    let error = cached.is_empty().then(|| e.to_string());
                    return DataResult::cached(cached, last_sync, error);
                }
            }
        }

        let cached = self.cache.get_cached_downloads().await;
        let error =
            (cached.is_empty() && !cache_only).then(|| "offline with no cached data".to_string());
        DataResult::cached(cached, last_sync, error)
    }

    /// One book by id. A live fetch writes through to the detail cache so
    /// the book stays readable offline afterwards.
    pub async fn book_detail(&self, id: &str, cache_only: bool) -> DataResult<Option<Book>> {
        let last_sync = self.cache.last_sync().await;

        if !cache_only && self.network.is_connected().await {
            match self.api.fetch_book(id).await {
                Ok(book) => {
                    self.cache.cache_book_detail(&book).await;
                    return DataResult::fresh(Some(book), last_sync);
                }
                Err(e) => {
                    warn!(book_id = id, error = %e, "Live book fetch failed, serving cache");
                    let cached = self.cached_book(id).await;
                    let error = cached.is_none().then(|| e.to_string());
                    return DataResult::cached(cached, last_sync, error);
                }
            }
        }

        let cached = self.cached_book(id).await;
        let error = (cached.is_none() && !cache_only)
            .then(|| format!("offline and book {id} not cached"));
        DataResult::cached(cached, last_sync, error)
    }

    /// Detail cache first, catalog cache as a fallback: a book seen in a
    /// cached listing is still presentable offline without a detail fetch.
    async fn cached_book(&self, id: &str) -> Option<Book> {
        match self.cache.get_cached_book_detail(id).await {
            Some(book) => Some(book),
            None => self
                .cache
                .get_cached_books()
                .await
                .into_iter()
                .find(|b| b.id == id),
        }
    }

    // Local-only state: never fetched live, so no offline flag to report.

    pub async fn user_profile(&self) -> Option<UserProfile> {
        self.cache.get_cached_user_profile().await
    }

    pub async fn reading_progress(&self, book_id: &str) -> Option<ReadingProgress> {
        self.cache.get_progress(book_id).await
    }

    pub async fn search_history(&self) -> Vec<String> {
        self.cache.search_history().await
    }

    pub async fn favorites(&self) -> Vec<String> {
        self.cache.favorites().await
    }

    pub async fn is_favorite(&self, book_id: &str) -> bool {
        self.cache.is_favorite(book_id).await
    }

    fn apply_query(mut books: Vec<Book>, query: &BookQuery) -> Vec<Book> {
        if let Some(filter) = &query.filter {
            if let Some(category) = &filter.category {
                books.retain(|b| b.category.as_deref() == Some(category.as_str()));
            }
            if let Some(needle) = &filter.search {
                let needle = needle.to_lowercase();
                books.retain(|b| {
                    b.title.to_lowercase().contains(&needle)
                        || b.author.to_lowercase().contains(&needle)
                });
            }
        }
        match query.sort {
            Some(BookSort::TitleAsc) => {
                books.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
            }
            Some(BookSort::TitleDesc) => {
                books.sort_by(|a, b| b.title.to_lowercase().cmp(&a.title.to_lowercase()))
            }
            Some(BookSort::Newest) => books.sort_by(|a, b| b.added_at_ms.cmp(&a.added_at_ms)),
            Some(BookSort::Oldest) => books.sort_by_key(|b| b.added_at_ms),
            None => {}
        }
        books
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book_at(id: &str, title: &str, category: &str, added_at_ms: i64) -> Book {
        Book {
            id: id.to_string(),
            title: title.to_string(),
            author: "Author".to_string(),
            category: Some(category.to_string()),
            cover_url: None,
            page_count: None,
            added_at_ms,
        }
    }

    fn shelf() -> Vec<Book> {
        vec![
            book_at("b1", "Solaris", "scifi", 30),
            book_at("b2", "dune", "scifi", 10),
            book_at("b3", "Middlemarch", "classic", 20),
        ]
    }

    #[test]
    fn test_filter_by_category() {
        let query = BookQuery {
            filter: Some(BookFilter {
                category: Some("scifi".to_string()),
                search: None,
            }),
            ..Default::default()
        };
        let result = DataAccessor::apply_query(shelf(), &query);
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|b| b.category.as_deref() == Some("scifi")));
    }

    #[test]
    fn test_search_matches_title_and_author_case_insensitive() {
        let query = BookQuery {
            filter: Some(BookFilter {
                category: None,
                search: Some("DUNE".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(DataAccessor::apply_query(shelf(), &query).len(), 1);

        let by_author = BookQuery {
            filter: Some(BookFilter {
                category: None,
                search: Some("author".to_string()),
            }),
            ..Default::default()
        };
        assert_eq!(DataAccessor::apply_query(shelf(), &by_author).len(), 3);
    }

    #[test]
    fn test_sort_orders() {
        let titles = |sort| {
            let query = BookQuery {
                sort: Some(sort),
                ..Default::default()
            };
            DataAccessor::apply_query(shelf(), &query)
                .into_iter()
                .map(|b| b.id)
                .collect::<Vec<_>>()
        };
        // Title sort is case-insensitive: "dune" sorts before "Middlemarch".
        assert_eq!(titles(BookSort::TitleAsc), vec!["b2", "b3", "b1"]);
        assert_eq!(titles(BookSort::TitleDesc), vec!["b1", "b3", "b2"]);
        assert_eq!(titles(BookSort::Newest), vec!["b1", "b3", "b2"]);
        assert_eq!(titles(BookSort::Oldest), vec!["b2", "b3", "b1"]);
    }

    #[test]
    fn test_query_deserializes_from_json() {
        let query: BookQuery =
            serde_json::from_str(r#"{"filter":{"search":"dune"},"sort":"title_asc"}"#).unwrap();
        assert_eq!(query.sort, Some(BookSort::TitleAsc));
        assert!(!query.cache_only);
        assert_eq!(DataAccessor::apply_query(shelf(), &query).len(), 1);
    }

    #[test]
    fn test_default_query_preserves_input_order() {
        let query = BookQuery::default();
        let ids: Vec<String> = DataAccessor::apply_query(shelf(), &query)
            .into_iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec!["b1", "b2", "b3"]);
    }
}
