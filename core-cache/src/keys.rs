//! Storage keys for the cached collections.
//!
//! Keys are shared between the cache manager and the sync coordinator (which
//! clears the bulk collections on force refresh and checks staleness).

/// Bulk catalog cache.
pub const BOOKS: &str = "cached_books";
/// Category list cache.
pub const CATEGORIES: &str = "cached_categories";
/// Download history cache.
pub const DOWNLOADS: &str = "cached_downloads";
/// Individually fetched book details, upserted by id.
pub const BOOK_DETAILS: &str = "cached_book_details";
/// Signed-in user profile.
pub const USER_PROFILE: &str = "cached_user_profile";
/// Favorite book ids (deduplicated list).
pub const FAVORITES: &str = "favorite_books";
/// Recent search queries, most recent first.
pub const SEARCH_HISTORY: &str = "search_history";
/// Reading positions, upserted by book id.
pub const READING_PROGRESS: &str = "reading_progress";
/// Unix millis of the last successful full sync.
pub const LAST_SYNC: &str = "last_sync_at";

/// Collections removed by a force refresh. The mutation queue and user-state
/// collections (favorites, search history, reading progress) survive.
pub const BULK_COLLECTIONS: [&str; 3] = [BOOKS, CATEGORIES, DOWNLOADS];

/// Collections subject to age-based expiry.
pub const EXPIRING_COLLECTIONS: [&str; 5] =
    [BOOKS, CATEGORIES, DOWNLOADS, BOOK_DETAILS, USER_PROFILE];
