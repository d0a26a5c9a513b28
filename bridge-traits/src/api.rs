//! Remote Library API Abstraction
//!
//! The hosted catalog service seen as a set of typed request functions.
//! Transport (HTTP, gRPC, a test script) is the implementor's concern; the
//! core only requires that every operation can fail and that the
//! write-side operations are idempotent on the server, since queued
//! mutations are delivered at-least-once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub page_count: Option<u32>,
    /// Unix millis when the entry was added to the catalog.
    #[serde(default)]
    pub added_at_ms: i64,
}

/// A catalog category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// One recorded download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub book_id: String,
    pub downloaded_at_ms: i64,
}

/// The signed-in user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Reading position within one book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub book_id: String,
    pub page: u32,
    #[serde(default)]
    pub total_pages: Option<u32>,
    pub updated_at_ms: i64,
}

/// Remote library data API.
///
/// All operations may fail with network or server errors; the core catches
/// those at its own boundaries (cache fallback on reads, queue retention on
/// writes) and never lets them propagate to the UI.
///
/// # Idempotency
///
/// `record_download`, `set_favorite`, `log_search` and `save_progress` must
/// be safe to call more than once with the same arguments: the mutation
/// queue cannot guarantee exactly-once across a crash between "remote call
/// succeeded" and "entry removed".
#[async_trait]
pub trait LibraryApi: Send + Sync {
    /// Fetch the book catalog, newest first, up to `limit` entries.
    async fn fetch_catalog(&self, limit: u32) -> Result<Vec<Book>>;

    /// Fetch all categories.
    async fn fetch_categories(&self) -> Result<Vec<Category>>;

    /// Fetch the user's download history, most recent first.
    async fn fetch_download_history(&self, limit: u32) -> Result<Vec<DownloadRecord>>;

    /// Fetch a single book by id.
    async fn fetch_book(&self, id: &str) -> Result<Book>;

    /// Record that the user downloaded a book.
    async fn record_download(&self, book_id: &str) -> Result<()>;

    /// Set or clear the favorite flag for a book.
    async fn set_favorite(&self, book_id: &str, favorite: bool) -> Result<()>;

    /// Log a search query for history/recommendations.
    async fn log_search(&self, query: &str) -> Result<()>;

    /// Persist a reading position.
    async fn save_progress(&self, progress: &ReadingProgress) -> Result<()>;
}
