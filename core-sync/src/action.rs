//! Queued offline actions.
//!
//! Actions are created when a write cannot be confirmed against the remote
//! immediately, and removed only once the remote confirms the corresponding
//! operation. They are owned exclusively by the [`MutationQueue`]; no other
//! component mutates them.
//!
//! [`MutationQueue`]: crate::queue::MutationQueue

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The write operation a queued action replays against the remote.
///
/// Persisted as internally tagged JSON. Kinds written by a newer app version
/// deserialize to [`ActionKind::Unknown`] and are dropped on drain instead of
/// being retried forever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Record that the user downloaded a book.
    Download { book_id: String },
    /// Set or clear a favorite flag.
    FavoriteToggle { book_id: String, favorite: bool },
    /// Log a search query.
    SearchLogged { query: String },
    /// Persist a reading position.
    ProgressSaved {
        book_id: String,
        page: u32,
        total_pages: Option<u32>,
    },
    /// Unrecognized persisted kind.
    #[serde(other)]
    Unknown,
}

impl ActionKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Download { .. } => "download",
            Self::FavoriteToggle { .. } => "favorite_toggle",
            Self::SearchLogged { .. } => "search_logged",
            Self::ProgressSaved { .. } => "progress_saved",
            Self::Unknown => "unknown",
        }
    }
}

/// One pending write, queued until the remote confirms it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: String,
    #[serde(flatten)]
    pub kind: ActionKind,
    pub enqueued_at_ms: i64,
}

/// Generates queue-unique action ids.
///
/// A per-process instance tag combined with a monotonic counter: unique
/// within a session by the counter, across sessions by the instance tag.
/// (A time-plus-random scheme can collide under rapid enqueue.)
pub struct ActionIdGenerator {
    instance: String,
    counter: AtomicU64,
}

impl ActionIdGenerator {
    pub fn new() -> Self {
        let mut instance = Uuid::new_v4().simple().to_string();
        instance.truncate(8);
        Self {
            instance,
            counter: AtomicU64::new(0),
        }
    }

    pub fn next(&self) -> String {
        format!(
            "{}-{}",
            self.instance,
            self.counter.fetch_add(1, Ordering::Relaxed)
        )
    }
}

impl Default for ActionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
