//! Cache entry envelope.

use serde::{Deserialize, Serialize};

/// One cached collection with its write timestamp.
///
/// A whole logical collection (e.g. every cached book) lives in a single
/// entry under one key; collections are small and refreshed wholesale, so
/// replace-on-write is the simplest correct policy. `written_at_ms` is
/// non-decreasing per key across overwrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub written_at_ms: i64,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, written_at_ms: i64) -> Self {
        Self {
            data,
            written_at_ms,
        }
    }

    /// Age-based validity check. Used to decide whether a background
    /// refresh is warranted, never to gate reads.
    pub fn is_valid(&self, now_ms: i64, max_age_ms: i64) -> bool {
        now_ms - self.written_at_ms < max_age_ms
    }
}
