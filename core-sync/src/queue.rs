//! Durable FIFO queue of offline write actions.
//!
//! Every mutation the user performs while unreachable lands here and is
//! replayed against the remote on the next drain. The queue is persisted as
//! one JSON list under a single key so it survives process restarts; the
//! in-memory copy is authoritative between persists.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use bridge_traits::{
    api::{LibraryApi, ReadingProgress},
    error::BridgeError,
    store::KeyValueStore,
    time::Clock,
};

use crate::action::{ActionIdGenerator, ActionKind, QueuedAction};

/// Store key holding the persisted queue.
pub const PENDING_ACTIONS_KEY: &str = "pending_actions";

/// Hard cap on queued actions. Past this, enqueue is refused rather than
/// letting an unreachable remote grow the store without bound.
const DEFAULT_MAX_LEN: usize = 500;

enum DispatchOutcome {
    Delivered,
    Dropped,
    Failed(BridgeError),
}

/// Persistent queue of pending remote writes.
///
/// All mutation goes through the internal mutex, so enqueue and drain are
/// serialized: a drain observes a consistent snapshot and no action is ever
/// dispatched twice concurrently.
pub struct MutationQueue {
    store: Arc<dyn KeyValueStore>,
    api: Arc<dyn LibraryApi>,
    clock: Arc<dyn Clock>,
    ids: ActionIdGenerator,
    pending: Mutex<Vec<QueuedAction>>,
    max_len: usize,
    rejected: AtomicU64,
}

impl MutationQueue {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        api: Arc<dyn LibraryApi>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::with_capacity(store, api, clock, DEFAULT_MAX_LEN)
    }

    pub fn with_capacity(
        store: Arc<dyn KeyValueStore>,
        api: Arc<dyn LibraryApi>,
        clock: Arc<dyn Clock>,
        max_len: usize,
    ) -> Self {
        Self {
            store,
            api,
            clock,
            ids: ActionIdGenerator::new(),
            pending: Mutex::new(Vec::new()),
            max_len,
            rejected: AtomicU64::new(0),
        }
    }

    /// Append an action. Returns `false` only when the queue is full; a
    /// failed persist still keeps the action in memory for this session.
    pub async fn enqueue(&self, kind: ActionKind) -> bool {
        let mut pending = self.pending.lock().await;
        if pending.len() >= self.max_len {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(
                len = pending.len(),
                kind = kind.label(),
                "Mutation queue full, rejecting action"
            );
            return false;
        }
        let action = QueuedAction {
            id: self.ids.next(),
            kind,
            enqueued_at_ms: self.clock.unix_timestamp_millis(),
        };
        debug!(id = %action.id, kind = action.kind.label(), "Queued offline action");
        pending.push(action);
        self.persist(&pending).await;
        true
    }

    /// Merge the persisted queue (a prior session's leftovers) into memory.
    /// Returns the pending count afterwards.
    pub async fn load(&self) -> usize {
        let mut pending = self.pending.lock().await;
        let persisted = self.load_persisted().await;
        Self::merge(&mut pending, persisted);
        pending.len()
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// How many enqueues this session refused because the queue was full.
    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    /// Replay every pending action against the remote, in enqueue order.
    ///
    /// Actions the remote confirms are removed; failed ones are retained in
    /// order for the next drain. Unrecognized kinds are dropped so one
    /// undecodable action cannot wedge the queue. Returns `true` when the
    /// queue is empty afterwards.
    ///
    /// The queue lock is held for the whole pass: a drain is atomic with
    /// respect to enqueues and other drains.
    pub async fn drain(&self) -> bool {
        let mut pending = self.pending.lock().await;
        let persisted = self.load_persisted().await;
        Self::merge(&mut pending, persisted);
        if pending.is_empty() {
            return true;
        }

        info!(count = pending.len(), "Draining mutation queue");
        let mut retained = Vec::new();
        for action in pending.drain(..) {
            match self.dispatch(&action.kind, action.enqueued_at_ms).await {
                DispatchOutcome::Delivered => {
                    debug!(id = %action.id, kind = action.kind.label(), "Action delivered");
                }
                DispatchOutcome::Dropped => {
                    warn!(id = %action.id, "Dropping unrecognized queued action");
                }
                DispatchOutcome::Failed(e) => {
                    warn!(id = %action.id, kind = action.kind.label(), error = %e,
                        "Action delivery failed, retaining for retry");
                    retained.push(action);
                }
            }
        }
        *pending = retained;
        self.persist(&pending).await;
        pending.is_empty()
    }

    /// Dispatch one action immediately, outside the queue.
    ///
    /// Used by the write path to attempt delivery before falling back to
    /// enqueueing. Does not touch pending state.
    pub async fn deliver_now(&self, kind: &ActionKind) -> Result<(), BridgeError> {
        match self
            .dispatch(kind, self.clock.unix_timestamp_millis())
            .await
        {
            DispatchOutcome::Delivered | DispatchOutcome::Dropped => Ok(()),
            DispatchOutcome::Failed(e) => Err(e),
        }
    }

    async fn dispatch(&self, kind: &ActionKind, enqueued_at_ms: i64) -> DispatchOutcome {
        let result = match kind {
            ActionKind::Download { book_id } => self.api.record_download(book_id).await,
            ActionKind::FavoriteToggle { book_id, favorite } => {
                self.api.set_favorite(book_id, *favorite).await
            }
            ActionKind::SearchLogged { query } => self.api.log_search(query).await,
            ActionKind::ProgressSaved {
                book_id,
                page,
                total_pages,
            } => {
                let progress = ReadingProgress {
                    book_id: book_id.clone(),
                    page: *page,
                    total_pages: *total_pages,
                    updated_at_ms: enqueued_at_ms,
                };
                self.api.save_progress(&progress).await
            }
            ActionKind::Unknown => return DispatchOutcome::Dropped,
        };
        match result {
            Ok(()) => DispatchOutcome::Delivered,
            Err(e) => DispatchOutcome::Failed(e),
        }
    }

    /// Fold persisted actions into the in-memory list, id-deduplicated,
    /// ordered by enqueue time.
    fn merge(pending: &mut Vec<QueuedAction>, persisted: Vec<QueuedAction>) {
        for action in persisted {
            if !pending.iter().any(|a| a.id == action.id) {
                pending.push(action);
            }
        }
        pending.sort_by(|a, b| {
            a.enqueued_at_ms
                .cmp(&b.enqueued_at_ms)
                .then_with(|| a.id.cmp(&b.id))
        });
    }

    async fn load_persisted(&self) -> Vec<QueuedAction> {
        let raw = match self.store.get(PENDING_ACTIONS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted queue");
                return Vec::new();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(actions) => actions,
            Err(e) => {
                warn!(error = %e, "Persisted queue corrupt, discarding");
                Vec::new()
            }
        }
    }

    async fn persist(&self, actions: &[QueuedAction]) {
        let raw = match serde_json::to_string(actions) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to serialize queue");
                return;
            }
        };
        if let Err(e) = self.store.set(PENDING_ACTIONS_KEY, &raw).await {
            warn!(error = %e, "Failed to persist queue");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use core_cache::adapters::MemoryKeyValueStore;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicI64, Ordering};

    use bridge_traits::api::{Book, Category, DownloadRecord};
    use bridge_traits::error::Result;

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

    /// Records write calls in order; fails the ones the test scripts.
    #[derive(Default)]
    struct ScriptedApi {
        calls: Mutex<Vec<String>>,
        failing: Mutex<HashSet<String>>,
    }

    impl ScriptedApi {
        async fn fail_call(&self, call: &str) {
            self.failing.lock().await.insert(call.to_string());
        }

        async fn heal(&self) {
            self.failing.lock().await.clear();
        }

        async fn calls(&self) -> Vec<String> {
            self.calls.lock().await.clone()
        }

        async fn record(&self, call: String) -> Result<()> {
            let failing = self.failing.lock().await.contains(&call);
            self.calls.lock().await.push(call);
            if failing {
                Err(BridgeError::Network("scripted failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl LibraryApi for ScriptedApi {
        async fn fetch_catalog(&self, _limit: u32) -> Result<Vec<Book>> {
            Ok(Vec::new())
        }

        async fn fetch_categories(&self) -> Result<Vec<Category>> {
            Ok(Vec::new())
        }

        async fn fetch_download_history(&self, _limit: u32) -> Result<Vec<DownloadRecord>> {
            Ok(Vec::new())
        }

        async fn fetch_book(&self, id: &str) -> Result<Book> {
            Err(BridgeError::NotFound(id.to_string()))
        }

        async fn record_download(&self, book_id: &str) -> Result<()> {
            self.record(format!("download:{book_id}")).await
        }

        async fn set_favorite(&self, book_id: &str, favorite: bool) -> Result<()> {
            self.record(format!("favorite:{book_id}:{favorite}")).await
        }

        async fn log_search(&self, query: &str) -> Result<()> {
            self.record(format!("search:{query}")).await
        }

        async fn save_progress(&self, progress: &ReadingProgress) -> Result<()> {
            self.record(format!("progress:{}:{}", progress.book_id, progress.page))
                .await
        }
    }

    fn setup() -> (
        Arc<MutationQueue>,
        Arc<MemoryKeyValueStore>,
        Arc<ScriptedApi>,
        Arc<ManualClock>,
    ) {
        let store = Arc::new(MemoryKeyValueStore::new());
        let api = Arc::new(ScriptedApi::default());
        let clock = Arc::new(ManualClock::new(1_000));
        let queue = Arc::new(MutationQueue::new(
            store.clone(),
            api.clone(),
            clock.clone(),
        ));
        (queue, store, api, clock)
    }

    #[tokio::test]
    async fn test_drain_delivers_in_enqueue_order() {
        let (queue, _, api, clock) = setup();
        queue
            .enqueue(ActionKind::Download {
                book_id: "b1".to_string(),
            })
            .await;
        clock.advance(1);
        queue
            .enqueue(ActionKind::SearchLogged {
                query: "dune".to_string(),
            })
            .await;
        clock.advance(1);
        queue
            .enqueue(ActionKind::FavoriteToggle {
                book_id: "b1".to_string(),
                favorite: true,
            })
            .await;

        assert!(queue.drain().await);
        assert_eq!(
            api.calls().await,
            vec!["download:b1", "search:dune", "favorite:b1:true"]
        );
        assert!(queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_failed_actions_retained_in_order() {
        let (queue, _, api, clock) = setup();
        api.fail_call("download:b2").await;

        for id in ["b1", "b2", "b3"] {
            queue
                .enqueue(ActionKind::Download {
                    book_id: id.to_string(),
                })
                .await;
            clock.advance(1);
        }

        assert!(!queue.drain().await);
        // Succeeding actions after the failure were still attempted.
        assert_eq!(
            api.calls().await,
            vec!["download:b1", "download:b2", "download:b3"]
        );
        assert_eq!(queue.len().await, 1);

        api.heal().await;
        assert!(queue.drain().await);
        assert_eq!(api.calls().await.last().unwrap(), "download:b2");
    }

    #[tokio::test]
    async fn test_queue_survives_restart() {
        let (queue, store, api, clock) = setup();
        queue
            .enqueue(ActionKind::SearchLogged {
                query: "solaris".to_string(),
            })
            .await;

        // A fresh queue over the same store is a process restart.
        let revived = MutationQueue::new(store.clone(), api.clone(), clock.clone());
        assert_eq!(revived.load().await, 1);
        assert!(revived.drain().await);
        assert_eq!(api.calls().await, vec!["search:solaris"]);
    }

    #[tokio::test]
    async fn test_unknown_kind_dropped_on_drain() {
        let (queue, store, api, _) = setup();
        store
            .set(
                PENDING_ACTIONS_KEY,
                r#"[{"id":"old-0","type":"annotate_margin","enqueued_at_ms":1},
                    {"id":"old-1","type":"download","book_id":"b1","enqueued_at_ms":2}]"#,
            )
            .await
            .unwrap();

        assert!(queue.drain().await);
        assert_eq!(api.calls().await, vec!["download:b1"]);
        // Dropped action is gone from the persisted queue too.
        let raw = store.get(PENDING_ACTIONS_KEY).await.unwrap().unwrap();
        assert!(!raw.contains("old-0"));
    }

    #[tokio::test]
    async fn test_corrupt_persisted_queue_discarded() {
        let (queue, store, _, _) = setup();
        store.set(PENDING_ACTIONS_KEY, "not json").await.unwrap();
        assert_eq!(queue.load().await, 0);
        assert!(queue.drain().await);
    }

    #[tokio::test]
    async fn test_enqueue_rejected_when_full() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let api = Arc::new(ScriptedApi::default());
        let clock = Arc::new(ManualClock::new(1_000));
        let queue = MutationQueue::with_capacity(store, api, clock, 2);

        assert!(
            queue
                .enqueue(ActionKind::SearchLogged {
                    query: "a".to_string()
                })
                .await
        );
        assert!(
            queue
                .enqueue(ActionKind::SearchLogged {
                    query: "b".to_string()
                })
                .await
        );
        assert!(
            !queue
                .enqueue(ActionKind::SearchLogged {
                    query: "c".to_string()
                })
                .await
        );
        assert_eq!(queue.len().await, 2);
        assert_eq!(queue.rejected_count(), 1);
    }

    #[tokio::test]
    async fn test_drain_empty_queue_is_trivially_complete() {
        let (queue, _, api, _) = setup();
        assert!(queue.drain().await);
        assert!(api.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_progress_action_carries_enqueue_time() {
        let (queue, _, api, clock) = setup();
        queue
            .enqueue(ActionKind::ProgressSaved {
                book_id: "b1".to_string(),
                page: 77,
                total_pages: Some(200),
            })
            .await;
        clock.advance(60_000);
        assert!(queue.drain().await);
        assert_eq!(api.calls().await, vec!["progress:b1:77"]);
    }
}
