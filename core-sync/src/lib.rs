//! Offline-first synchronization for the library core.
//!
//! Two halves: the [`MutationQueue`], a durable FIFO of writes performed
//! while the remote was unreachable, and the [`SyncCoordinator`], which
//! schedules full pulls, drains the queue when connectivity returns, and
//! exposes the local-first write path.
//!
//! Reads never go through this crate; the data accessor talks to the cache
//! and the remote directly and only consults the coordinator for status.

pub mod action;
pub mod coordinator;
pub mod error;
pub mod queue;

pub use action::{ActionKind, QueuedAction};
pub use coordinator::{SyncConfig, SyncCoordinator, SyncStatus, WriteOutcome};
pub use error::{Result, SyncError};
pub use queue::MutationQueue;
