//! Joint session history for a tree of navigables.
//!
//! A top-level [`TraversableNavigable`] owns the complete session history
//! of one frame tree: every [`SessionHistoryEntry`] for every navigable,
//! one shared step counter, and the queues that serialize mutation. A
//! single back button press can change what several frames display at
//! once; this crate computes which frames those are, asks their documents
//! for permission, and swaps them atomically or not at all.
//!
//! # Architecture
//!
//! - [`entry`] — the entry pool (arena, tombstoned slots) and the entries
//!   themselves.
//! - [`navigable`] — the frame tree, ids only, no document ownership.
//! - [`document_state`] — per-entry document records, including the nested
//!   history lists that give child frames their place in joint history.
//! - [`traversable`] — the orchestrator: step resolution, affected sets,
//!   cancellation, application.
//! - [`queue`] — the traversal queue with its synchronous lane.
//! - [`hooks`] — the collaborator traits where script and documents live.
//! - [`screenshot`], [`storage`] — auxiliary per-traversable services.
//!
//! The engine never touches real documents. Everything observable — event
//! firing, prompting, unloading, fetching — crosses [`DocumentHooks`], so
//! the whole state machine is deterministic and testable in isolation.

pub mod document_state;
pub mod entry;
pub mod error;
pub mod hooks;
pub mod navigable;
pub mod queue;
pub mod screenshot;
pub mod storage;
pub mod traversable;

pub use document_state::{DocumentState, NestedHistory};
pub use entry::{EntryId, EntryParams, EntryPool, PolicyContainer, SessionHistoryEntry};
pub use error::HistoryError;
pub use hooks::{DocumentHooks, NoopHooks, SourceSnapshotParams};
pub use navigable::{Navigable, NavigableTree};
pub use queue::{QueueEntry, QueuedTask, SyncDisposition, TraversalQueue};
pub use screenshot::{ScreenshotQueue, ScreenshotTask, Snapshot, SnapshotRenderer};
pub use storage::{StorageBucket, StorageShed};
pub use traversable::{
    CheckIfUnloadingIsCanceledResult, HistoryObjectLengthAndIndex, HistoryStepResult,
    TraversableNavigable, TraversableOptions,
};

/// Convenience alias for fallible engine operations.
pub type Result<T> = std::result::Result<T, HistoryError>;
