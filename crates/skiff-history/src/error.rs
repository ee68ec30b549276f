//! Error types for session-history operations.

use skiff_types::NavigableId;
use thiserror::Error;

use crate::entry::EntryId;

/// Errors that can occur when collaborators misuse the engine API.
///
/// Traversal outcomes (cancellation, disallowed initiators) are *not*
/// errors — see `HistoryStepResult`. These are for handles that don't
/// resolve: stale navigable ids, tombstoned entries, operations against a
/// traversable that has already been torn down.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Navigable not present in this traversable's tree.
    #[error("navigable not found: {0:?}")]
    NavigableNotFound(NavigableId),

    /// Entry slot is unoccupied (never allocated or already tombstoned).
    #[error("session history entry not found: {0:?}")]
    EntryNotFound(EntryId),

    /// The traversable has been destroyed; no further operations are valid.
    #[error("traversable has been destroyed")]
    Destroyed,

    /// A child navigable cannot be attached because the parent has no
    /// active entry to carry its nested history.
    #[error("parent navigable {0:?} has no active session history entry")]
    ParentHasNoActiveEntry(NavigableId),
}
