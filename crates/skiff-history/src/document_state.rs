//! Per-entry document state.
//!
//! A `DocumentState` is the exclusively-owned record of the document a
//! session history entry represents: the opaque document handle, its
//! origin, and the nested history lists of any child navigables that were
//! alive while this document was active. The document *content* lives with
//! external collaborators; the engine owns only this record.

use skiff_types::{DocumentId, NavigableId};
use url::Origin;

use crate::entry::EntryId;

/// The session history list of one child navigable, stored inside the
/// parent document's state. This is where non-top-level entry lists live:
/// the traversable holds the top-level list, and every deeper list hangs
/// off the document state of an entry one level up.
#[derive(Clone, Debug)]
pub struct NestedHistory {
    /// The child navigable this list belongs to.
    pub id: NavigableId,
    /// Entry slots in the owning traversable's pool, chronological order.
    pub entries: Vec<EntryId>,
}

/// Document metadata owned by a single session history entry.
#[derive(Clone, Debug)]
pub struct DocumentState {
    /// Handle to the live document, if one is currently materialized.
    /// `None` means traversing here requires repopulating from the network.
    pub document: Option<DocumentId>,
    /// Origin of the document, used for synchronous-navigation policy.
    pub origin: Option<Origin>,
    /// Set when a reload has been requested for this entry; forces the
    /// cross-document path on the next step application.
    pub reload_pending: bool,
    /// Whether this state has ever held a materialized document.
    pub ever_populated: bool,
    /// The `target` name the navigable had when this entry was created.
    pub navigable_target_name: String,
    /// History lists of child navigables under this document.
    pub nested_histories: Vec<NestedHistory>,
}

impl DocumentState {
    /// A state for a freshly materialized document.
    pub fn new(document: Option<DocumentId>, origin: Option<Origin>) -> Self {
        Self {
            ever_populated: document.is_some(),
            document,
            origin,
            reload_pending: false,
            navigable_target_name: String::new(),
            nested_histories: Vec::new(),
        }
    }

    /// Find the nested history for a child navigable, if present.
    pub fn nested_history(&self, id: NavigableId) -> Option<&NestedHistory> {
        self.nested_histories.iter().find(|nh| nh.id == id)
    }

    /// Mutable variant of [`nested_history`](Self::nested_history).
    pub fn nested_history_mut(&mut self, id: NavigableId) -> Option<&mut NestedHistory> {
        self.nested_histories.iter_mut().find(|nh| nh.id == id)
    }

    /// Remove a child navigable's nested history, returning its entry slots
    /// so the caller can tombstone them.
    pub fn remove_nested_history(&mut self, id: NavigableId) -> Option<NestedHistory> {
        let pos = self.nested_histories.iter().position(|nh| nh.id == id)?;
        Some(self.nested_histories.remove(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_with_document_is_populated() {
        let doc = DocumentId::new();
        let state = DocumentState::new(Some(doc), None);
        assert_eq!(state.document, Some(doc));
        assert!(state.ever_populated);
        assert!(!state.reload_pending);
    }

    #[test]
    fn test_new_without_document() {
        let state = DocumentState::new(None, None);
        assert_eq!(state.document, None);
        assert!(!state.ever_populated);
    }

    #[test]
    fn test_nested_history_lookup_and_removal() {
        let mut state = DocumentState::new(Some(DocumentId::new()), None);
        let child = NavigableId::new();
        state.nested_histories.push(NestedHistory { id: child, entries: vec![] });

        assert!(state.nested_history(child).is_some());
        assert!(state.nested_history(NavigableId::new()).is_none());

        let removed = state.remove_nested_history(child).unwrap();
        assert_eq!(removed.id, child);
        assert!(state.nested_history(child).is_none());
    }
}
