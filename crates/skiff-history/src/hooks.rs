//! Collaborator interfaces.
//!
//! The engine decides *which* document is current and *when* swaps happen;
//! everything that touches actual documents — firing events, prompting the
//! user, unloading, fetching a replacement — crosses one of these traits.
//! Every method defaults to the permissive no-op, so a host only implements
//! what it observes.
//!
//! Hook methods are the engine's only suspension points: script runs inside
//! them, and script may submit new traversal requests through a clone of the
//! traversal queue handle. That reentrancy is expected and safe — nested
//! requests are queued, never run inline.

use skiff_types::{
    DocumentId, NavigableId, NavigationApiKey, SerializedState, UserNavigationInvolvement,
    VisibilityState,
};
use url::Url;

/// Snapshot of the navigation source taken when a traversal was requested,
/// passed through to permission checks. Opaque to the engine.
#[derive(Clone, Debug, Default)]
pub struct SourceSnapshotParams {
    /// Whether the source had transient user activation at request time.
    pub has_transient_activation: bool,
    /// Origin of the source document at request time.
    pub source_origin: Option<url::Origin>,
}

/// Document lifecycle collaborator.
pub trait DocumentHooks {
    /// Whether the document has a beforeunload handler worth consulting.
    fn has_beforeunload_listener(&self, _doc: DocumentId) -> bool {
        false
    }

    /// Run the beforeunload prompt. `true` means proceed with unloading.
    fn confirm_unload(&mut self, _doc: DocumentId) -> bool {
        true
    }

    /// Whether the document has an interested navigate-event listener.
    fn has_navigate_event_listener(&self, _doc: DocumentId) -> bool {
        false
    }

    /// Fire the traverse navigate event. `true` means proceed; `false`
    /// means script canceled the traversal.
    fn fire_traverse_navigate_event(
        &mut self,
        _doc: DocumentId,
        _destination: &Url,
        _key: NavigationApiKey,
        _involvement: UserNavigationInvolvement,
    ) -> bool {
        true
    }

    /// Whether the initiator document may navigate the target document.
    fn allowed_to_navigate(
        &self,
        _initiator: DocumentId,
        _target: DocumentId,
        _snapshot: Option<&SourceSnapshotParams>,
    ) -> bool {
        true
    }

    /// The document is being taken out of service.
    fn unload_document(&mut self, _doc: DocumentId) {}

    /// A document is becoming the active document of a navigable.
    fn activate_document(&mut self, _nav: NavigableId, _doc: DocumentId, _url: &Url) {}

    /// Produce a fresh document for an entry whose document is gone or
    /// being reloaded. `None` leaves the entry unpopulated (the swap is
    /// skipped; the host retries on a later step).
    fn repopulate_document(&mut self, _nav: NavigableId, _url: &Url) -> Option<DocumentId> {
        None
    }

    /// Same-document traversal: deliver the entry's URL and classic state.
    fn apply_history_state(&mut self, _doc: DocumentId, _url: &Url, _state: &SerializedState) {}

    /// Update the script-visible `history.length` / index pair.
    fn update_history_object(&mut self, _doc: DocumentId, _length: u64, _index: u64) {}

    /// The traversable's system visibility changed.
    fn visibility_changed(&mut self, _doc: DocumentId, _state: VisibilityState) {}
}

/// A hooks implementation that observes nothing and permits everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl DocumentHooks for NoopHooks {}
