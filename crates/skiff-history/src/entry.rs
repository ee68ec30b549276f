//! Session history entries and the arena they live in.
//!
//! Entries are referenced everywhere by [`EntryId`] — a slot index into the
//! owning traversable's [`EntryPool`] — never by pointer. History lists
//! (the traversable's top-level list and every nested history) are plain
//! `Vec<EntryId>`. Mutations append or tombstone slots; they never move
//! live entries, so an id captured before a step stays valid while script
//! runs mid-step.

use std::fmt;

use skiff_types::{
    BrowsingContextId, NavigationApiId, NavigationApiKey, ScrollRestorationMode, SerializedState,
};
use url::{Origin, Url};

use crate::document_state::DocumentState;

/// Slot index of an entry in its traversable's [`EntryPool`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u32);

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.0)
    }
}

/// Auxiliary per-entry security metadata, carried opaquely.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PolicyContainer {
    /// Serialized CSP list; the engine only stores and copies it.
    pub csp_list: Vec<String>,
    /// Referrer policy token.
    pub referrer_policy: Option<String>,
}

/// One point in history for one navigable.
///
/// Immutable-ish: after creation only `step`, the script-visible state
/// slots, and the document state are touched, and only by the owning
/// traversable during step application.
#[derive(Clone, Debug)]
pub struct SessionHistoryEntry {
    /// The history position this entry was created for. Steps are not
    /// necessarily contiguous with list neighbors: positions are skipped
    /// and reused when entries are shared across navigables at different
    /// tree depths.
    pub step: i64,
    /// The address this entry represents.
    pub url: Url,
    /// Exclusively owned document record.
    pub document_state: DocumentState,
    /// Classic `history.state`, initialized to serialized `null`.
    pub classic_history_api_state: SerializedState,
    /// Navigation API state, initialized to serialized `undefined`.
    pub navigation_api_state: SerializedState,
    /// Script-observable identity shared across replace-in-place.
    pub navigation_api_key: NavigationApiKey,
    /// Script-observable identity unique to this entry instance.
    pub navigation_api_id: NavigationApiId,
    /// How scroll position is restored when traversing here.
    pub scroll_restoration_mode: ScrollRestorationMode,
    /// Security policies captured at entry creation.
    pub policy_container: Option<PolicyContainer>,
    /// The browsing context `name` at entry creation.
    pub browsing_context_name: Option<String>,
    /// Non-owning back-reference to the context that initiated this entry.
    /// The context may be long gone; callers must treat this as optional.
    pub original_source_browsing_context: Option<BrowsingContextId>,
}

/// Inputs for creating a fresh entry. Everything the engine can't invent:
/// the address, the materialized document (if any), and provenance.
#[derive(Clone, Debug, Default)]
pub struct EntryParams {
    pub url: Option<Url>,
    pub document: Option<skiff_types::DocumentId>,
    pub origin: Option<Origin>,
    pub browsing_context_name: Option<String>,
    pub original_source_browsing_context: Option<BrowsingContextId>,
    pub policy_container: Option<PolicyContainer>,
}

impl SessionHistoryEntry {
    /// Create a fresh entry at the given step with default script state and
    /// a new navigation API identity pair.
    pub fn new(step: i64, params: EntryParams) -> Self {
        let url = params
            .url
            .unwrap_or_else(|| Url::parse("about:blank").unwrap());
        let mut document_state = DocumentState::new(params.document, params.origin);
        if let Some(name) = &params.browsing_context_name {
            document_state.navigable_target_name = name.clone();
        }
        Self {
            step,
            url,
            document_state,
            classic_history_api_state: SerializedState::null(),
            navigation_api_state: SerializedState::undefined(),
            navigation_api_key: NavigationApiKey::new(),
            navigation_api_id: NavigationApiId::new(),
            scroll_restoration_mode: ScrollRestorationMode::Auto,
            policy_container: params.policy_container,
            browsing_context_name: params.browsing_context_name,
            original_source_browsing_context: params.original_source_browsing_context,
        }
    }
}

/// Arena of session history entries for one traversable.
///
/// Slots are tombstoned on removal, never compacted, so `EntryId`s held in
/// history lists stay stable across unrelated mutations.
#[derive(Debug, Default)]
pub struct EntryPool {
    slots: Vec<Option<SessionHistoryEntry>>,
}

impl EntryPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry, returning its slot id.
    pub fn insert(&mut self, entry: SessionHistoryEntry) -> EntryId {
        let id = EntryId(self.slots.len() as u32);
        self.slots.push(Some(entry));
        id
    }

    pub fn get(&self, id: EntryId) -> Option<&SessionHistoryEntry> {
        self.slots.get(id.0 as usize).and_then(|s| s.as_ref())
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut SessionHistoryEntry> {
        self.slots.get_mut(id.0 as usize).and_then(|s| s.as_mut())
    }

    /// Look up an entry that a history list claims to own.
    ///
    /// Panics if the slot is tombstoned — a list pointing at a dead slot is
    /// an invariant violation, not a runtime condition.
    pub fn entry(&self, id: EntryId) -> &SessionHistoryEntry {
        match self.get(id) {
            Some(entry) => entry,
            None => panic!("history list references dead entry slot {id:?}"),
        }
    }

    /// Mutable variant of [`entry`](Self::entry); same panic contract.
    pub fn entry_mut(&mut self, id: EntryId) -> &mut SessionHistoryEntry {
        match self.slots.get_mut(id.0 as usize).and_then(|s| s.as_mut()) {
            Some(entry) => entry,
            None => panic!("history list references dead entry slot {id:?}"),
        }
    }

    /// Tombstone a single slot, returning the entry.
    pub fn remove(&mut self, id: EntryId) -> Option<SessionHistoryEntry> {
        self.slots.get_mut(id.0 as usize).and_then(|s| s.take())
    }

    /// Tombstone an entry and, recursively, every entry in its nested
    /// histories. Used when forward history is cleared or a subtree of
    /// navigables goes away.
    pub fn remove_subtree(&mut self, id: EntryId) {
        if let Some(entry) = self.remove(id) {
            for nested in &entry.document_state.nested_histories {
                for &child in &nested.entries {
                    self.remove_subtree(child);
                }
            }
        }
    }

    /// Number of live (non-tombstoned) entries.
    pub fn live_len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Iterate over live entries with their slot ids.
    pub fn iter_live(&self) -> impl Iterator<Item = (EntryId, &SessionHistoryEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|e| (EntryId(i as u32), e)))
    }

    /// Clear every slot. Only valid during traversable destruction.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Clone an entry into a fresh slot.
    ///
    /// Per the cloning contract: `step`, `url`, both state blobs, the
    /// navigation API key *and* id, scroll restoration, policy container,
    /// context name, and the source back-reference are copied verbatim;
    /// the document state is deep-cloned (nested histories recursively get
    /// fresh slots) so the clone's lifecycle is independent.
    pub fn clone_entry(&mut self, id: EntryId) -> Option<EntryId> {
        let original = self.get(id)?.clone();
        let mut cloned = original;
        let nested = std::mem::take(&mut cloned.document_state.nested_histories);
        let new_id = self.insert(cloned);
        let mut new_nested = Vec::with_capacity(nested.len());
        for nh in nested {
            let mut entries = Vec::with_capacity(nh.entries.len());
            for child in nh.entries {
                if let Some(child_clone) = self.clone_entry(child) {
                    entries.push(child_clone);
                }
            }
            new_nested.push(crate::document_state::NestedHistory { id: nh.id, entries });
        }
        if let Some(entry) = self.get_mut(new_id) {
            entry.document_state.nested_histories = new_nested;
        }
        Some(new_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_state::NestedHistory;
    use skiff_types::{DocumentId, NavigableId};

    fn entry_at(step: i64, url: &str) -> SessionHistoryEntry {
        SessionHistoryEntry::new(
            step,
            EntryParams {
                url: Some(Url::parse(url).unwrap()),
                document: Some(DocumentId::new()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_new_entry_defaults() {
        let entry = entry_at(0, "https://example.com/");
        assert_eq!(entry.step, 0);
        assert!(!entry.classic_history_api_state.is_undefined());
        assert!(entry.navigation_api_state.is_undefined());
        assert_ne!(
            entry.navigation_api_key.to_hex(),
            entry.navigation_api_id.to_hex()
        );
        assert_eq!(entry.scroll_restoration_mode, ScrollRestorationMode::Auto);
    }

    #[test]
    fn test_pool_insert_get_remove() {
        let mut pool = EntryPool::new();
        let id = pool.insert(entry_at(0, "https://example.com/"));
        assert_eq!(pool.get(id).unwrap().step, 0);
        assert_eq!(pool.live_len(), 1);

        pool.remove(id);
        assert!(pool.get(id).is_none());
        assert_eq!(pool.live_len(), 0);
    }

    #[test]
    fn test_ids_stay_stable_after_removal() {
        let mut pool = EntryPool::new();
        let a = pool.insert(entry_at(0, "https://a.test/"));
        let b = pool.insert(entry_at(1, "https://b.test/"));
        pool.remove(a);
        // Tombstoning a must not move b.
        assert_eq!(pool.get(b).unwrap().step, 1);
    }

    #[test]
    #[should_panic(expected = "dead entry slot")]
    fn test_entry_panics_on_tombstone() {
        let mut pool = EntryPool::new();
        let id = pool.insert(entry_at(0, "https://example.com/"));
        pool.remove(id);
        pool.entry(id);
    }

    #[test]
    fn test_clone_copies_identity_verbatim() {
        let mut pool = EntryPool::new();
        let id = pool.insert(entry_at(3, "https://example.com/page"));
        let clone_id = pool.clone_entry(id).unwrap();

        let (orig, clone) = (pool.get(id).unwrap(), pool.get(clone_id).unwrap());
        assert_eq!(orig.step, clone.step);
        assert_eq!(orig.url, clone.url);
        assert_eq!(orig.navigation_api_key, clone.navigation_api_key);
        assert_eq!(orig.navigation_api_id, clone.navigation_api_id);
        assert_eq!(orig.classic_history_api_state, clone.classic_history_api_state);
    }

    #[test]
    fn test_clone_document_state_is_independent() {
        let mut pool = EntryPool::new();
        let id = pool.insert(entry_at(0, "https://example.com/"));
        let clone_id = pool.clone_entry(id).unwrap();

        // Mutating the clone's document state must not touch the original.
        pool.get_mut(clone_id).unwrap().document_state.document = None;
        pool.get_mut(clone_id).unwrap().document_state.reload_pending = true;

        let orig = pool.get(id).unwrap();
        assert!(orig.document_state.document.is_some());
        assert!(!orig.document_state.reload_pending);
    }

    #[test]
    fn test_clone_nested_histories_get_fresh_slots() {
        let mut pool = EntryPool::new();
        let child_entry = pool.insert(entry_at(0, "https://example.com/frame"));
        let mut parent = entry_at(0, "https://example.com/");
        let child_nav = NavigableId::new();
        parent.document_state.nested_histories.push(NestedHistory {
            id: child_nav,
            entries: vec![child_entry],
        });
        let parent_id = pool.insert(parent);

        let clone_id = pool.clone_entry(parent_id).unwrap();
        let cloned_nested = &pool.get(clone_id).unwrap().document_state.nested_histories[0];
        assert_eq!(cloned_nested.id, child_nav);
        assert_eq!(cloned_nested.entries.len(), 1);
        assert_ne!(cloned_nested.entries[0], child_entry);
        assert_eq!(
            pool.get(cloned_nested.entries[0]).unwrap().url,
            pool.get(child_entry).unwrap().url
        );
    }

    #[test]
    fn test_remove_subtree_tombstones_nested_entries() {
        let mut pool = EntryPool::new();
        let child_entry = pool.insert(entry_at(1, "https://example.com/frame"));
        let mut parent = entry_at(1, "https://example.com/");
        parent.document_state.nested_histories.push(NestedHistory {
            id: NavigableId::new(),
            entries: vec![child_entry],
        });
        let parent_id = pool.insert(parent);

        pool.remove_subtree(parent_id);
        assert!(pool.get(parent_id).is_none());
        assert!(pool.get(child_entry).is_none());
        assert_eq!(pool.live_len(), 0);
    }
}
