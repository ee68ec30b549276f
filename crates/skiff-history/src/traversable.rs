//! The top-level traversable.
//!
//! One `TraversableNavigable` owns the *joint* session history of a whole
//! frame tree: the entry pool, the navigable tree, the top-level entry
//! list, the current step, the traversal queue, the screenshot queue, and
//! the origin-keyed storage shed. Every history mutation funnels through
//! [`TraversableNavigable::apply_the_history_step`], which resolves the
//! requested step to a used one, computes the affected navigable sets,
//! runs all cancellation checks before touching anything, and only then
//! swaps documents and pointers.
//!
//! Reentrancy model: hook callbacks are the only points where outside code
//! runs, and outside code may submit new traversal requests through a
//! clone of the queue handle. While `running_nested_apply` is set the pump
//! refuses to drain, so nested requests land in the queue and execute
//! after the outer step completes, in order.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use skiff_types::{
    DocumentId, DomNodeId, HistoryHandling, NavigableId, NavigationType, SynchronousNavigation,
    UserNavigationInvolvement, VisibilityState,
};
use tracing::debug;
use url::Origin;

use crate::entry::{EntryId, EntryParams, EntryPool, SessionHistoryEntry};
use crate::error::HistoryError;
use crate::hooks::{DocumentHooks, SourceSnapshotParams};
use crate::navigable::{active_document, Navigable, NavigableTree};
use crate::queue::{QueuedTask, SyncDisposition, TraversalQueue};
use crate::screenshot::{ScreenshotQueue, ScreenshotTask, Snapshot, SnapshotRenderer};
use crate::storage::StorageShed;

/// Outcome of applying a history step. Cancellation is an outcome, not an
/// error: every variant leaves the traversable in a consistent state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryStepResult {
    /// The initiator was not allowed to navigate one of the affected
    /// navigables. Nothing was mutated.
    InitiatorDisallowed,
    /// A beforeunload prompt refused the traversal. Nothing was mutated.
    CanceledByBeforeUnload,
    /// A navigate event listener canceled the traversal. Nothing was
    /// mutated.
    CanceledByNavigate,
    /// The step was applied.
    Applied,
}

/// Outcome of the unload-cancellation check, usable on its own (window
/// close) or as the gate inside step application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckIfUnloadingIsCanceledResult {
    CanceledByBeforeUnload,
    CanceledByNavigate,
    Continue,
}

/// The script-visible `history.length` / `history.index` pair, identical
/// for every navigable in the tree at a given step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistoryObjectLengthAndIndex {
    pub script_history_length: u64,
    pub script_history_index: u64,
}

/// Host-supplied knobs for a new traversable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TraversableOptions {
    /// Opaque host window identifier, carried for the host's benefit.
    pub window_handle: String,
    /// Whether web content (e.g. `window.open`) created this traversable.
    pub is_created_by_web_content: bool,
    /// Initial system visibility.
    pub visibility: VisibilityState,
}

impl Default for TraversableOptions {
    fn default() -> Self {
        Self {
            window_handle: String::new(),
            is_created_by_web_content: false,
            visibility: VisibilityState::Visible,
        }
    }
}

/// Owner of the joint session history for one frame tree.
pub struct TraversableNavigable {
    root: NavigableId,
    tree: NavigableTree,
    pool: EntryPool,
    /// The root navigable's entry list. All other lists are nested
    /// histories hanging off entries in the pool.
    entries: Vec<EntryId>,
    current_step: i64,
    /// Set while a step is being applied. Gates the pump.
    running_nested_apply: bool,
    system_visibility_state: VisibilityState,
    is_created_by_web_content: bool,
    window_handle: String,
    storage_shed: StorageShed,
    queue: Arc<TraversalQueue>,
    screenshots: ScreenshotQueue,
    needs_repaint: bool,
    closing: bool,
    destroyed: bool,
}

impl TraversableNavigable {
    /// Create a traversable with a single fresh entry at step 0.
    pub fn create(params: EntryParams, options: TraversableOptions) -> Self {
        Self::adopt(vec![params], 0, options)
    }

    /// Create a traversable over a caller-provided entry set (session
    /// restore, tab adoption). Entries get consecutive steps starting at 0
    /// and the root navigable points at `current_index`.
    pub fn adopt(
        initial: Vec<EntryParams>,
        current_index: usize,
        options: TraversableOptions,
    ) -> Self {
        assert!(!initial.is_empty(), "a traversable needs at least one session history entry");
        let current_index = current_index.min(initial.len() - 1);

        let root = NavigableId::new();
        let mut tree = NavigableTree::new();
        tree.insert_root(root);

        let mut pool = EntryPool::new();
        let mut entries = Vec::with_capacity(initial.len());
        for (step, params) in initial.into_iter().enumerate() {
            entries.push(pool.insert(SessionHistoryEntry::new(step as i64, params)));
        }
        let current = entries[current_index];
        if let Some(nav) = tree.get_mut(root) {
            nav.current_entry = Some(current);
            nav.active_entry = Some(current);
        }

        debug!(root = %root, entries = entries.len(), current_index, "created traversable");
        Self {
            root,
            tree,
            pool,
            entries,
            current_step: current_index as i64,
            running_nested_apply: false,
            system_visibility_state: options.visibility,
            is_created_by_web_content: options.is_created_by_web_content,
            window_handle: options.window_handle,
            storage_shed: StorageShed::new(),
            queue: Arc::new(TraversalQueue::new()),
            screenshots: ScreenshotQueue::new(),
            needs_repaint: false,
            closing: false,
            destroyed: false,
        }
    }

    // ── accessors ──────────────────────────────────────────────────────

    pub fn root(&self) -> NavigableId {
        self.root
    }

    pub fn current_step(&self) -> i64 {
        self.current_step
    }

    pub fn navigable(&self, id: NavigableId) -> Option<&Navigable> {
        self.tree.get(id)
    }

    pub fn navigable_ids(&self) -> Vec<NavigableId> {
        self.tree.ids()
    }

    /// Read-only view of an entry. `None` for tombstoned slots.
    pub fn entry(&self, id: EntryId) -> Option<&SessionHistoryEntry> {
        self.pool.get(id)
    }

    /// The root navigable's entry list, chronological order.
    pub fn entries(&self) -> &[EntryId] {
        &self.entries
    }

    pub fn active_document_of(&self, nav: NavigableId) -> Option<DocumentId> {
        let n = self.tree.get(nav)?;
        active_document(n, &self.pool)
    }

    /// Handle collaborators clone to submit nested traversal requests.
    pub fn traversal_queue(&self) -> Arc<TraversalQueue> {
        Arc::clone(&self.queue)
    }

    pub fn running_nested_apply(&self) -> bool {
        self.running_nested_apply
    }

    pub fn storage_shed(&self) -> &StorageShed {
        &self.storage_shed
    }

    pub fn storage_shed_mut(&mut self) -> &mut StorageShed {
        &mut self.storage_shed
    }

    pub fn window_handle(&self) -> &str {
        &self.window_handle
    }

    pub fn set_window_handle(&mut self, handle: String) {
        self.window_handle = handle;
    }

    pub fn is_created_by_web_content(&self) -> bool {
        self.is_created_by_web_content
    }

    pub fn system_visibility_state(&self) -> VisibilityState {
        self.system_visibility_state
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    // ── entry list resolution ──────────────────────────────────────────

    /// The session history entries of `nav`: the top-level list for the
    /// root, otherwise the nested history under the parent's active entry.
    /// Empty when the navigable is unknown or its list is unreachable
    /// (mid-teardown).
    pub fn session_history_entries(&self, nav: NavigableId) -> Vec<EntryId> {
        if nav == self.root {
            return self.entries.clone();
        }
        match self.locate_nested_list(nav) {
            Some((owner, idx)) => {
                self.pool.entry(owner).document_state.nested_histories[idx].entries.clone()
            }
            None => Vec::new(),
        }
    }

    /// Resolve where a non-root navigable's list lives: the owning entry
    /// and the index into its nested histories. The parent's active entry
    /// is the canonical home; when the parent currently shows an entry
    /// without this nested history (mid-traversal elsewhere in its own
    /// history) the pool is scanned so the list stays reachable.
    fn locate_nested_list(&self, nav: NavigableId) -> Option<(EntryId, usize)> {
        let parent = self.tree.get(nav)?.parent?;
        if let Some(owner) = self.tree.get(parent).and_then(|p| p.active_entry)
            && let Some(entry) = self.pool.get(owner)
            && let Some(idx) = entry
                .document_state
                .nested_histories
                .iter()
                .position(|nh| nh.id == nav)
        {
            return Some((owner, idx));
        }
        self.pool.iter_live().find_map(|(eid, entry)| {
            entry
                .document_state
                .nested_histories
                .iter()
                .position(|nh| nh.id == nav)
                .map(|idx| (eid, idx))
        })
    }

    fn push_entry_to_list(&mut self, nav: NavigableId, eid: EntryId) -> Result<(), HistoryError> {
        if nav == self.root {
            self.entries.push(eid);
            return Ok(());
        }
        let (owner, idx) = self
            .locate_nested_list(nav)
            .ok_or(HistoryError::NavigableNotFound(nav))?;
        self.pool.entry_mut(owner).document_state.nested_histories[idx]
            .entries
            .push(eid);
        Ok(())
    }

    fn replace_entry_in_list(
        &mut self,
        nav: NavigableId,
        old: EntryId,
        new: EntryId,
    ) -> Result<(), HistoryError> {
        if nav == self.root {
            let pos = self
                .entries
                .iter()
                .position(|&e| e == old)
                .ok_or(HistoryError::EntryNotFound(old))?;
            self.entries[pos] = new;
            return Ok(());
        }
        let (owner, idx) = self
            .locate_nested_list(nav)
            .ok_or(HistoryError::NavigableNotFound(nav))?;
        let list = &mut self.pool.entry_mut(owner).document_state.nested_histories[idx].entries;
        let pos = list
            .iter()
            .position(|&e| e == old)
            .ok_or(HistoryError::EntryNotFound(old))?;
        list[pos] = new;
        Ok(())
    }

    // ── step arithmetic ────────────────────────────────────────────────

    /// Every step number reachable anywhere in the joint session history,
    /// ascending and deduplicated.
    ///
    /// Panics if the traversable has no entries: a live traversable with
    /// an empty history is an invariant violation.
    pub fn get_all_used_history_steps(&self) -> Vec<i64> {
        assert!(!self.entries.is_empty(), "live traversable has no session history entries");
        let mut steps = BTreeSet::new();
        let mut stack: Vec<EntryId> = self.entries.clone();
        while let Some(eid) = stack.pop() {
            let entry = self.pool.entry(eid);
            steps.insert(entry.step);
            for nested in &entry.document_state.nested_histories {
                stack.extend(nested.entries.iter().copied());
            }
        }
        steps.into_iter().collect()
    }

    /// Snap an arbitrary requested step to a used one: the greatest used
    /// step not greater than `step`, or the least used step when `step`
    /// precedes them all. Total for any input.
    pub fn get_the_used_step(&self, step: i64) -> i64 {
        let steps = self.get_all_used_history_steps();
        steps
            .iter()
            .rev()
            .find(|&&s| s <= step)
            .copied()
            .unwrap_or(steps[0])
    }

    /// The entry `nav` would show at `step`: the list entry with the
    /// greatest step not greater than `step`. `None` means the navigable
    /// does not exist at that point in history and is skipped.
    fn target_entry_for(&self, nav: NavigableId, step: i64) -> Option<EntryId> {
        let mut best: Option<(i64, EntryId)> = None;
        for eid in self.session_history_entries(nav) {
            let s = self.pool.entry(eid).step;
            if s <= step && best.is_none_or(|(bs, _)| s >= bs) {
                best = Some((s, eid));
            }
        }
        best.map(|(_, eid)| eid)
    }

    /// `history.length` and index as scripts observe them at `step`.
    pub fn get_the_history_object_length_and_index(&self, step: i64) -> HistoryObjectLengthAndIndex {
        let steps = self.get_all_used_history_steps();
        let used = self.get_the_used_step(step);
        let index = steps.iter().position(|&s| s == used).unwrap_or(0);
        HistoryObjectLengthAndIndex {
            script_history_length: steps.len() as u64,
            script_history_index: index as u64,
        }
    }

    // ── affected sets ──────────────────────────────────────────────────

    /// Navigables whose current entry changes at `step`, or which have a
    /// reload pending on their target entry.
    pub fn get_all_navigables_whose_current_session_history_entry_will_change_or_reload(
        &self,
        step: i64,
    ) -> Vec<NavigableId> {
        self.tree
            .ids()
            .into_iter()
            .filter(|&nav| match self.target_entry_for(nav, step) {
                None => false,
                Some(target) => {
                    let changes = self.tree.get(nav).map(|n| n.current_entry) != Some(Some(target));
                    changes || self.pool.entry(target).document_state.reload_pending
                }
            })
            .collect()
    }

    /// Navigables untouched by the step except for their script-visible
    /// history object. Disjoint from the changing set.
    pub fn get_all_navigables_that_only_need_history_object_length_index_update(
        &self,
        step: i64,
    ) -> Vec<NavigableId> {
        self.tree
            .ids()
            .into_iter()
            .filter(|&nav| match self.target_entry_for(nav, step) {
                None => false,
                Some(target) => {
                    let same = self.tree.get(nav).map(|n| n.current_entry) == Some(Some(target));
                    same && !self.pool.entry(target).document_state.reload_pending
                }
            })
            .collect()
    }

    /// Navigables that may swap documents at `step`: their target entry
    /// has no document, a pending reload, or a different document than the
    /// one currently active.
    pub fn get_all_navigables_that_might_experience_a_cross_document_traversal(
        &self,
        step: i64,
    ) -> Vec<NavigableId> {
        self.tree
            .ids()
            .into_iter()
            .filter(|&nav| match self.target_entry_for(nav, step) {
                None => false,
                Some(target) => {
                    let state = &self.pool.entry(target).document_state;
                    state.document.is_none()
                        || state.reload_pending
                        || state.document != self.active_document_of(nav)
                }
            })
            .collect()
    }

    // ── cancellation ───────────────────────────────────────────────────

    /// Ask the given navigables' documents whether unloading may proceed.
    /// Standalone form used for window close; for traversals the step
    /// application runs the same check with navigate events included.
    pub fn check_if_unloading_is_canceled(
        &mut self,
        navs: &[NavigableId],
        hooks: &mut dyn DocumentHooks,
    ) -> CheckIfUnloadingIsCanceledResult {
        self.unload_cancellation_check(navs, None, None, hooks)
    }

    /// Two phases, all checks before any mutation. Phase one fires
    /// navigate events (traversals only, skipped for synchronous
    /// navigations); phase two runs beforeunload prompts. The first veto
    /// wins and nothing after it runs.
    fn unload_cancellation_check(
        &mut self,
        navs: &[NavigableId],
        target_step: Option<i64>,
        involvement: Option<UserNavigationInvolvement>,
        hooks: &mut dyn DocumentHooks,
    ) -> CheckIfUnloadingIsCanceledResult {
        if let Some(step) = target_step {
            for &nav in navs {
                let Some(doc) = self.active_document_of(nav) else { continue };
                if !hooks.has_navigate_event_listener(doc) {
                    continue;
                }
                let Some(target) = self.target_entry_for(nav, step) else { continue };
                let (url, key) = {
                    let entry = self.pool.entry(target);
                    (entry.url.clone(), entry.navigation_api_key)
                };
                let involvement = involvement.unwrap_or(UserNavigationInvolvement::None);
                if !hooks.fire_traverse_navigate_event(doc, &url, key, involvement) {
                    debug!(nav = %nav, "traversal canceled by navigate event");
                    return CheckIfUnloadingIsCanceledResult::CanceledByNavigate;
                }
            }
        }

        for &nav in navs {
            let Some(doc) = self.active_document_of(nav) else { continue };
            if !hooks.has_beforeunload_listener(doc) {
                continue;
            }
            if !hooks.confirm_unload(doc) {
                debug!(nav = %nav, "unloading canceled by beforeunload");
                return CheckIfUnloadingIsCanceledResult::CanceledByBeforeUnload;
            }
        }

        CheckIfUnloadingIsCanceledResult::Continue
    }

    // ── step application ───────────────────────────────────────────────

    /// Apply a traverse step: full cancellation checks, with an optional
    /// initiator to validate against every changing navigable.
    pub fn apply_the_traverse_history_step(
        &mut self,
        step: i64,
        source_snapshot: Option<&SourceSnapshotParams>,
        initiator: Option<NavigableId>,
        involvement: UserNavigationInvolvement,
        hooks: &mut dyn DocumentHooks,
    ) -> HistoryStepResult {
        self.apply_the_history_step(
            step,
            true,
            source_snapshot,
            initiator,
            involvement,
            Some(NavigationType::Traverse),
            SynchronousNavigation::No,
            hooks,
        )
    }

    /// Re-apply the current step forcing a document reload of the root's
    /// current entry. Subject to beforeunload.
    pub fn apply_the_reload_history_step(
        &mut self,
        involvement: UserNavigationInvolvement,
        hooks: &mut dyn DocumentHooks,
    ) -> HistoryStepResult {
        if let Some(current) = self.tree.get(self.root).and_then(|n| n.current_entry)
            && let Some(entry) = self.pool.get_mut(current)
        {
            entry.document_state.reload_pending = true;
        }
        self.apply_the_history_step(
            self.current_step,
            true,
            None,
            None,
            involvement,
            Some(NavigationType::Reload),
            SynchronousNavigation::No,
            hooks,
        )
    }

    /// Apply a push or replace step. The entry was already placed in its
    /// list; cancellation checks are skipped because the navigation that
    /// produced the entry already ran them.
    pub fn apply_the_push_or_replace_history_step(
        &mut self,
        step: i64,
        handling: HistoryHandling,
        involvement: UserNavigationInvolvement,
        synchronous: SynchronousNavigation,
        hooks: &mut dyn DocumentHooks,
    ) -> HistoryStepResult {
        let navigation_type = match handling {
            HistoryHandling::Push => NavigationType::Push,
            HistoryHandling::Replace => NavigationType::Replace,
        };
        self.apply_the_history_step(
            step,
            false,
            None,
            None,
            involvement,
            Some(navigation_type),
            synchronous,
            hooks,
        )
    }

    /// Re-apply the current step so every navigable's history object
    /// reflects a changed tree shape. No cancellation checks.
    pub fn update_for_navigable_creation_or_destruction(
        &mut self,
        hooks: &mut dyn DocumentHooks,
    ) -> HistoryStepResult {
        self.apply_the_history_step(
            self.current_step,
            false,
            None,
            None,
            UserNavigationInvolvement::None,
            None,
            SynchronousNavigation::No,
            hooks,
        )
    }

    fn begin_apply(&mut self) {
        self.running_nested_apply = true;
        self.queue.set_running(true);
    }

    fn end_apply(&mut self) {
        self.running_nested_apply = false;
        self.queue.set_running(false);
    }

    /// A canceled reload must leave the current entry exactly as it was,
    /// or the next traversal onto it would force a spurious reload.
    fn clear_pending_reload(&mut self) {
        if let Some(current) = self.tree.get(self.root).and_then(|n| n.current_entry)
            && let Some(entry) = self.pool.get_mut(current)
        {
            entry.document_state.reload_pending = false;
        }
    }

    /// The one place history actually mutates.
    ///
    /// Order is load-bearing: resolve the used step, compute the affected
    /// sets, validate the initiator, run every cancellation check, and
    /// only then swap documents, move pointers, bump the step, and deliver
    /// history object updates. A cancellation return leaves no trace.
    #[allow(clippy::too_many_arguments)]
    fn apply_the_history_step(
        &mut self,
        step: i64,
        check_for_cancellation: bool,
        source_snapshot: Option<&SourceSnapshotParams>,
        initiator_to_check: Option<NavigableId>,
        involvement: UserNavigationInvolvement,
        navigation_type: Option<NavigationType>,
        synchronous: SynchronousNavigation,
        hooks: &mut dyn DocumentHooks,
    ) -> HistoryStepResult {
        assert!(!self.destroyed, "applying a history step to a destroyed traversable");
        let step = self.get_the_used_step(step);
        debug!(step, ty = ?navigation_type, "applying history step");

        let changing =
            self.get_all_navigables_whose_current_session_history_entry_will_change_or_reload(step);
        let cross_document =
            self.get_all_navigables_that_might_experience_a_cross_document_traversal(step);
        let length_update_only =
            self.get_all_navigables_that_only_need_history_object_length_index_update(step);

        if let Some(initiator) = initiator_to_check {
            let Some(initiator_doc) = self.active_document_of(initiator) else {
                debug!(initiator = %initiator, "initiator has no active document");
                return HistoryStepResult::InitiatorDisallowed;
            };
            for &nav in &changing {
                if let Some(target_doc) = self.active_document_of(nav)
                    && !hooks.allowed_to_navigate(initiator_doc, target_doc, source_snapshot)
                {
                    debug!(nav = %nav, "initiator not allowed to traverse navigable");
                    return HistoryStepResult::InitiatorDisallowed;
                }
            }
        }

        self.begin_apply();

        if check_for_cancellation {
            let mut to_check = changing.clone();
            for &nav in &cross_document {
                if !to_check.contains(&nav) {
                    to_check.push(nav);
                }
            }
            let fire_navigate = synchronous == SynchronousNavigation::No;
            let target_step = fire_navigate.then_some(step);
            match self.unload_cancellation_check(&to_check, target_step, Some(involvement), hooks) {
                CheckIfUnloadingIsCanceledResult::Continue => {}
                CheckIfUnloadingIsCanceledResult::CanceledByBeforeUnload => {
                    self.end_apply();
                    if navigation_type == Some(NavigationType::Reload) {
                        self.clear_pending_reload();
                    }
                    return HistoryStepResult::CanceledByBeforeUnload;
                }
                CheckIfUnloadingIsCanceledResult::CanceledByNavigate => {
                    self.end_apply();
                    if navigation_type == Some(NavigationType::Reload) {
                        self.clear_pending_reload();
                    }
                    return HistoryStepResult::CanceledByNavigate;
                }
            }
        }

        // Point of no return. Parents come before children in iteration
        // order, so child list lookups see the parent's new active entry.
        for &nav in &changing {
            let Some(target) = self.target_entry_for(nav, step) else { continue };
            let old_doc = self.active_document_of(nav);
            let (target_doc, reload, url) = {
                let entry = self.pool.entry(target);
                (
                    entry.document_state.document,
                    entry.document_state.reload_pending,
                    entry.url.clone(),
                )
            };

            let cross = reload || target_doc.is_none() || target_doc != old_doc;
            if cross {
                let mut new_doc = target_doc;
                if reload || target_doc.is_none() {
                    new_doc = hooks.repopulate_document(nav, &url);
                    let entry = self.pool.entry_mut(target);
                    entry.document_state.reload_pending = false;
                    match new_doc {
                        Some(doc) => {
                            entry.document_state.document = Some(doc);
                            entry.document_state.ever_populated = true;
                        }
                        None => {
                            entry.document_state.document = None;
                            debug!(nav = %nav, %url, "no document produced; entry left unpopulated");
                        }
                    }
                }
                if let Some(old) = old_doc
                    && Some(old) != new_doc
                {
                    hooks.unload_document(old);
                }
                if let Some(doc) = new_doc {
                    hooks.activate_document(nav, doc, &url);
                }
            } else if let Some(doc) = target_doc {
                let state = self.pool.entry(target).classic_history_api_state.clone();
                hooks.apply_history_state(doc, &url, &state);
            }

            if let Some(n) = self.tree.get_mut(nav) {
                n.current_entry = Some(target);
                n.active_entry = Some(target);
            }
        }

        self.current_step = step;
        self.needs_repaint = true;

        let loi = self.get_the_history_object_length_and_index(step);
        for &nav in changing.iter().chain(length_update_only.iter()) {
            if let Some(doc) = self.active_document_of(nav) {
                hooks.update_history_object(doc, loi.script_history_length, loi.script_history_index);
            }
        }

        self.end_apply();
        debug!(step, changed = changing.len(), "history step applied");
        HistoryStepResult::Applied
    }

    // ── triggers ───────────────────────────────────────────────────────

    /// Traverse by a signed delta over the used steps, as the back and
    /// forward buttons do. Out-of-range deltas are ignored. A request from
    /// no document or a same-origin document takes the synchronous policy,
    /// which skips re-firing navigate events for the traversal it already
    /// announced.
    pub fn traverse_the_history_by_delta(
        &mut self,
        delta: i64,
        source_document: Option<DocumentId>,
        hooks: &mut dyn DocumentHooks,
    ) {
        if self.destroyed {
            return;
        }
        let steps = self.get_all_used_history_steps();
        let Some(pos) = steps.iter().position(|&s| s == self.current_step) else {
            panic!("current step {} is not a used step", self.current_step);
        };
        let target = (pos as i64).checked_add(delta);
        let Some(target) = target.filter(|&t| t >= 0 && t < steps.len() as i64) else {
            debug!(delta, "delta traversal out of range; ignoring");
            return;
        };
        let step = steps[target as usize];

        // A delta from a document is script calling history.go(); only a
        // sourceless delta comes from the browser chrome.
        let involvement = match source_document {
            None => UserNavigationInvolvement::BrowserUi,
            Some(_) => UserNavigationInvolvement::None,
        };

        let (synchronous, source_snapshot) = match source_document {
            None => (SynchronousNavigation::Yes, None),
            Some(doc) => {
                let source_origin = self.document_origin(doc);
                let root_origin = self
                    .active_document_of(self.root)
                    .and_then(|d| self.document_origin(d));
                let synchronous = if source_origin.is_some() && source_origin == root_origin {
                    SynchronousNavigation::Yes
                } else {
                    SynchronousNavigation::No
                };
                let snapshot = SourceSnapshotParams {
                    has_transient_activation: false,
                    source_origin,
                };
                (synchronous, Some(snapshot))
            }
        };

        self.queue.append(QueuedTask::Traverse {
            step,
            source_snapshot,
            initiator: None,
            involvement,
            synchronous,
        });
        self.pump_traversal_queue(hooks);
    }

    /// Reload the root navigable's current entry.
    pub fn reload(&mut self, involvement: UserNavigationInvolvement, hooks: &mut dyn DocumentHooks) {
        if self.destroyed {
            return;
        }
        if let Some(current) = self.tree.get(self.root).and_then(|n| n.current_entry)
            && let Some(entry) = self.pool.get_mut(current)
        {
            entry.document_state.reload_pending = true;
        }
        self.queue.append(QueuedTask::Reload { involvement });
        self.pump_traversal_queue(hooks);
    }

    /// Commit a same-document navigation: place the new entry in the
    /// target navigable's list and schedule the step that makes it
    /// current.
    ///
    /// With no `entry_to_replace` this is a push: forward history is
    /// cleared and the entry lands at the next step. Otherwise the entry
    /// replaces in place, inheriting the replaced entry's step and
    /// navigation API key (its id stays fresh), plus its document and
    /// nested histories when the params carry none.
    pub fn finalize_a_same_document_navigation(
        &mut self,
        target_navigable: NavigableId,
        params: EntryParams,
        entry_to_replace: Option<EntryId>,
        involvement: UserNavigationInvolvement,
        hooks: &mut dyn DocumentHooks,
    ) -> Result<EntryId, HistoryError> {
        if self.destroyed {
            return Err(HistoryError::Destroyed);
        }
        if !self.tree.contains(target_navigable) {
            return Err(HistoryError::NavigableNotFound(target_navigable));
        }

        let mut entry = SessionHistoryEntry::new(0, params);
        let target_step;
        let handling;
        let eid;

        match entry_to_replace {
            None => {
                self.clear_the_forward_session_history();
                target_step = self.current_step + 1;
                handling = HistoryHandling::Push;
                entry.step = target_step;
                if entry.document_state.document.is_none()
                    && let Some(active) = self
                        .tree
                        .get(target_navigable)
                        .and_then(|n| n.active_entry)
                        .and_then(|e| self.pool.get(e))
                {
                    entry.document_state.document = active.document_state.document;
                    entry.document_state.origin = active.document_state.origin.clone();
                }
                eid = self.pool.insert(entry);
                if let Err(e) = self.push_entry_to_list(target_navigable, eid) {
                    self.pool.remove(eid);
                    return Err(e);
                }
            }
            Some(old) => {
                let (old_step, old_key) = {
                    let old_entry = self.pool.get(old).ok_or(HistoryError::EntryNotFound(old))?;
                    (old_entry.step, old_entry.navigation_api_key)
                };
                target_step = self.current_step;
                handling = HistoryHandling::Replace;
                entry.step = old_step;
                entry.navigation_api_key = old_key;
                eid = self.pool.insert(entry);
                if let Err(e) = self.replace_entry_in_list(target_navigable, old, eid) {
                    self.pool.remove(eid);
                    return Err(e);
                }
                if let Some(old_entry) = self.pool.remove(old) {
                    let new_entry = self.pool.entry_mut(eid);
                    new_entry.document_state.nested_histories =
                        old_entry.document_state.nested_histories;
                    new_entry.document_state.ever_populated =
                        old_entry.document_state.ever_populated;
                    if new_entry.document_state.document.is_none() {
                        new_entry.document_state.document = old_entry.document_state.document;
                        new_entry.document_state.origin = old_entry.document_state.origin;
                    }
                }
                for nav in self.tree.ids() {
                    if let Some(n) = self.tree.get_mut(nav) {
                        if n.current_entry == Some(old) {
                            n.current_entry = Some(eid);
                        }
                        if n.active_entry == Some(old) {
                            n.active_entry = Some(eid);
                        }
                    }
                }
                // The pointers already name the new entry, so step
                // application will see no change for this navigable.
                // Deliver the replaced URL and state here instead.
                let (doc, url, state) = {
                    let e = self.pool.entry(eid);
                    (
                        e.document_state.document,
                        e.url.clone(),
                        e.classic_history_api_state.clone(),
                    )
                };
                if let Some(doc) = doc {
                    hooks.apply_history_state(doc, &url, &state);
                }
            }
        }

        let task = QueuedTask::PushOrReplace {
            step: target_step,
            handling,
            involvement,
            synchronous: SynchronousNavigation::Yes,
        };
        match self.queue.append_sync(task, target_navigable) {
            SyncDisposition::RunNow => {
                self.apply_the_push_or_replace_history_step(
                    target_step,
                    handling,
                    involvement,
                    SynchronousNavigation::Yes,
                    hooks,
                );
                self.pump_traversal_queue(hooks);
            }
            SyncDisposition::Queued => self.pump_traversal_queue(hooks),
        }
        Ok(eid)
    }

    /// Drop every entry whose step exceeds the current one, recursively
    /// through nested histories. Current entries survive by construction:
    /// they never sit past the current step.
    pub fn clear_the_forward_session_history(&mut self) {
        let cur = self.current_step;

        let (keep, drop): (Vec<EntryId>, Vec<EntryId>) = self
            .entries
            .iter()
            .copied()
            .partition(|&e| self.pool.entry(e).step <= cur);
        self.entries = keep;
        let mut dropped = drop.len();
        for e in drop {
            self.pool.remove_subtree(e);
        }

        let mut stack: Vec<EntryId> = self.entries.clone();
        while let Some(eid) = stack.pop() {
            if self.pool.get(eid).is_none() {
                continue;
            }
            let nested_count = self.pool.entry(eid).document_state.nested_histories.len();
            for i in 0..nested_count {
                let list = self.pool.entry(eid).document_state.nested_histories[i].entries.clone();
                let (keep, drop): (Vec<EntryId>, Vec<EntryId>) =
                    list.into_iter().partition(|&e| self.pool.entry(e).step <= cur);
                stack.extend(keep.iter().copied());
                self.pool.entry_mut(eid).document_state.nested_histories[i].entries = keep;
                dropped += drop.len();
                for e in drop {
                    self.pool.remove_subtree(e);
                }
            }
        }

        if dropped > 0 {
            debug!(dropped, step = cur, "cleared forward session history");
        }
    }

    // ── the pump ───────────────────────────────────────────────────────

    /// Drain the traversal queue, one task at a time. A no-op while a step
    /// is mid-application: nested requests wait for the outer pump.
    pub fn pump_traversal_queue(&mut self, hooks: &mut dyn DocumentHooks) {
        if self.running_nested_apply {
            return;
        }
        if self.destroyed {
            self.queue.clear();
            return;
        }
        while let Some(entry) = self.queue.pop() {
            self.run_queued_task(entry.task, hooks);
            if self.destroyed {
                self.queue.clear();
                return;
            }
        }
    }

    fn run_queued_task(&mut self, task: QueuedTask, hooks: &mut dyn DocumentHooks) {
        match task {
            QueuedTask::Traverse { step, source_snapshot, initiator, involvement, synchronous } => {
                self.apply_the_history_step(
                    step,
                    true,
                    source_snapshot.as_ref(),
                    initiator,
                    involvement,
                    Some(NavigationType::Traverse),
                    synchronous,
                    hooks,
                );
            }
            QueuedTask::PushOrReplace { step, handling, involvement, synchronous } => {
                self.apply_the_push_or_replace_history_step(
                    step, handling, involvement, synchronous, hooks,
                );
            }
            QueuedTask::Reload { involvement } => {
                self.apply_the_reload_history_step(involvement, hooks);
            }
            QueuedTask::RefreshAfterTreeChange => {
                self.update_for_navigable_creation_or_destruction(hooks);
            }
        }
    }

    // ── navigable lifecycle ────────────────────────────────────────────

    /// Attach a child navigable under `parent` with a single fresh entry
    /// at the current step, recorded as a nested history on the parent's
    /// active entry. Every history object in the tree is refreshed.
    pub fn create_child_navigable(
        &mut self,
        parent: NavigableId,
        params: EntryParams,
        hooks: &mut dyn DocumentHooks,
    ) -> Result<NavigableId, HistoryError> {
        if self.destroyed {
            return Err(HistoryError::Destroyed);
        }
        let parent_nav = self
            .tree
            .get(parent)
            .ok_or(HistoryError::NavigableNotFound(parent))?;
        let owner = parent_nav
            .active_entry
            .ok_or(HistoryError::ParentHasNoActiveEntry(parent))?;
        if self.pool.get(owner).is_none() {
            return Err(HistoryError::ParentHasNoActiveEntry(parent));
        }

        let id = NavigableId::new();
        let eid = self
            .pool
            .insert(SessionHistoryEntry::new(self.current_step, params));
        self.pool
            .entry_mut(owner)
            .document_state
            .nested_histories
            .push(crate::document_state::NestedHistory { id, entries: vec![eid] });
        self.tree.insert_child(id, parent);
        if let Some(nav) = self.tree.get_mut(id) {
            nav.current_entry = Some(eid);
            nav.active_entry = Some(eid);
        }
        debug!(nav = %id, parent_nav = %parent, step = self.current_step, "created child navigable");

        self.queue.append(QueuedTask::RefreshAfterTreeChange);
        self.pump_traversal_queue(hooks);
        Ok(id)
    }

    /// Detach a child navigable (and its descendants), unloading their
    /// active documents and tombstoning every entry in their histories.
    pub fn destroy_child_navigable(
        &mut self,
        id: NavigableId,
        hooks: &mut dyn DocumentHooks,
    ) -> Result<(), HistoryError> {
        if self.destroyed {
            return Err(HistoryError::Destroyed);
        }
        assert!(id != self.root, "the root navigable is destroyed with the traversable");
        for nav in self.tree.subtree(id) {
            if let Some(doc) = self.active_document_of(nav) {
                hooks.unload_document(doc);
            }
        }
        let removed = self.tree.remove_subtree(id);
        if removed.is_empty() {
            return Err(HistoryError::NavigableNotFound(id));
        }

        // Strip the dead navigables' nested histories wherever they occur.
        let owners: Vec<EntryId> = self.pool.iter_live().map(|(eid, _)| eid).collect();
        for owner in owners {
            if self.pool.get(owner).is_none() {
                continue;
            }
            for &nav in &removed {
                if let Some(nested) = self
                    .pool
                    .entry_mut(owner)
                    .document_state
                    .remove_nested_history(nav)
                {
                    for eid in nested.entries {
                        self.pool.remove_subtree(eid);
                    }
                }
            }
        }
        debug!(nav = %id, removed = removed.len(), "destroyed child navigable");

        self.queue.append(QueuedTask::RefreshAfterTreeChange);
        self.pump_traversal_queue(hooks);
        Ok(())
    }

    // ── teardown ───────────────────────────────────────────────────────

    /// Staged close: run the unload-cancellation check over every
    /// navigable with an active document, and only close when nothing
    /// vetoes. Returns whether the traversable was closed.
    pub fn close_top_level_traversable(&mut self, hooks: &mut dyn DocumentHooks) -> bool {
        if self.destroyed {
            return true;
        }
        self.closing = true;
        let navs: Vec<NavigableId> = self
            .tree
            .ids()
            .into_iter()
            .filter(|&nav| self.active_document_of(nav).is_some())
            .collect();
        match self.check_if_unloading_is_canceled(&navs, hooks) {
            CheckIfUnloadingIsCanceledResult::Continue => {
                self.definitely_close_top_level_traversable(hooks);
                true
            }
            result => {
                debug!(?result, "close vetoed");
                self.closing = false;
                false
            }
        }
    }

    /// Close without asking: drop pending work and destroy.
    pub fn definitely_close_top_level_traversable(&mut self, hooks: &mut dyn DocumentHooks) {
        self.closing = true;
        self.queue.clear();
        self.destroy_top_level_traversable(hooks);
    }

    /// Unload every active document and release all owned state. The
    /// traversable accepts no further operations afterwards.
    pub fn destroy_top_level_traversable(&mut self, hooks: &mut dyn DocumentHooks) {
        if self.destroyed {
            return;
        }
        for nav in self.tree.ids() {
            if let Some(doc) = self.active_document_of(nav) {
                hooks.unload_document(doc);
            }
        }
        self.queue.clear();
        self.screenshots = ScreenshotQueue::new();
        self.pool.clear();
        self.entries.clear();
        self.storage_shed.clear();
        self.destroyed = true;
        debug!(handle = %self.window_handle, "destroyed top-level traversable");
    }

    // ── visibility and screenshots ─────────────────────────────────────

    /// Change system visibility and notify every active document. No-op
    /// when the state is unchanged.
    pub fn set_system_visibility_state(
        &mut self,
        state: VisibilityState,
        hooks: &mut dyn DocumentHooks,
    ) {
        if self.system_visibility_state == state {
            return;
        }
        self.system_visibility_state = state;
        debug!(?state, "system visibility changed");
        for nav in self.tree.ids() {
            if let Some(doc) = self.active_document_of(nav) {
                hooks.visibility_changed(doc, state);
            }
        }
    }

    /// Request a snapshot of the viewport (`None`) or a single node.
    /// Snapshot requests never interact with the traversal queue.
    pub fn queue_screenshot_task(&mut self, node: Option<DomNodeId>) {
        self.screenshots.enqueue(ScreenshotTask { node });
        self.needs_repaint = true;
    }

    /// Drain pending snapshot requests in order. Requests are dropped
    /// (with a log line each) when no renderer is available.
    pub fn process_screenshot_requests(
        &mut self,
        renderer: Option<&mut dyn SnapshotRenderer>,
    ) -> Vec<Snapshot> {
        self.needs_repaint = false;
        self.screenshots.process(renderer)
    }

    pub fn needs_repaint(&self) -> bool {
        self.needs_repaint
    }

    // ── helpers ────────────────────────────────────────────────────────

    /// The origin recorded for a materialized document, found by scanning
    /// live entries. Used for synchronous-navigation policy decisions.
    fn document_origin(&self, doc: DocumentId) -> Option<Origin> {
        self.pool
            .iter_live()
            .find(|(_, e)| e.document_state.document == Some(doc))
            .and_then(|(_, e)| e.document_state.origin.clone())
    }
}
