//! The navigable tree.
//!
//! A navigable is one frame in the browsing-context tree. The engine reads
//! the tree shape to compute affected sets during traversal and writes each
//! navigable's current/active entry pointers during step application;
//! everything else about a frame (its DOM, its viewport) lives with
//! collaborators.
//!
//! Nodes live in an arena keyed by [`NavigableId`] and reference each other
//! by id, never by ownership — parent links are plain ids resolved through
//! the tree, so a dangling reference degrades to a lookup miss instead of a
//! lifetime problem.

use indexmap::IndexMap;
use skiff_types::{DocumentId, NavigableId};

use crate::entry::EntryId;

/// One frame in the tree.
#[derive(Clone, Debug)]
pub struct Navigable {
    pub id: NavigableId,
    /// `None` for the traversable's root navigable.
    pub parent: Option<NavigableId>,
    /// The entry this navigable is currently *assigned* (may be mid-swap).
    pub current_entry: Option<EntryId>,
    /// The entry whose document is actually active right now.
    pub active_entry: Option<EntryId>,
}

impl Navigable {
    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }
}

/// Arena of navigables for one traversable, insertion-ordered so affected-set
/// iteration is deterministic (parents before their children).
#[derive(Debug, Default)]
pub struct NavigableTree {
    nodes: IndexMap<NavigableId, Navigable>,
}

impl NavigableTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert the root navigable. Must be the first insertion.
    pub fn insert_root(&mut self, id: NavigableId) {
        debug_assert!(self.nodes.is_empty(), "root must be inserted first");
        self.nodes.insert(
            id,
            Navigable { id, parent: None, current_entry: None, active_entry: None },
        );
    }

    /// Insert a child under an existing parent.
    pub fn insert_child(&mut self, id: NavigableId, parent: NavigableId) {
        debug_assert!(self.nodes.contains_key(&parent), "parent must exist");
        self.nodes.insert(
            id,
            Navigable { id, parent: Some(parent), current_entry: None, active_entry: None },
        );
    }

    pub fn get(&self, id: NavigableId) -> Option<&Navigable> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NavigableId) -> Option<&mut Navigable> {
        self.nodes.get_mut(&id)
    }

    pub fn contains(&self, id: NavigableId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All navigables in insertion order (parents precede children).
    pub fn ids(&self) -> Vec<NavigableId> {
        self.nodes.keys().copied().collect()
    }

    /// Direct children of a navigable, in insertion order.
    pub fn children(&self, id: NavigableId) -> Vec<NavigableId> {
        self.nodes
            .values()
            .filter(|n| n.parent == Some(id))
            .map(|n| n.id)
            .collect()
    }

    /// A navigable and all its descendants, depth-first.
    pub fn subtree(&self, id: NavigableId) -> Vec<NavigableId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(&current) {
                continue;
            }
            result.push(current);
            // Push children in reverse to keep insertion order in output.
            for child in self.children(current).into_iter().rev() {
                stack.push(child);
            }
        }
        result
    }

    /// Remove a navigable and all its descendants from the tree.
    /// Returns the removed ids (the caller tombstones their entries).
    pub fn remove_subtree(&mut self, id: NavigableId) -> Vec<NavigableId> {
        let removed = self.subtree(id);
        for nav in &removed {
            self.nodes.shift_remove(nav);
        }
        removed
    }
}

/// Convenience view of a navigable's active document, resolved through the
/// entry pool by the traversable.
pub fn active_document(nav: &Navigable, pool: &crate::entry::EntryPool) -> Option<DocumentId> {
    nav.active_entry
        .and_then(|e| pool.get(e))
        .and_then(|entry| entry.document_state.document)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_root() -> (NavigableTree, NavigableId) {
        let mut tree = NavigableTree::new();
        let root = NavigableId::new();
        tree.insert_root(root);
        (tree, root)
    }

    #[test]
    fn test_root_is_top_level() {
        let (tree, root) = tree_with_root();
        assert!(tree.get(root).unwrap().is_top_level());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_children_in_insertion_order() {
        let (mut tree, root) = tree_with_root();
        let a = NavigableId::new();
        let b = NavigableId::new();
        tree.insert_child(a, root);
        tree.insert_child(b, root);
        assert_eq!(tree.children(root), vec![a, b]);
        assert!(!tree.get(a).unwrap().is_top_level());
    }

    #[test]
    fn test_subtree_is_depth_first() {
        let (mut tree, root) = tree_with_root();
        let a = NavigableId::new();
        let b = NavigableId::new();
        let a_child = NavigableId::new();
        tree.insert_child(a, root);
        tree.insert_child(b, root);
        tree.insert_child(a_child, a);
        assert_eq!(tree.subtree(root), vec![root, a, a_child, b]);
        assert_eq!(tree.subtree(a), vec![a, a_child]);
    }

    #[test]
    fn test_remove_subtree() {
        let (mut tree, root) = tree_with_root();
        let a = NavigableId::new();
        let a_child = NavigableId::new();
        tree.insert_child(a, root);
        tree.insert_child(a_child, a);

        let removed = tree.remove_subtree(a);
        assert_eq!(removed, vec![a, a_child]);
        assert!(!tree.contains(a));
        assert!(!tree.contains(a_child));
        assert!(tree.contains(root));
    }

    #[test]
    fn test_ids_parents_before_children() {
        let (mut tree, root) = tree_with_root();
        let a = NavigableId::new();
        tree.insert_child(a, root);
        let ids = tree.ids();
        let root_pos = ids.iter().position(|&n| n == root).unwrap();
        let a_pos = ids.iter().position(|&n| n == a).unwrap();
        assert!(root_pos < a_pos);
    }
}
