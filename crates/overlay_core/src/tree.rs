//! Collection hierarchy bookkeeping.
//!
//! # Responsibility
//! - Keep the forest of plain and clusterized collections under the
//!   implicit root, with parent and child indexes.
//! - Validate nesting before the engine is asked to create anything.
//!
//! # Invariants
//! - Collection ids are unique across both kinds.
//! - A parent, when present, is an existing plain collection.
//! - Parent chains terminate at the root without cycles.
//! - `children` and `by_handle` always mirror `nodes`.
//!
//! # See also
//! - `store` for cascade removal of objects owned by collections.

use crate::engine::{EngineHandle, RenderEngine, Scope};
use crate::error::{OverlayError, OverlayResult};
use crate::model::overlay::{CollectionId, CollectionKind, CollectionNode};
use log::debug;
use std::collections::{BTreeMap, BTreeSet};

/// Forest of collection nodes rooted at the implicit map root.
#[derive(Debug, Default)]
pub struct CollectionTree {
    nodes: BTreeMap<CollectionId, CollectionNode>,
    /// `None` key lists nodes attached directly to the root.
    children: BTreeMap<Option<CollectionId>, BTreeSet<CollectionId>>,
    by_handle: BTreeMap<EngineHandle, CollectionId>,
}

impl CollectionTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a tree from nodes given in any order.
    ///
    /// Children may appear before their parents. Fails on duplicate ids,
    /// unknown or clusterized parents, and parent cycles.
    pub fn from_nodes(nodes: Vec<CollectionNode>) -> OverlayResult<Self> {
        let mut by_id = BTreeMap::new();
        for node in nodes {
            if by_id.contains_key(&node.id) {
                return Err(OverlayError::DuplicateCollectionId(node.id));
            }
            by_id.insert(node.id, node);
        }

        for node in by_id.values() {
            let Some(parent_id) = node.parent_id else {
                continue;
            };
            match by_id.get(&parent_id) {
                Some(parent) if parent.is_plain() => {}
                _ => {
                    return Err(OverlayError::InvalidParent {
                        id: node.id,
                        parent_id,
                    })
                }
            }
        }

        let mut tree = Self::new();
        for node in by_id.into_values() {
            tree.index(node);
        }
        for id in tree.nodes.keys() {
            tree.ancestors(*id)?;
        }
        Ok(tree)
    }

    /// Checks that `id` is free and `parent_id` names a plain node.
    ///
    /// Returns the scope new children of `parent_id` must be created in.
    pub fn validate_new(
        &self,
        id: CollectionId,
        parent_id: Option<CollectionId>,
    ) -> OverlayResult<Scope> {
        if self.nodes.contains_key(&id) {
            return Err(OverlayError::DuplicateCollectionId(id));
        }
        let Some(parent_id) = parent_id else {
            return Ok(Scope::Root);
        };
        match self.nodes.get(&parent_id) {
            Some(parent) if parent.is_plain() => Ok(Scope::Plain(parent.handle)),
            _ => Err(OverlayError::InvalidParent { id, parent_id }),
        }
    }

    /// Creates a collection in the engine and registers it under its parent.
    pub fn create_collection<E: RenderEngine>(
        &mut self,
        engine: &mut E,
        id: CollectionId,
        parent_id: Option<CollectionId>,
        kind: CollectionKind,
    ) -> OverlayResult<CollectionNode> {
        let parent_scope = self.validate_new(id, parent_id)?;
        let handle = match kind {
            CollectionKind::Plain => engine.create_collection(parent_scope),
            CollectionKind::Clusterized => engine.create_clusterized_collection(parent_scope),
        };
        let node = CollectionNode {
            id,
            parent_id,
            kind,
            handle,
        };
        self.index(node.clone());
        debug!(
            "event=collection_create module=tree status=ok collection_id={} kind={:?}",
            id, kind
        );
        Ok(node)
    }

    /// Resolves an optional id to an engine scope; `None` is the root.
    pub fn resolve(&self, id: Option<CollectionId>) -> OverlayResult<Scope> {
        let Some(id) = id else {
            return Ok(Scope::Root);
        };
        let node = self.node(id)?;
        Ok(match node.kind {
            CollectionKind::Plain => Scope::Plain(node.handle),
            CollectionKind::Clusterized => Scope::Clusterized(node.handle),
        })
    }

    pub fn node(&self, id: CollectionId) -> OverlayResult<&CollectionNode> {
        self.nodes
            .get(&id)
            .ok_or(OverlayError::CollectionNotFound(id))
    }

    pub fn contains(&self, id: CollectionId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Translates an engine collection handle back to its caller id.
    pub fn id_for_handle(&self, handle: EngineHandle) -> Option<CollectionId> {
        self.by_handle.get(&handle).copied()
    }

    /// Direct children of `parent_id` (`None` is the root), ascending.
    pub fn children_of(&self, parent_id: Option<CollectionId>) -> Vec<CollectionId> {
        self.children
            .get(&parent_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Every collection transitively nested under `id`, excluding `id`.
    ///
    /// `None` yields every node in the tree.
    pub fn descendant_ids(&self, id: Option<CollectionId>) -> BTreeSet<CollectionId> {
        let mut found = BTreeSet::new();
        let mut frontier = vec![id];
        while let Some(parent) = frontier.pop() {
            let Some(children) = self.children.get(&parent) else {
                continue;
            };
            for child in children {
                if found.insert(*child) {
                    frontier.push(Some(*child));
                }
            }
        }
        found
    }

    /// Parent chain of `id`, nearest first, not including the root.
    pub fn ancestors(&self, id: CollectionId) -> OverlayResult<Vec<CollectionId>> {
        let mut chain = Vec::new();
        let mut visited = BTreeSet::from([id]);
        let mut cursor = self.node(id)?.parent_id;
        while let Some(current) = cursor {
            if !visited.insert(current) {
                return Err(OverlayError::InvalidParent {
                    id,
                    parent_id: current,
                });
            }
            chain.push(current);
            cursor = self.node(current)?.parent_id;
        }
        Ok(chain)
    }

    /// Drops every descendant of `id` while keeping `id` itself.
    ///
    /// Returns the dropped nodes, deepest first.
    pub fn detach_descendants(&mut self, id: CollectionId) -> OverlayResult<Vec<CollectionNode>> {
        self.node(id)?;
        let mut dropped = Vec::new();
        self.drain_children(Some(id), &mut dropped);
        Ok(dropped)
    }

    /// Drops `id` and its whole subtree; descendants go first, `id` last.
    pub fn remove(&mut self, id: CollectionId) -> OverlayResult<Vec<CollectionNode>> {
        let mut dropped = self.detach_descendants(id)?;
        if let Some(node) = self.unindex(id) {
            dropped.push(node);
        }
        Ok(dropped)
    }

    /// Forgets every node; the implicit root remains.
    pub fn clear(&mut self) -> Vec<CollectionNode> {
        self.children.clear();
        self.by_handle.clear();
        std::mem::take(&mut self.nodes).into_values().collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CollectionNode> {
        self.nodes.values()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn index(&mut self, node: CollectionNode) {
        self.children.entry(node.parent_id).or_default().insert(node.id);
        self.by_handle.insert(node.handle, node.id);
        self.nodes.insert(node.id, node);
    }

    fn unindex(&mut self, id: CollectionId) -> Option<CollectionNode> {
        let node = self.nodes.remove(&id)?;
        self.by_handle.remove(&node.handle);
        if let Some(siblings) = self.children.get_mut(&node.parent_id) {
            siblings.remove(&id);
            if siblings.is_empty() {
                self.children.remove(&node.parent_id);
            }
        }
        Some(node)
    }

    fn drain_children(&mut self, parent: Option<CollectionId>, dropped: &mut Vec<CollectionNode>) {
        let Some(children) = self.children.remove(&parent) else {
            return;
        };
        for child in children {
            self.drain_children(Some(child), dropped);
            if let Some(node) = self.nodes.remove(&child) {
                self.by_handle.remove(&node.handle);
                dropped.push(node);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CollectionTree;
    use crate::engine::{EngineHandle, MemoryEngine, Scope};
    use crate::error::OverlayError;
    use crate::model::overlay::{CollectionKind, CollectionNode};

    fn node(id: i64, parent_id: Option<i64>, kind: CollectionKind) -> CollectionNode {
        CollectionNode {
            id,
            parent_id,
            kind,
            handle: EngineHandle(100 + id as u64),
        }
    }

    #[test]
    fn create_rejects_clusterized_parent() {
        let mut engine = MemoryEngine::new();
        let mut tree = CollectionTree::new();
        tree.create_collection(&mut engine, 1, None, CollectionKind::Clusterized)
            .expect("clusterized under root");

        let err = tree
            .create_collection(&mut engine, 2, Some(1), CollectionKind::Plain)
            .expect_err("clusterized parent");
        assert_eq!(err, OverlayError::InvalidParent { id: 2, parent_id: 1 });
        assert_eq!(tree.len(), 1);
        assert_eq!(engine.object_count(), 1);
    }

    #[test]
    fn create_rejects_id_reused_across_kinds() {
        let mut engine = MemoryEngine::new();
        let mut tree = CollectionTree::new();
        tree.create_collection(&mut engine, 5, None, CollectionKind::Plain)
            .expect("plain");
        let err = tree
            .create_collection(&mut engine, 5, None, CollectionKind::Clusterized)
            .expect_err("same id");
        assert_eq!(err, OverlayError::DuplicateCollectionId(5));
    }

    #[test]
    fn resolve_maps_kind_to_scope_variant() {
        let mut engine = MemoryEngine::new();
        let mut tree = CollectionTree::new();
        let plain = tree
            .create_collection(&mut engine, 1, None, CollectionKind::Plain)
            .expect("plain");
        let leaf = tree
            .create_collection(&mut engine, 2, Some(1), CollectionKind::Clusterized)
            .expect("leaf");

        assert_eq!(tree.resolve(None), Ok(Scope::Root));
        assert_eq!(tree.resolve(Some(1)), Ok(Scope::Plain(plain.handle)));
        assert_eq!(tree.resolve(Some(2)), Ok(Scope::Clusterized(leaf.handle)));
        assert_eq!(tree.resolve(Some(9)), Err(OverlayError::CollectionNotFound(9)));
    }

    #[test]
    fn from_nodes_accepts_children_before_parents() {
        let tree = CollectionTree::from_nodes(vec![
            node(4, Some(3), CollectionKind::Clusterized),
            node(3, Some(2), CollectionKind::Plain),
            node(2, Some(1), CollectionKind::Plain),
            node(1, None, CollectionKind::Plain),
            node(9, None, CollectionKind::Plain),
        ])
        .expect("valid forest");

        assert_eq!(
            tree.descendant_ids(Some(1)).into_iter().collect::<Vec<_>>(),
            vec![2, 3, 4]
        );
        assert_eq!(tree.ancestors(4).expect("chain"), vec![3, 2, 1]);
        assert_eq!(tree.descendant_ids(None).len(), 5);
    }

    #[test]
    fn from_nodes_rejects_cycles_and_leaf_parents() {
        let cycle = CollectionTree::from_nodes(vec![
            node(1, Some(2), CollectionKind::Plain),
            node(2, Some(1), CollectionKind::Plain),
        ]);
        assert!(matches!(cycle, Err(OverlayError::InvalidParent { .. })));

        let leaf_parent = CollectionTree::from_nodes(vec![
            node(2, Some(1), CollectionKind::Plain),
            node(1, None, CollectionKind::Clusterized),
        ]);
        assert_eq!(
            leaf_parent.err(),
            Some(OverlayError::InvalidParent { id: 2, parent_id: 1 })
        );
    }

    #[test]
    fn remove_drops_subtree_and_keeps_siblings() {
        let mut tree = CollectionTree::from_nodes(vec![
            node(1, None, CollectionKind::Plain),
            node(2, Some(1), CollectionKind::Plain),
            node(3, Some(2), CollectionKind::Clusterized),
            node(4, None, CollectionKind::Plain),
        ])
        .expect("forest");

        let dropped = tree.remove(1).expect("remove subtree");
        let ids = dropped.iter().map(|node| node.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(tree.children_of(None), vec![4]);
        assert_eq!(tree.id_for_handle(EngineHandle(102)), None);
        assert_eq!(tree.id_for_handle(EngineHandle(104)), Some(4));
    }
}
