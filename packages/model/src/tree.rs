//! # Component Tree Arena
//!
//! All nodes live in one arena keyed by [`NodeId`]. Parents exclusively own
//! their children; every other relation (the parent back-link included) is a
//! plain id, so a removed node simply stops resolving.
//!
//! Nodes without a parent are roots: page wrappers, freshly created nodes and
//! clones that have not been appended anywhere yet.

use crate::error::{TreeError, TreeResult};
use crate::id_generator::IdGenerator;
use crate::node::{Node, NodeDef, NodeId};
use std::collections::HashMap;

const DEFAULT_SEED_NAME: &str = "composer";

/// Arena of component nodes
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: HashMap<NodeId, Node>,
    roots: Vec<NodeId>,
    ids: IdGenerator,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new(DEFAULT_SEED_NAME)
    }
}

impl Tree {
    /// Create an empty tree whose generated ids derive from `seed_name`
    pub fn new(seed_name: &str) -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            ids: IdGenerator::new(seed_name),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Like [`Tree::get`] but with an error for missing nodes
    pub fn node(&self, id: &NodeId) -> TreeResult<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.clone()))
    }

    pub fn node_mut(&mut self, id: &NodeId) -> TreeResult<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| TreeError::NodeNotFound(id.clone()))
    }

    /// Detached nodes, in creation order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn children(&self, id: &NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn parent(&self, id: &NodeId) -> Option<&NodeId> {
        self.nodes.get(id).and_then(|n| n.parent.as_ref())
    }

    /// Position of a node among its parent's children
    pub fn index_of(&self, id: &NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| c == id)
    }

    /// Generate an id that is not in use
    pub fn generate_id(&mut self) -> NodeId {
        let nodes = &self.nodes;
        self.ids.next_id(|id| nodes.contains_key(id))
    }

    /// Materialize a definition (and its components) as a new root.
    ///
    /// Definition ids are kept when free; missing or clashing ids are
    /// replaced by generated ones.
    pub fn create(&mut self, def: &NodeDef) -> NodeId {
        let id = self.materialize(def, None);
        self.roots.push(id.clone());
        id
    }

    fn materialize(&mut self, def: &NodeDef, parent: Option<&NodeId>) -> NodeId {
        let id = match &def.id {
            Some(id) if !id.is_empty() && !self.nodes.contains_key(id.as_str()) => {
                NodeId::new(id.clone())
            }
            _ => self.generate_id(),
        };

        let mut node = Node::from_def(id.clone(), def);
        node.parent = parent.cloned();
        self.nodes.insert(id.clone(), node);

        let children: Vec<NodeId> = def
            .components
            .iter()
            .map(|child| self.materialize(child, Some(&id)))
            .collect();
        if let Some(node) = self.nodes.get_mut(&id) {
            node.children = children;
        }

        id
    }

    /// Attach a detached node under `parent`.
    ///
    /// `index` of `None` appends. Returns the final position.
    pub fn insert(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        index: Option<usize>,
    ) -> TreeResult<usize> {
        let child_node = self.node(child)?;
        if child_node.parent.is_some() {
            return Err(TreeError::NotDetached(child.clone()));
        }

        let len = self.node(parent)?.children.len();
        if self.is_ancestor_or_self(child, parent) {
            return Err(TreeError::CycleDetected {
                node: child.clone(),
                parent: parent.clone(),
            });
        }

        let index = index.unwrap_or(len);
        if index > len {
            return Err(TreeError::IndexOutOfRange {
                parent: parent.clone(),
                index,
                len,
            });
        }

        self.roots.retain(|r| r != child);
        self.node_mut(child)?.parent = Some(parent.clone());
        self.node_mut(parent)?.children.insert(index, child.clone());

        Ok(index)
    }

    /// Detach a node from its parent, turning it into a root.
    ///
    /// Returns the former parent and position, or `None` if it was already
    /// a root.
    pub fn detach(&mut self, id: &NodeId) -> TreeResult<Option<(NodeId, usize)>> {
        let parent = match self.node(id)?.parent.clone() {
            Some(parent) => parent,
            None => return Ok(None),
        };

        let siblings = &mut self.node_mut(&parent)?.children;
        let index = siblings
            .iter()
            .position(|c| c == id)
            .ok_or_else(|| TreeError::NodeNotFound(id.clone()))?;
        siblings.remove(index);

        self.node_mut(id)?.parent = None;
        self.roots.push(id.clone());

        Ok(Some((parent, index)))
    }

    /// Remove a node and all of its descendants from the arena
    pub fn delete_subtree(&mut self, id: &NodeId) -> TreeResult<Vec<Node>> {
        self.detach(id)?;
        let ids = self.descendants(id);

        self.roots.retain(|r| r != id);
        Ok(ids
            .iter()
            .filter_map(|descendant| self.nodes.remove(descendant))
            .collect())
    }

    /// The node itself followed by all descendants, in pre-order
    pub fn descendants(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }

        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            stack.extend(self.children(&current).iter().rev().cloned());
            out.push(current);
        }
        out
    }

    /// Ancestors of a node, nearest first
    pub fn ancestors(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            out.push(parent.clone());
            current = self.parent(parent);
        }
        out
    }

    pub fn is_ancestor_or_self(&self, ancestor: &NodeId, node: &NodeId) -> bool {
        ancestor == node || self.ancestors(node).iter().any(|a| a == ancestor)
    }

    /// Topmost ancestor of a node (the node itself if detached)
    pub fn root_of(&self, id: &NodeId) -> NodeId {
        self.ancestors(id).pop().unwrap_or_else(|| id.clone())
    }

    /// Deep-copy a subtree under fresh ids as a new root.
    ///
    /// Returns `(source, clone)` pairs in pre-order; the first pair is the
    /// subtree root.
    pub fn deep_clone(&mut self, id: &NodeId) -> TreeResult<Vec<(NodeId, NodeId)>> {
        self.node(id)?;
        let mut pairs = Vec::new();
        let root = self.clone_into(id, None, &mut pairs)?;
        self.roots.push(root);
        Ok(pairs)
    }

    fn clone_into(
        &mut self,
        source: &NodeId,
        parent: Option<&NodeId>,
        pairs: &mut Vec<(NodeId, NodeId)>,
    ) -> TreeResult<NodeId> {
        let clone_id = self.generate_id();
        let mut clone = self.node(source)?.duplicate(clone_id.clone());
        clone.parent = parent.cloned();
        self.nodes.insert(clone_id.clone(), clone);
        pairs.push((source.clone(), clone_id.clone()));

        let children = self.children(source).to_vec();
        let mut cloned_children = Vec::with_capacity(children.len());
        for child in &children {
            cloned_children.push(self.clone_into(child, Some(&clone_id), pairs)?);
        }
        self.node_mut(&clone_id)?.children = cloned_children;

        Ok(clone_id)
    }

    /// Child indices leading from `root` down to `node`
    pub fn path_from(&self, root: &NodeId, node: &NodeId) -> Option<Vec<usize>> {
        let mut path = Vec::new();
        let mut current = node.clone();
        while &current != root {
            path.push(self.index_of(&current)?);
            current = self.parent(&current)?.clone();
        }
        path.reverse();
        Some(path)
    }

    pub fn node_at_path(&self, root: &NodeId, path: &[usize]) -> Option<NodeId> {
        let mut current = root.clone();
        for &index in path {
            current = self.children(&current).get(index)?.clone();
        }
        self.contains(&current).then_some(current)
    }

    /// Whether two subtrees have the same child counts at every depth
    pub fn same_shape(&self, a: &NodeId, b: &NodeId) -> bool {
        let (left, right) = (self.children(a), self.children(b));
        left.len() == right.len()
            && left
                .iter()
                .zip(right.iter())
                .all(|(l, r)| self.same_shape(l, r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Tree, NodeId) {
        let mut tree = Tree::new("test");
        let root = tree.create(
            &NodeDef::new("body")
                .with_id("wrapper")
                .with_child(NodeDef::text("div", "one").with_id("a"))
                .with_child(
                    NodeDef::new("div")
                        .with_id("b")
                        .with_child(NodeDef::text("span", "nested").with_id("c")),
                ),
        );
        (tree, root)
    }

    #[test]
    fn test_create_keeps_definition_ids() {
        let (tree, root) = sample();
        assert_eq!(root.as_str(), "wrapper");
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.roots(), &[root.clone()]);
        assert_eq!(tree.parent(&"c".into()), Some(&NodeId::from("b")));
        assert_eq!(tree.index_of(&"b".into()), Some(1));
    }

    #[test]
    fn test_create_replaces_clashing_ids() {
        let (mut tree, _) = sample();
        let dup = tree.create(&NodeDef::new("div").with_id("a"));
        assert_ne!(dup.as_str(), "a");
        assert!(tree.contains(&dup));
    }

    #[test]
    fn test_descendants_are_pre_order() {
        let (tree, root) = sample();
        let ids: Vec<_> = tree
            .descendants(&root)
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(ids, vec!["wrapper", "a", "b", "c"]);
    }

    #[test]
    fn test_insert_rejects_attached_nodes_and_cycles() {
        let (mut tree, root) = sample();

        let err = tree.insert(&root, &"c".into(), None).unwrap_err();
        assert_eq!(err, TreeError::NotDetached("c".into()));

        tree.detach(&"b".into()).unwrap();
        let err = tree.insert(&"c".into(), &"b".into(), None).unwrap_err();
        assert!(matches!(err, TreeError::CycleDetected { .. }));
    }

    #[test]
    fn test_insert_index_out_of_range() {
        let (mut tree, root) = sample();
        let fresh = tree.create(&NodeDef::new("p"));

        let err = tree.insert(&root, &fresh, Some(5)).unwrap_err();
        assert!(matches!(err, TreeError::IndexOutOfRange { index: 5, len: 2, .. }));

        assert_eq!(tree.insert(&root, &fresh, Some(0)).unwrap(), 0);
        assert_eq!(tree.children(&root)[0], fresh);
        assert_eq!(tree.roots(), &[root]);
    }

    #[test]
    fn test_detach_and_delete_subtree() {
        let (mut tree, root) = sample();

        let removed = tree.delete_subtree(&"b".into()).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!tree.contains(&"c".into()));
        assert_eq!(tree.children(&root).len(), 1);
        assert_eq!(tree.roots(), &[root]);
    }

    #[test]
    fn test_deep_clone_uses_fresh_ids() {
        let (mut tree, _) = sample();

        let pairs = tree.deep_clone(&"b".into()).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].0.as_str(), "b");
        assert_ne!(pairs[0].1.as_str(), "b");

        let clone = tree.get(&pairs[0].1).unwrap();
        assert!(clone.parent().is_none());
        assert_eq!(clone.children(), &[pairs[1].1.clone()]);
        assert_eq!(
            tree.get(&pairs[1].1).unwrap().content.as_deref(),
            Some("nested")
        );
        assert!(tree.same_shape(&pairs[0].0, &pairs[0].1));
    }

    #[test]
    fn test_paths() {
        let (tree, root) = sample();
        let path = tree.path_from(&root, &"c".into()).unwrap();
        assert_eq!(path, vec![1, 0]);
        assert_eq!(tree.node_at_path(&root, &path), Some("c".into()));
        assert_eq!(tree.root_of(&"c".into()), root);
    }
}
