//! # Propagation Engine
//!
//! Replays a mutation made on one relation member onto every other member.
//!
//! ## Mutation kinds
//!
//! - **Insert**: the inserted subtree is deep-cloned into every peer at the
//!   same index and the copies are linked by the nesting resolver
//! - **Remove**: the child at the same index is removed from every peer and
//!   its links are torn down
//! - **Move**: same-parent moves reorder every peer; cross-parent moves are
//!   a propagated removal followed by a propagated insertion
//! - **Property edits**: attributes, classes, style, properties and content
//!   are copied verbatim, minus protected keys and keys held back by a
//!   [`PropagationStop`](composer_model::PropagationStop)
//!
//! ## Guarantees
//!
//! Structural mutations are planned before anything is touched. A peer that
//! cannot mirror the target index aborts the whole mutation; a peer that has
//! drifted out of congruence is skipped with a warning. Each fan-out runs
//! inside a [`SyncScope`] so no peer is ever synchronized twice or becomes a
//! new propagation origin.

use crate::config::EditorConfig;
use crate::errors::{EditorError, RelationError, SyncWarning};
use crate::events::ChangeKind;
use crate::nesting;
use crate::relation::RelationIndex;
use composer_model::{Node, NodeId, Tree, TreeError};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

pub const CLASS_KEY: &str = "class";
pub const STYLE_KEY: &str = "style";
pub const CONTENT_KEY: &str = "content";

/// Visited set for one fan-out
#[derive(Debug, Default)]
pub struct SyncScope {
    visited: HashSet<NodeId>,
}

impl SyncScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a node as synchronized. Returns `false` if it already was.
    pub fn enter(&mut self, id: &NodeId) -> bool {
        self.visited.insert(id.clone())
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.visited.contains(id)
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }
}

/// Attribute, class, style, property or content edit
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyEdit {
    Attributes(BTreeMap<String, String>),
    AddClasses(Vec<String>),
    RemoveClasses(Vec<String>),
    /// An empty value removes the style property
    Style(BTreeMap<String, String>),
    /// `Value::Null` removes the property
    Property { key: String, value: Value },
    Content(Option<String>),
}

impl PropertyEdit {
    pub fn kind(&self) -> ChangeKind {
        match self {
            PropertyEdit::Attributes(_) => ChangeKind::Attributes,
            PropertyEdit::AddClasses(_) | PropertyEdit::RemoveClasses(_) => ChangeKind::Classes,
            PropertyEdit::Style(_) => ChangeKind::Style,
            PropertyEdit::Property { .. } => ChangeKind::Property,
            PropertyEdit::Content(_) => ChangeKind::Content,
        }
    }

    /// The part of this edit whose keys pass `allow`
    pub fn restrict(&self, allow: impl Fn(&str) -> bool) -> Option<PropertyEdit> {
        match self {
            PropertyEdit::Attributes(attributes) => {
                let kept: BTreeMap<_, _> = attributes
                    .iter()
                    .filter(|(name, _)| allow(name))
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                (!kept.is_empty()).then_some(PropertyEdit::Attributes(kept))
            }
            PropertyEdit::AddClasses(_) | PropertyEdit::RemoveClasses(_) => {
                allow(CLASS_KEY).then(|| self.clone())
            }
            PropertyEdit::Style(_) => allow(STYLE_KEY).then(|| self.clone()),
            PropertyEdit::Property { key, .. } => allow(key).then(|| self.clone()),
            PropertyEdit::Content(_) => allow(CONTENT_KEY).then(|| self.clone()),
        }
    }

    pub fn apply_to(&self, node: &mut Node) {
        match self {
            PropertyEdit::Attributes(attributes) => {
                node.attributes
                    .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            PropertyEdit::AddClasses(names) => {
                for name in names {
                    if !node.has_class(name) {
                        node.classes.push(name.clone());
                    }
                }
            }
            PropertyEdit::RemoveClasses(names) => {
                node.classes.retain(|c| !names.contains(c));
            }
            PropertyEdit::Style(style) => {
                for (property, value) in style {
                    if value.is_empty() {
                        node.style.remove(property);
                    } else {
                        node.style.insert(property.clone(), value.clone());
                    }
                }
            }
            PropertyEdit::Property { key, value } => {
                if value.is_null() {
                    node.properties.remove(key);
                } else {
                    node.properties.insert(key.clone(), value.clone());
                }
            }
            PropertyEdit::Content(content) => node.content = content.clone(),
        }
    }
}

/// Planned removal of one child and its counterparts
#[derive(Debug)]
struct RemovePlan {
    parent: Option<NodeId>,
    /// `(peer, counterpart child)` to delete
    targets: Vec<(NodeId, NodeId)>,
    warnings: Vec<SyncWarning>,
}

/// Planned insertion of one subtree into a parent and its peers
#[derive(Debug)]
struct InsertPlan {
    parent: NodeId,
    index: usize,
    peers: Vec<NodeId>,
    /// Main symbol of the parent's relation
    main: Option<NodeId>,
    /// Members of the inserted subtree cut from their relation first
    isolate: Vec<NodeId>,
    warnings: Vec<SyncWarning>,
}

/// Planned reorder inside one parent and its peers
#[derive(Debug)]
struct ReorderPlan {
    parent: NodeId,
    index: usize,
    targets: Vec<(NodeId, NodeId)>,
    warnings: Vec<SyncWarning>,
}

/// Applies one top-level mutation and its fan-out
pub(crate) struct Synchronizer<'a> {
    tree: &'a mut Tree,
    relations: &'a mut RelationIndex,
    config: &'a EditorConfig,
    scope: SyncScope,
    affected: Vec<NodeId>,
    warnings: Vec<SyncWarning>,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        tree: &'a mut Tree,
        relations: &'a mut RelationIndex,
        config: &'a EditorConfig,
    ) -> Self {
        Self {
            tree,
            relations,
            config,
            scope: SyncScope::new(),
            affected: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Nodes touched and warnings raised so far
    pub fn finish(self) -> (Vec<NodeId>, Vec<SyncWarning>) {
        (self.affected, self.warnings)
    }

    /// Start a new fan-out (a cross-parent move runs two)
    fn reset_scope(&mut self) {
        self.scope = SyncScope::new();
    }

    fn peers_of(&self, id: &NodeId) -> Vec<NodeId> {
        self.peers_in(&*self.relations, id)
    }

    fn peers_in(&self, relations: &RelationIndex, id: &NodeId) -> Vec<NodeId> {
        relations
            .relation_set(id)
            .into_iter()
            .filter(|peer| peer != id && !self.scope.contains(peer))
            .collect()
    }

    /// Whether an edit to `key` may leave (or reach) `id`
    fn key_flows(&self, id: &NodeId, key: &str) -> bool {
        std::iter::once(id.clone())
            .chain(self.tree.ancestors(id))
            .filter_map(|n| self.tree.get(&n).and_then(|node| node.propagation.clone()))
            .all(|stop| stop.allows(key))
    }

    /// Whether `candidate` (in a peer) stands for `node` (at the origin)
    fn corresponds(&self, candidate: &NodeId, node: &NodeId) -> bool {
        match (
            self.relations.is_linked(candidate),
            self.relations.is_linked(node),
        ) {
            (false, false) => true,
            _ => self.relations.same_relation(candidate, node),
        }
    }

    fn mismatch(origin: &NodeId, peer: &NodeId, reason: String) -> SyncWarning {
        warn!(origin = %origin, peer = %peer, %reason, "Skipping peer: structural mismatch");
        SyncWarning::StructuralMismatch {
            origin: origin.clone(),
            peer: peer.clone(),
            reason,
        }
    }

    // -- property edits ---------------------------------------------------

    pub fn edit(&mut self, origin: &NodeId, edit: &PropertyEdit) -> Result<(), EditorError> {
        edit.apply_to(self.tree.node_mut(origin)?);
        self.affected.push(origin.clone());

        if !self.scope.enter(origin) {
            return Ok(());
        }

        let outgoing = edit.restrict(|key| {
            !self.config.is_protected(key) && self.key_flows(origin, key)
        });
        let Some(outgoing) = outgoing else {
            debug!(origin = %origin, "Edit kept local");
            return Ok(());
        };

        let peers = self.peers_of(origin);
        debug!(origin = %origin, peers = peers.len(), kind = ?edit.kind(), "Propagating edit");

        for peer in peers {
            if !self.scope.enter(&peer) {
                continue;
            }
            let Some(incoming) = outgoing.restrict(|key| self.key_flows(&peer, key)) else {
                debug!(peer = %peer, "Peer shielded by propagation stop");
                continue;
            };
            incoming.apply_to(self.tree.node_mut(&peer)?);
            self.affected.push(peer);
        }

        Ok(())
    }

    // -- insertion --------------------------------------------------------

    /// Insert a detached node under `parent` and mirror it into every peer
    pub fn insert(
        &mut self,
        parent: &NodeId,
        node: &NodeId,
        index: Option<usize>,
    ) -> Result<(), EditorError> {
        if self.tree.node(node)?.parent().is_some() {
            return Err(TreeError::NotDetached(node.clone()).into());
        }
        let plan = self.plan_insert(parent, node, index, &HashMap::new())?;
        self.commit_insert(plan, node)
    }

    /// Validate an insertion. `shrink` holds child-count reductions that an
    /// earlier phase of the same mutation will have applied.
    fn plan_insert(
        &self,
        parent: &NodeId,
        node: &NodeId,
        index: Option<usize>,
        shrink: &HashMap<NodeId, usize>,
    ) -> Result<InsertPlan, EditorError> {
        self.tree.node(node)?;
        self.tree.node(parent)?;
        let len_of = |id: &NodeId| {
            self.tree
                .children(id)
                .len()
                .saturating_sub(shrink.get(id).copied().unwrap_or(0))
        };

        let len = len_of(parent);
        let index = index.unwrap_or(len);
        if index > len {
            return Err(TreeError::IndexOutOfRange {
                parent: parent.clone(),
                index,
                len,
            }
            .into());
        }
        if self.tree.is_ancestor_or_self(node, parent) {
            return Err(TreeError::CycleDetected {
                node: node.clone(),
                parent: parent.clone(),
            }
            .into());
        }

        let mut warnings = Vec::new();
        let isolate = self.nesting_conflicts(parent, node);
        let isolated;
        let relations = if isolate.is_empty() {
            &*self.relations
        } else {
            let error = RelationError::NestedInOwnRelation {
                node: node.clone(),
                parent: parent.clone(),
            };
            warn!(
                node = %node,
                parent = %parent,
                members = isolate.len(),
                %error,
                "Cutting nested members from their relation"
            );
            warnings.push(SyncWarning::InvalidRelation {
                node: node.clone(),
                error,
            });
            let mut view = self.relations.clone();
            for member in &isolate {
                view.isolate(member);
            }
            isolated = view;
            &isolated
        };

        let mut peers = Vec::new();
        let candidates = self.peers_in(relations, parent);
        for peer in candidates {
            let peer_len = len_of(&peer);
            if peer_len < index {
                return Err(EditorError::PeerIndexOutOfRange {
                    peer,
                    index,
                    len: peer_len,
                });
            }
            if peer_len != len {
                warnings.push(Self::mismatch(
                    parent,
                    &peer,
                    format!("{} children, expected {}", peer_len, len),
                ));
                continue;
            }
            peers.push(peer);
        }

        let main = relations
            .is_linked(parent)
            .then(|| relations.top_template(parent));

        Ok(InsertPlan {
            parent: parent.clone(),
            index,
            peers,
            main,
            isolate,
            warnings,
        })
    }

    /// Members of the subtree at `node` that share a relation with the
    /// insertion point or one of its ancestors. Left linked, they would
    /// end up nested inside their own relation.
    fn nesting_conflicts(&self, parent: &NodeId, node: &NodeId) -> Vec<NodeId> {
        let enclosing: HashSet<NodeId> = std::iter::once(parent.clone())
            .chain(self.tree.ancestors(parent))
            .filter(|id| self.relations.is_linked(id))
            .map(|id| self.relations.top_template(&id))
            .collect();
        if enclosing.is_empty() {
            return Vec::new();
        }

        self.tree
            .descendants(node)
            .into_iter()
            .filter(|id| self.relations.is_linked(id))
            .filter(|id| enclosing.contains(&self.relations.top_template(id)))
            .collect()
    }

    fn commit_insert(&mut self, mut plan: InsertPlan, node: &NodeId) -> Result<(), EditorError> {
        self.warnings.extend(plan.warnings);
        for member in &plan.isolate {
            self.relations.isolate(member);
            self.affected.push(member.clone());
        }
        if !plan.isolate.is_empty() {
            let parent = plan.parent.clone();
            let relations = &*self.relations;
            plan.peers.retain(|peer| relations.same_relation(peer, &parent));
        }
        self.tree.insert(&plan.parent, node, Some(plan.index))?;
        self.scope.enter(&plan.parent);
        self.affected.push(node.clone());

        if plan.peers.is_empty() {
            return Ok(());
        }

        let source = self.tree.descendants(node);
        let mut copies = Vec::new();
        for peer in &plan.peers {
            if !self.tree.contains(peer) || !self.scope.enter(peer) {
                continue;
            }
            let pairs = self.tree.deep_clone(node)?;
            let Some((_, clone_root)) = pairs.first().cloned() else {
                continue;
            };
            self.tree.insert(peer, &clone_root, Some(plan.index))?;
            self.affected.push(clone_root);
            copies.push((peer.clone(), pairs.into_iter().map(|(_, c)| c).collect()));
        }

        debug!(
            parent = %plan.parent,
            node = %node,
            index = plan.index,
            peers = copies.len(),
            "Propagated insert"
        );

        let canonical_peer = match &plan.main {
            Some(main) if *main != plan.parent => Some(main),
            _ => None,
        };
        let warnings =
            nesting::link_copies(self.tree, self.relations, &source, &copies, canonical_peer);
        self.warnings.extend(warnings);
        Ok(())
    }

    // -- removal ----------------------------------------------------------

    /// Remove a node (and its subtree) plus its counterpart in every peer
    pub fn remove(&mut self, node: &NodeId) -> Result<(), EditorError> {
        let plan = self.plan_remove(node)?;
        self.commit_remove(plan, node, true)
    }

    fn plan_remove(&self, node: &NodeId) -> Result<RemovePlan, EditorError> {
        self.tree.node(node)?;
        let Some(parent) = self.tree.parent(node).cloned() else {
            return Ok(RemovePlan {
                parent: None,
                targets: Vec::new(),
                warnings: Vec::new(),
            });
        };
        let index = self
            .tree
            .index_of(node)
            .ok_or_else(|| TreeError::NodeNotFound(node.clone()))?;
        let len = self.tree.children(&parent).len();

        let mut targets = Vec::new();
        let mut warnings = Vec::new();
        for peer in self.peers_of(&parent) {
            let children = self.tree.children(&peer);
            if children.len() <= index {
                return Err(EditorError::PeerIndexOutOfRange {
                    peer,
                    index,
                    len: children.len(),
                });
            }
            if children.len() != len {
                let reason = format!("{} children, expected {}", children.len(), len);
                warnings.push(Self::mismatch(&parent, &peer, reason));
                continue;
            }
            let candidate = children[index].clone();
            if !self.corresponds(&candidate, node) {
                let reason = format!("child {} does not mirror {}", candidate, node);
                warnings.push(Self::mismatch(&parent, &peer, reason));
                continue;
            }
            targets.push((peer, candidate));
        }

        Ok(RemovePlan {
            parent: Some(parent),
            targets,
            warnings,
        })
    }

    /// Apply a removal plan. With `delete_origin` unset the origin node is
    /// only detached (it is about to be re-inserted by a move).
    fn commit_remove(
        &mut self,
        plan: RemovePlan,
        node: &NodeId,
        delete_origin: bool,
    ) -> Result<(), EditorError> {
        self.warnings.extend(plan.warnings);
        if let Some(parent) = &plan.parent {
            self.scope.enter(parent);
        }

        let mut doomed = Vec::new();
        if delete_origin {
            doomed.push(node.clone());
        }
        for (peer, child) in plan.targets {
            if self.scope.enter(&peer) {
                doomed.push(child);
            }
        }

        let promote = self.config.promote_on_template_removal;
        let warnings = self.relations.unlink_subtrees(self.tree, &doomed, promote);
        self.warnings.extend(warnings);

        if !delete_origin {
            self.tree.detach(node)?;
            self.affected.push(node.clone());
        }
        for id in doomed {
            self.tree.delete_subtree(&id)?;
            self.affected.push(id);
        }

        debug!(node = %node, "Propagated removal");
        Ok(())
    }

    // -- moves ------------------------------------------------------------

    /// Move a node to `index` under `new_parent`.
    ///
    /// `index` is the final position of the node.
    pub fn move_to(
        &mut self,
        node: &NodeId,
        new_parent: &NodeId,
        index: usize,
    ) -> Result<(), EditorError> {
        self.tree.node(new_parent)?;
        let Some(old_parent) = self.tree.parent(node).cloned() else {
            return self.insert(new_parent, node, Some(index));
        };

        if old_parent == *new_parent {
            let plan = self.plan_reorder(node, index)?;
            return self.commit_reorder(plan, node);
        }

        if self.tree.is_ancestor_or_self(node, new_parent) {
            return Err(TreeError::CycleDetected {
                node: node.clone(),
                parent: new_parent.clone(),
            }
            .into());
        }

        let removal = self.plan_remove(node)?;
        let mut shrink = HashMap::from([(old_parent.clone(), 1)]);
        for (peer, _) in &removal.targets {
            *shrink.entry(peer.clone()).or_insert(0) += 1;
        }
        let mut insertion = self.plan_insert(new_parent, node, Some(index), &shrink)?;
        insertion
            .peers
            .retain(|peer| !removal.targets.iter().any(|(_, child)| self.tree.is_ancestor_or_self(child, peer)));

        self.commit_remove(removal, node, false)?;
        self.reset_scope();
        self.commit_insert(insertion, node)
    }

    fn plan_reorder(&self, node: &NodeId, index: usize) -> Result<ReorderPlan, EditorError> {
        let parent = self
            .tree
            .parent(node)
            .cloned()
            .ok_or_else(|| TreeError::NodeNotFound(node.clone()))?;
        let from = self
            .tree
            .index_of(node)
            .ok_or_else(|| TreeError::NodeNotFound(node.clone()))?;
        let len = self.tree.children(&parent).len();
        if index >= len {
            return Err(TreeError::IndexOutOfRange {
                parent,
                index,
                len,
            }
            .into());
        }

        let mut targets = Vec::new();
        let mut warnings = Vec::new();
        let needed = from.max(index);
        for peer in self.peers_of(&parent) {
            let children = self.tree.children(&peer);
            if children.len() <= needed {
                return Err(EditorError::PeerIndexOutOfRange {
                    peer,
                    index: needed,
                    len: children.len(),
                });
            }
            if children.len() != len {
                let reason = format!("{} children, expected {}", children.len(), len);
                warnings.push(Self::mismatch(&parent, &peer, reason));
                continue;
            }
            let candidate = children[from].clone();
            if !self.corresponds(&candidate, node) {
                let reason = format!("child {} does not mirror {}", candidate, node);
                warnings.push(Self::mismatch(&parent, &peer, reason));
                continue;
            }
            targets.push((peer, candidate));
        }

        Ok(ReorderPlan {
            parent,
            index,
            targets,
            warnings,
        })
    }

    fn commit_reorder(&mut self, plan: ReorderPlan, node: &NodeId) -> Result<(), EditorError> {
        self.warnings.extend(plan.warnings);
        self.scope.enter(&plan.parent);

        self.tree.detach(node)?;
        self.tree.insert(&plan.parent, node, Some(plan.index))?;
        self.affected.push(node.clone());

        for (peer, child) in plan.targets {
            if !self.scope.enter(&peer) {
                continue;
            }
            self.tree.detach(&child)?;
            self.tree.insert(&peer, &child, Some(plan.index))?;
            self.affected.push(child);
        }

        debug!(node = %node, index = plan.index, "Propagated reorder");
        Ok(())
    }
}
