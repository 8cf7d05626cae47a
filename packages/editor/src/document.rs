//! # Document Handle
//!
//! A [`Document`] is one editable component forest together with its symbol
//! relations. Every public method is one top-level mutation: it runs the
//! full fan-out, bumps [`Document::version`] and emits exactly one
//! [`ChangeEvent`] on success. Failed mutations leave the document untouched
//! and emit nothing.
//!
//! ## Lifecycle
//!
//! ```text
//! Load → Import → Edit → Export → Save
//!   ↓       ↓        ↓       ↓       ↓
//! JSON   Tree +   Mutations  JSON   File
//!        Relations
//! ```

use crate::codec::{self, ImportReport, ProjectData};
use crate::config::EditorConfig;
use crate::errors::{EditorError, SyncWarning};
use crate::events::{ChangeEvent, ChangeKind, ChangeListener};
use crate::mutations::{Mutation, MutationResult};
use crate::nesting;
use crate::propagation::{PropertyEdit, Synchronizer};
use crate::relation::RelationIndex;
use composer_model::{NodeDef, NodeId, PropagationStop, Tree, TreeError};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info};

/// Editable component forest
#[derive(Debug)]
pub struct Document {
    /// Current version number (increments on each successful mutation)
    pub version: u64,

    tree: Tree,
    relations: RelationIndex,
    config: EditorConfig,
    listeners: Vec<Box<dyn ChangeListener>>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

fn string_map(
    entries: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
) -> BTreeMap<String, String> {
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

impl Document {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            version: 0,
            tree: Tree::new(&config.id_seed),
            relations: RelationIndex::new(),
            config,
            listeners: Vec::new(),
        }
    }

    /// Build a document from persisted data
    pub fn from_project(data: &ProjectData, config: EditorConfig) -> (Self, ImportReport) {
        let mut doc = Self::new(config);
        let report = doc.import(data);
        (doc, report)
    }

    pub fn from_json(source: &str, config: EditorConfig) -> Result<(Self, ImportReport), EditorError> {
        let data: ProjectData = serde_json::from_str(source)?;
        Ok(Self::from_project(&data, config))
    }

    /// Load a project file
    pub fn load(path: &Path, config: EditorConfig) -> Result<(Self, ImportReport), EditorError> {
        let source = std::fs::read_to_string(path)?;
        info!(path = %path.display(), "Loading project");
        Self::from_json(&source, config)
    }

    /// Add the components of `data` as new roots
    pub fn import(&mut self, data: &ProjectData) -> ImportReport {
        codec::import(data, &mut self.tree, &mut self.relations)
    }

    pub fn export(&self) -> ProjectData {
        let data = codec::export(&self.tree, &self.relations);
        info!(
            components = data.components.len(),
            nodes = self.tree.len(),
            relations = self.relations.pairs().len(),
            "Exported project"
        );
        data
    }

    pub fn to_json(&self) -> Result<String, EditorError> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }

    pub fn save(&self, path: &Path) -> Result<(), EditorError> {
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), "Saved project");
        Ok(())
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Direct arena access. Changes made here bypass synchronization.
    pub fn tree_mut(&mut self) -> &mut Tree {
        &mut self.tree
    }

    pub fn relations(&self) -> &RelationIndex {
        &self.relations
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn add_listener(&mut self, listener: impl ChangeListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    // -- bookkeeping ------------------------------------------------------

    fn synchronize<F>(
        &mut self,
        kind: ChangeKind,
        origin: &NodeId,
        apply: F,
    ) -> Result<MutationResult, EditorError>
    where
        F: FnOnce(&mut Synchronizer<'_>) -> Result<(), EditorError>,
    {
        let mut sync = Synchronizer::new(&mut self.tree, &mut self.relations, &self.config);
        apply(&mut sync)?;
        let (affected, warnings) = sync.finish();
        Ok(self.notify(kind, origin, affected, warnings))
    }

    fn notify(
        &mut self,
        kind: ChangeKind,
        origin: &NodeId,
        affected: Vec<NodeId>,
        warnings: Vec<SyncWarning>,
    ) -> MutationResult {
        self.version += 1;

        let mut seen = HashSet::new();
        let affected: Vec<NodeId> = affected
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let event = ChangeEvent {
            version: self.version,
            kind,
            origin: origin.clone(),
            affected: affected.clone(),
        };
        for listener in &mut self.listeners {
            listener.on_change(&event);
        }

        MutationResult {
            version: self.version,
            created: None,
            affected,
            warnings,
        }
    }

    // -- structure --------------------------------------------------------

    /// Create a detached subtree; it becomes a new root
    pub fn create(&mut self, def: &NodeDef) -> NodeId {
        let id = self.tree.create(def);
        let affected = self.tree.descendants(&id);
        self.notify(ChangeKind::Created, &id, affected, Vec::new());
        id
    }

    /// Insert `node` under `parent` and mirror it into every peer of
    /// `parent`. An attached node is moved instead; without `index` it ends
    /// up last.
    pub fn append(
        &mut self,
        node: &NodeId,
        parent: &NodeId,
        index: Option<usize>,
    ) -> Result<MutationResult, EditorError> {
        self.tree.node(parent)?;
        if let Some(current) = self.tree.node(node)?.parent().cloned() {
            let len = self.tree.children(parent).len();
            let index = index.unwrap_or(if current == *parent {
                len.saturating_sub(1)
            } else {
                len
            });
            return self.move_node(node, parent, index);
        }
        self.synchronize(ChangeKind::Added, node, |sync| {
            sync.insert(parent, node, index)
        })
    }

    /// Create a subtree from `def` and append it
    pub fn append_def(
        &mut self,
        def: &NodeDef,
        parent: &NodeId,
        index: Option<usize>,
    ) -> Result<MutationResult, EditorError> {
        self.tree.node(parent)?;
        let id = self.tree.create(def);
        match self.synchronize(ChangeKind::Added, &id, |sync| sync.insert(parent, &id, index)) {
            Ok(mut result) => {
                result.created = Some(id);
                Ok(result)
            }
            Err(error) => {
                self.tree.delete_subtree(&id)?;
                Err(error)
            }
        }
    }

    /// Delete `node` and its counterpart in every peer of its parent
    pub fn remove(&mut self, node: &NodeId) -> Result<MutationResult, EditorError> {
        self.synchronize(ChangeKind::Removed, node, |sync| sync.remove(node))
    }

    /// Move `node` so it ends up at `index` under `new_parent`
    pub fn move_node(
        &mut self,
        node: &NodeId,
        new_parent: &NodeId,
        index: usize,
    ) -> Result<MutationResult, EditorError> {
        self.synchronize(ChangeKind::Moved, node, |sync| {
            sync.move_to(node, new_parent, index)
        })
    }

    // -- properties -------------------------------------------------------

    fn edit(&mut self, node: &NodeId, edit: PropertyEdit) -> Result<MutationResult, EditorError> {
        self.synchronize(edit.kind(), node, |sync| sync.edit(node, &edit))
    }

    pub fn set_attributes(
        &mut self,
        node: &NodeId,
        attributes: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Result<MutationResult, EditorError> {
        self.edit(node, PropertyEdit::Attributes(string_map(attributes)))
    }

    pub fn add_class(
        &mut self,
        node: &NodeId,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<MutationResult, EditorError> {
        let names = names.into_iter().map(Into::into).collect();
        self.edit(node, PropertyEdit::AddClasses(names))
    }

    pub fn remove_class(
        &mut self,
        node: &NodeId,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<MutationResult, EditorError> {
        let names = names.into_iter().map(Into::into).collect();
        self.edit(node, PropertyEdit::RemoveClasses(names))
    }

    /// Set inline style properties; an empty value removes the property
    pub fn set_style(
        &mut self,
        node: &NodeId,
        style: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Result<MutationResult, EditorError> {
        self.edit(node, PropertyEdit::Style(string_map(style)))
    }

    /// Set an open property; `Value::Null` removes it
    pub fn set_property(
        &mut self,
        node: &NodeId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<MutationResult, EditorError> {
        let key = key.into();
        self.edit(node, PropertyEdit::Property { key, value })
    }

    pub fn set_content(
        &mut self,
        node: &NodeId,
        content: Option<String>,
    ) -> Result<MutationResult, EditorError> {
        self.edit(node, PropertyEdit::Content(content))
    }

    /// Mark (or unmark) a subtree as a propagation boundary. The marker
    /// itself is local to the node.
    pub fn set_propagation_stop(
        &mut self,
        node: &NodeId,
        stop: Option<PropagationStop>,
    ) -> Result<MutationResult, EditorError> {
        self.tree.node_mut(node)?.propagation = stop;
        Ok(self.notify(
            ChangeKind::PropagationStop,
            node,
            vec![node.clone()],
            Vec::new(),
        ))
    }

    // -- symbols ----------------------------------------------------------

    /// Create a detached instance of `node`
    pub fn create_symbol(&mut self, node: &NodeId) -> Result<MutationResult, EditorError> {
        self.create_symbol_in(node, None, None)
    }

    /// Create an instance of `node` and, when `parent` is given, insert it
    /// there as part of the same mutation
    pub fn create_symbol_in(
        &mut self,
        node: &NodeId,
        parent: Option<&NodeId>,
        index: Option<usize>,
    ) -> Result<MutationResult, EditorError> {
        if let Some(parent) = parent {
            self.tree.node(parent)?;
        }

        let pairs = self.tree.deep_clone(node)?;
        let symbol = pairs
            .first()
            .map(|(_, clone)| clone.clone())
            .ok_or_else(|| TreeError::NodeNotFound(node.clone()))?;
        if let Err(error) = nesting::link_symbol_clone(&self.tree, &mut self.relations, &pairs) {
            self.discard_symbol(&symbol)?;
            return Err(error.into());
        }
        debug!(source = %node, symbol = %symbol, nodes = pairs.len(), "Created symbol");

        let result = match parent {
            None => {
                let clones = pairs.into_iter().map(|(_, clone)| clone).collect();
                Ok(self.notify(ChangeKind::SymbolCreated, node, clones, Vec::new()))
            }
            Some(parent) => self.synchronize(ChangeKind::SymbolCreated, node, |sync| {
                sync.insert(parent, &symbol, index)
            }),
        };

        match result {
            Ok(mut result) => {
                result.created = Some(symbol);
                Ok(result)
            }
            Err(error) => {
                self.discard_symbol(&symbol)?;
                Err(error)
            }
        }
    }

    fn discard_symbol(&mut self, symbol: &NodeId) -> Result<(), EditorError> {
        self.relations
            .unlink_subtrees(&self.tree, &[symbol.clone()], false);
        self.tree.delete_subtree(symbol)?;
        Ok(())
    }

    /// Plain deep copy of `node` as a new root; never linked to anything
    pub fn clone_node(&mut self, node: &NodeId) -> Result<MutationResult, EditorError> {
        let pairs = self.tree.deep_clone(node)?;
        let clones: Vec<NodeId> = pairs.into_iter().map(|(_, clone)| clone).collect();
        let created = clones.first().cloned();
        let mut result = self.notify(ChangeKind::Cloned, node, clones, Vec::new());
        result.created = created;
        Ok(result)
    }

    /// Break an instance out of its relation. Descendants linked into the
    /// same relation are released too; unrelated nested symbols keep their
    /// links.
    pub fn detach_symbol(&mut self, node: &NodeId) -> Result<MutationResult, EditorError> {
        self.tree.node(node)?;
        if !self.relations.is_instance(node) {
            return Err(EditorError::NotAnInstance(node.clone()));
        }

        let peers: Vec<NodeId> = self
            .relations
            .relation_set(node)
            .into_iter()
            .filter(|peer| peer != node)
            .collect();

        let mut affected = Vec::new();
        for id in self.tree.descendants(node) {
            let Some(template) = self.relations.template_of(&id).cloned() else {
                continue;
            };
            let inside_peer = peers
                .iter()
                .any(|peer| self.tree.is_ancestor_or_self(peer, &template));
            if id == *node || inside_peer {
                self.relations.unlink(&id);
                affected.push(id);
            }
        }

        debug!(node = %node, released = affected.len(), "Detached symbol");
        Ok(self.notify(ChangeKind::SymbolDetached, node, affected, Vec::new()))
    }

    /// Whether `node` takes part in a relation (main symbol or instance)
    pub fn is_symbol(&self, node: &NodeId) -> bool {
        self.relations.is_linked(node)
    }

    pub fn is_main_symbol(&self, node: &NodeId) -> bool {
        self.relations.is_template(node)
    }

    pub fn is_instance(&self, node: &NodeId) -> bool {
        self.relations.is_instance(node)
    }

    pub fn get_symbol_instances(&self, node: &NodeId) -> &[NodeId] {
        self.relations.instances_of(node)
    }

    pub fn get_symbol_template(&self, node: &NodeId) -> Option<&NodeId> {
        self.relations.template_of(node)
    }

    /// Report relation members whose subtree no longer matches their main
    /// symbol, plus any one-sided links
    pub fn verify(&self) -> Vec<SyncWarning> {
        let mut warnings = Vec::new();

        for top in self.relations.top_templates() {
            for member in self.relations.relation_set(&top) {
                if member != top && !self.tree.same_shape(&top, &member) {
                    warnings.push(SyncWarning::StructuralMismatch {
                        origin: top.clone(),
                        peer: member,
                        reason: "subtree shape differs from main symbol".to_string(),
                    });
                }
            }
        }

        for (node, problem) in self.relations.check_consistency() {
            warnings.push(SyncWarning::StructuralMismatch {
                origin: node.clone(),
                peer: node,
                reason: problem,
            });
        }

        warnings
    }

    // -- scripts ----------------------------------------------------------

    /// Apply a serialized mutation
    pub fn apply(&mut self, mutation: Mutation) -> Result<MutationResult, EditorError> {
        debug!(mutation = mutation.name(), node = %mutation.node_id(), "Applying mutation");

        match mutation {
            Mutation::InsertNode {
                parent_id,
                index,
                node,
            } => self.append_def(&node, &parent_id, index),
            Mutation::AppendNode {
                node_id,
                parent_id,
                index,
            } => self.append(&node_id, &parent_id, index),
            Mutation::RemoveNode { node_id } => self.remove(&node_id),
            Mutation::MoveNode {
                node_id,
                new_parent_id,
                index,
            } => self.move_node(&node_id, &new_parent_id, index),
            Mutation::SetAttributes {
                node_id,
                attributes,
            } => self.set_attributes(&node_id, attributes),
            Mutation::AddClass { node_id, names } => self.add_class(&node_id, names),
            Mutation::RemoveClass { node_id, names } => self.remove_class(&node_id, names),
            Mutation::SetStyle { node_id, style } => self.set_style(&node_id, style),
            Mutation::SetProperty {
                node_id,
                key,
                value,
            } => self.set_property(&node_id, key, value),
            Mutation::SetContent { node_id, content } => self.set_content(&node_id, content),
            Mutation::SetPropagationStop { node_id, stop } => {
                self.set_propagation_stop(&node_id, stop)
            }
            Mutation::CreateSymbol {
                node_id,
                parent_id,
                index,
            } => self.create_symbol_in(&node_id, parent_id.as_ref(), index),
            Mutation::CloneNode { node_id } => self.clone_node(&node_id),
            Mutation::DetachSymbol { node_id } => self.detach_symbol(&node_id),
        }
    }
}
