//! # Mutations
//!
//! Serializable form of every public editing operation. A list of mutations
//! is a replayable edit script:
//!
//! ```json
//! [
//!   { "CreateSymbol": { "node_id": "card" } },
//!   { "SetStyle": { "node_id": "card", "style": { "color": "red" } } }
//! ]
//! ```
//!
//! Mutations are applied through [`Document::apply`](crate::Document::apply),
//! which runs the same propagation as the direct method calls.

use crate::errors::SyncWarning;
use composer_model::{NodeDef, NodeId, PropagationStop};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One top-level editing operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Mutation {
    /// Create a subtree from a definition and insert it
    InsertNode {
        parent_id: NodeId,
        #[serde(default)]
        index: Option<usize>,
        node: NodeDef,
    },

    /// Insert an existing node; attached nodes are moved
    AppendNode {
        node_id: NodeId,
        parent_id: NodeId,
        #[serde(default)]
        index: Option<usize>,
    },

    /// Delete a node and its subtree
    RemoveNode { node_id: NodeId },

    /// Move a node to its final position under a new parent
    MoveNode {
        node_id: NodeId,
        new_parent_id: NodeId,
        index: usize,
    },

    SetAttributes {
        node_id: NodeId,
        attributes: BTreeMap<String, String>,
    },

    AddClass { node_id: NodeId, names: Vec<String> },

    RemoveClass { node_id: NodeId, names: Vec<String> },

    /// An empty value removes the style property
    SetStyle {
        node_id: NodeId,
        style: BTreeMap<String, String>,
    },

    /// `null` removes the property
    SetProperty {
        node_id: NodeId,
        key: String,
        value: Value,
    },

    SetContent {
        node_id: NodeId,
        #[serde(default)]
        content: Option<String>,
    },

    SetPropagationStop {
        node_id: NodeId,
        #[serde(default)]
        stop: Option<PropagationStop>,
    },

    /// Create a linked instance, optionally placing it right away
    CreateSymbol {
        node_id: NodeId,
        #[serde(default)]
        parent_id: Option<NodeId>,
        #[serde(default)]
        index: Option<usize>,
    },

    /// Plain deep copy, never linked
    CloneNode { node_id: NodeId },

    /// Break an instance out of its relation
    DetachSymbol { node_id: NodeId },
}

impl Mutation {
    pub fn name(&self) -> &'static str {
        match self {
            Mutation::InsertNode { .. } => "InsertNode",
            Mutation::AppendNode { .. } => "AppendNode",
            Mutation::RemoveNode { .. } => "RemoveNode",
            Mutation::MoveNode { .. } => "MoveNode",
            Mutation::SetAttributes { .. } => "SetAttributes",
            Mutation::AddClass { .. } => "AddClass",
            Mutation::RemoveClass { .. } => "RemoveClass",
            Mutation::SetStyle { .. } => "SetStyle",
            Mutation::SetProperty { .. } => "SetProperty",
            Mutation::SetContent { .. } => "SetContent",
            Mutation::SetPropagationStop { .. } => "SetPropagationStop",
            Mutation::CreateSymbol { .. } => "CreateSymbol",
            Mutation::CloneNode { .. } => "CloneNode",
            Mutation::DetachSymbol { .. } => "DetachSymbol",
        }
    }

    /// Node the mutation targets (the parent for `InsertNode`)
    pub fn node_id(&self) -> &NodeId {
        match self {
            Mutation::InsertNode { parent_id, .. } => parent_id,
            Mutation::AppendNode { node_id, .. }
            | Mutation::RemoveNode { node_id }
            | Mutation::MoveNode { node_id, .. }
            | Mutation::SetAttributes { node_id, .. }
            | Mutation::AddClass { node_id, .. }
            | Mutation::RemoveClass { node_id, .. }
            | Mutation::SetStyle { node_id, .. }
            | Mutation::SetProperty { node_id, .. }
            | Mutation::SetContent { node_id, .. }
            | Mutation::SetPropagationStop { node_id, .. }
            | Mutation::CreateSymbol { node_id, .. }
            | Mutation::CloneNode { node_id }
            | Mutation::DetachSymbol { node_id } => node_id,
        }
    }
}

/// Result of one applied mutation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationResult {
    /// Document version after the mutation
    pub version: u64,

    /// Node produced by the mutation (inserted node, symbol, clone)
    pub created: Option<NodeId>,

    /// Every node touched, peers included
    pub affected: Vec<NodeId>,

    /// Recoverable problems met during propagation
    pub warnings: Vec<SyncWarning>,
}

impl MutationResult {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_script() {
        let script: Vec<Mutation> = serde_json::from_value(json!([
            { "InsertNode": { "parent_id": "root", "node": { "content": "Hi" } } },
            { "SetStyle": { "node_id": "card", "style": { "color": "red" } } },
            { "CreateSymbol": { "node_id": "card" } }
        ]))
        .unwrap();

        assert_eq!(script.len(), 3);
        assert_eq!(script[0].name(), "InsertNode");
        assert_eq!(script[0].node_id(), &NodeId::from("root"));
        assert!(matches!(
            &script[2],
            Mutation::CreateSymbol { parent_id: None, index: None, .. }
        ));
    }
}
