//! Error types for the editor

use composer_model::{NodeId, TreeError};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Invalid relation: {0}")]
    InvalidRelation(#[from] RelationError),

    #[error("Peer {peer} cannot mirror index {index} ({len} children)")]
    PeerIndexOutOfRange {
        peer: NodeId,
        index: usize,
        len: usize,
    },

    #[error("Node {0} is not a symbol instance")]
    NotAnInstance(NodeId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reasons a template/instance link is refused
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RelationError {
    #[error("{0} cannot be its own template")]
    SelfLink(NodeId),

    #[error("{node} is already an instance of {template}")]
    AlreadyInstance { node: NodeId, template: NodeId },

    #[error("{node} and {template} are in an ancestor/descendant relationship")]
    AncestorLink { node: NodeId, template: NodeId },

    #[error("linking {node} to {template} would create a template cycle")]
    TemplateCycle { node: NodeId, template: NodeId },

    #[error("inserting {node} under {parent} would nest a symbol inside its own relation")]
    NestedInOwnRelation { node: NodeId, parent: NodeId },

    #[error("Node not found: {0}")]
    Missing(NodeId),
}

/// Recoverable synchronization problems.
///
/// The mutation that produced them still succeeded locally.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncWarning {
    /// A link was refused; propagation for it was skipped
    InvalidRelation { node: NodeId, error: RelationError },

    /// A peer drifted out of congruence and was skipped
    StructuralMismatch {
        origin: NodeId,
        peer: NodeId,
        reason: String,
    },

    /// An imported `__symbol`/`__symbols` id did not resolve
    DanglingReference { node: NodeId, reference: String },

    /// An imported id was already taken and got replaced
    DuplicateId { id: String, replacement: NodeId },
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWarning::InvalidRelation { node, error } => {
                write!(f, "invalid relation on {}: {}", node, error)
            }
            SyncWarning::StructuralMismatch {
                origin,
                peer,
                reason,
            } => write!(f, "peer {} of {} skipped: {}", peer, origin, reason),
            SyncWarning::DanglingReference { node, reference } => {
                write!(f, "{} references missing node {}", node, reference)
            }
            SyncWarning::DuplicateId { id, replacement } => {
                write!(f, "duplicate id {} replaced by {}", id, replacement)
            }
        }
    }
}
