use crate::node::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Moving {node} under {parent} would create a cycle")]
    CycleDetected { node: NodeId, parent: NodeId },

    #[error("Node {0} is still attached to a parent")]
    NotDetached(NodeId),

    #[error("Index {index} out of range for {parent} ({len} children)")]
    IndexOutOfRange {
        parent: NodeId,
        index: usize,
        len: usize,
    },
}

pub type TreeResult<T> = Result<T, TreeError>;
