//! # Composer Model
//!
//! Component tree for the page composer: nodes, node definitions and the
//! arena that owns them.
//!
//! The model knows nothing about symbols. Synchronization between a
//! template and its instances lives in `composer-editor`, which drives the
//! tree through the structural operations exposed here.

pub mod error;
pub mod id_generator;
pub mod node;
pub mod tree;
pub mod visitor;

pub use error::{TreeError, TreeResult};
pub use id_generator::IdGenerator;
pub use node::{Node, NodeDef, NodeId, PropagationStop};
pub use tree::Tree;
pub use visitor::{walk_node, walk_tree, Visitor};
