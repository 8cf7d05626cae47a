//! # Composer Editor
//!
//! Symbol synchronization engine for the component composer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ model: Tree arena of Nodes                  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: Document + mutations                │
//! │  - Relation index (template ↔ instances)    │
//! │  - Propagation engine (fan-out per edit)    │
//! │  - Nesting resolver (links for clones)      │
//! │  - Reference codec (__symbol/__symbols)     │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ listeners: one ChangeEvent per mutation     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Relations are keys**: templates and instances refer to each other by
//!    node id, never by ownership
//! 2. **All or nothing**: every peer is validated before any peer changes
//! 3. **One event per edit**: fan-out never notifies on its own
//!
//! ## Usage
//!
//! ```rust,ignore
//! use composer_editor::Document;
//! use composer_model::NodeDef;
//!
//! let mut doc = Document::default();
//! let card = doc.create(&NodeDef::new("div").with_child(NodeDef::text("h1", "Title")));
//! let copy = doc.create_symbol(&card)?.created.unwrap();
//!
//! // Style lands on both the main symbol and its instance
//! doc.set_style(&copy, [("color", "red")])?;
//! ```

mod codec;
mod config;
mod document;
mod errors;
mod events;
mod mutations;
mod nesting;
mod propagation;
mod relation;

pub use codec::{export, import, ImportReport, NodeRecord, ProjectData};
pub use config::{EditorConfig, DEFAULT_CONFIG_NAME, ID_KEY};
pub use document::Document;
pub use errors::{EditorError, RelationError, SyncWarning};
pub use events::{ChangeEvent, ChangeKind, ChangeListener, ChangeLog};
pub use mutations::{Mutation, MutationResult};
pub use propagation::{PropertyEdit, SyncScope, CLASS_KEY, CONTENT_KEY, STYLE_KEY};
pub use relation::{RelationIndex, SymbolLink};

// Re-export model types for convenience
pub use composer_model::{NodeDef, NodeId, PropagationStop, Tree};
