//! # Change Notifications
//!
//! One [`ChangeEvent`] is emitted per top-level mutation, after every peer
//! has been synchronized. Internal propagation steps never emit events, so
//! a renderer re-renders once per user edit.

use composer_model::NodeId;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Added,
    Removed,
    Moved,
    Attributes,
    Classes,
    Style,
    Property,
    Content,
    PropagationStop,
    SymbolCreated,
    SymbolDetached,
    Cloned,
}

/// "Component tree changed" notification
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Document version after the change
    pub version: u64,
    pub kind: ChangeKind,
    /// Node the caller targeted
    pub origin: NodeId,
    /// Every node touched, peers included
    pub affected: Vec<NodeId>,
}

/// Consumer of change notifications (renderer, persistence, ...)
pub trait ChangeListener: std::fmt::Debug {
    fn on_change(&mut self, event: &ChangeEvent);
}

/// Listener that records events; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct ChangeLog {
    events: Rc<RefCell<Vec<ChangeEvent>>>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl ChangeListener for ChangeLog {
    fn on_change(&mut self, event: &ChangeEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
