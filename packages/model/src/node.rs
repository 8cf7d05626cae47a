//! # Component Nodes
//!
//! A [`Node`] is one entity of the component tree: a tag, its attributes,
//! classes, inline style, optional text content and an open bag of
//! component-specific properties (`removable`, `draggable`, ...).
//!
//! Tree position (`parent`, `children`) is owned by [`crate::Tree`] and can
//! only be changed through it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

/// Stable node identifier (arena key)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Marker that lets a subtree break out of symbol synchronization.
///
/// Edits to keys not listed in `propagate` stay local to the marked node
/// and its descendants. Listed keys keep flowing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationStop {
    #[serde(default)]
    pub propagate: Vec<String>,
}

impl PropagationStop {
    pub fn new(propagate: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            propagate: propagate.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether an edit to `key` still flows through this marker
    pub fn allows(&self, key: &str) -> bool {
        self.propagate.iter().any(|k| k == key)
    }
}

/// Component tree node
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    pub tag_name: String,
    pub attributes: BTreeMap<String, String>,
    pub classes: Vec<String>,
    pub style: BTreeMap<String, String>,
    pub content: Option<String>,
    pub properties: BTreeMap<String, Value>,
    pub propagation: Option<PropagationStop>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    /// Build a detached node from a definition, ignoring its children
    pub(crate) fn from_def(id: NodeId, def: &NodeDef) -> Self {
        Self {
            id,
            tag_name: def.tag_name.clone(),
            attributes: def.attributes.clone(),
            classes: def.classes.clone(),
            style: def.style.clone(),
            content: def.content.clone(),
            properties: def.properties.clone(),
            propagation: def.propagation_stop.clone(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Copy every local field under a new id; tree position is not copied
    pub(crate) fn duplicate(&self, id: NodeId) -> Self {
        Self {
            id,
            tag_name: self.tag_name.clone(),
            attributes: self.attributes.clone(),
            classes: self.classes.clone(),
            style: self.style.clone(),
            content: self.content.clone(),
            properties: self.properties.clone(),
            propagation: self.propagation.clone(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn parent(&self) -> Option<&NodeId> {
        self.parent.as_ref()
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn has_class(&self, name: &str) -> bool {
        self.classes.iter().any(|c| c == name)
    }

    /// Local definition of this node without children
    pub fn to_def(&self) -> NodeDef {
        NodeDef {
            id: Some(self.id.to_string()),
            tag_name: self.tag_name.clone(),
            attributes: self.attributes.clone(),
            classes: self.classes.clone(),
            style: self.style.clone(),
            content: self.content.clone(),
            propagation_stop: self.propagation.clone(),
            components: Vec::new(),
            properties: self.properties.clone(),
        }
    }
}

fn default_tag_name() -> String {
    "div".to_string()
}

/// Serializable node definition, used to create new subtrees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default = "default_tag_name")]
    pub tag_name: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub style: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub propagation_stop: Option<PropagationStop>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<NodeDef>,

    /// Component-specific fields (`removable`, `draggable`, ...)
    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
}

impl Default for NodeDef {
    fn default() -> Self {
        Self::new(default_tag_name())
    }
}

impl NodeDef {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            id: None,
            tag_name: tag_name.into(),
            attributes: BTreeMap::new(),
            classes: Vec::new(),
            style: BTreeMap::new(),
            content: None,
            propagation_stop: None,
            components: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Text-bearing node, e.g. `<div>Component 1</div>`
    pub fn text(tag_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(tag_name).with_content(content)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_class(mut self, name: impl Into<String>) -> Self {
        self.classes.push(name.into());
        self
    }

    pub fn with_style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
        self.style.insert(property.into(), value.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_child(mut self, child: NodeDef) -> Self {
        self.components.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = NodeDef>) -> Self {
        self.components.extend(children);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_def_deserializes_open_properties() {
        let def: NodeDef = serde_json::from_value(json!({
            "tagName": "section",
            "attributes": { "title": "hero" },
            "removable": false,
            "components": [{ "content": "Hello" }]
        }))
        .unwrap();

        assert_eq!(def.tag_name, "section");
        assert_eq!(def.attributes.get("title").map(String::as_str), Some("hero"));
        assert_eq!(def.properties.get("removable"), Some(&json!(false)));
        assert_eq!(def.components.len(), 1);
        assert_eq!(def.components[0].tag_name, "div");
        assert_eq!(def.components[0].content.as_deref(), Some("Hello"));
    }

    #[test]
    fn test_propagation_stop_allows_listed_keys_only() {
        let stop = PropagationStop::new(["style", "class"]);
        assert!(stop.allows("style"));
        assert!(stop.allows("class"));
        assert!(!stop.allows("title"));
    }
}
