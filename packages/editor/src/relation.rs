//! # Symbol Relation Index
//!
//! Tracks which nodes are templates ("main symbols") and which are
//! instances. A node's state is one of:
//!
//! ```text
//! (no entry)  plain node
//! Template    has instances
//! Instance    linked to exactly one template
//! Both        instance of one template and template of further instances
//! ```
//!
//! Both sides of a link are always written together, so `symbolOf` and
//! `symbolInstances` cannot disagree. Only the editor crate writes links.

use crate::errors::{RelationError, SyncWarning};
use composer_model::{NodeId, Tree};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolLink {
    Template { instances: Vec<NodeId> },
    Instance { template: NodeId },
    Both {
        template: NodeId,
        instances: Vec<NodeId>,
    },
}

impl SymbolLink {
    pub fn template(&self) -> Option<&NodeId> {
        match self {
            SymbolLink::Instance { template } | SymbolLink::Both { template, .. } => Some(template),
            SymbolLink::Template { .. } => None,
        }
    }

    pub fn instances(&self) -> &[NodeId] {
        match self {
            SymbolLink::Template { instances } | SymbolLink::Both { instances, .. } => instances,
            SymbolLink::Instance { .. } => &[],
        }
    }
}

/// Links between templates and instances, keyed by node id
#[derive(Debug, Clone, Default)]
pub struct RelationIndex {
    links: HashMap<NodeId, SymbolLink>,
}

impl RelationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link_of(&self, id: &NodeId) -> Option<&SymbolLink> {
        self.links.get(id)
    }

    pub fn template_of(&self, id: &NodeId) -> Option<&NodeId> {
        self.links.get(id).and_then(SymbolLink::template)
    }

    pub fn instances_of(&self, id: &NodeId) -> &[NodeId] {
        self.links.get(id).map(SymbolLink::instances).unwrap_or(&[])
    }

    pub fn is_template(&self, id: &NodeId) -> bool {
        !self.instances_of(id).is_empty()
    }

    pub fn is_instance(&self, id: &NodeId) -> bool {
        self.template_of(id).is_some()
    }

    pub fn is_linked(&self, id: &NodeId) -> bool {
        self.links.contains_key(id)
    }

    /// Number of nodes taking part in any relation
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Every `(instance, template)` pair, sorted by instance id
    pub fn pairs(&self) -> Vec<(NodeId, NodeId)> {
        let mut pairs: Vec<_> = self
            .links
            .iter()
            .filter_map(|(id, link)| link.template().map(|t| (id.clone(), t.clone())))
            .collect();
        pairs.sort();
        pairs
    }

    /// Templates that are not instances themselves
    pub fn top_templates(&self) -> Vec<NodeId> {
        let mut tops: Vec<_> = self
            .links
            .iter()
            .filter(|(_, link)| matches!(link, SymbolLink::Template { .. }))
            .map(|(id, _)| id.clone())
            .collect();
        tops.sort();
        tops
    }

    /// Follow `symbolOf` up to the main symbol of the relation
    pub fn top_template(&self, id: &NodeId) -> NodeId {
        let mut current = id.clone();
        let mut seen = HashSet::new();
        while let Some(template) = self.template_of(&current) {
            if !seen.insert(current.clone()) {
                break;
            }
            current = template.clone();
        }
        current
    }

    /// All members of the relation `id` belongs to.
    ///
    /// Instances come first, breadth-first in insertion order; the main
    /// symbol comes last. Plain nodes have an empty relation set.
    pub fn relation_set(&self, id: &NodeId) -> Vec<NodeId> {
        if !self.is_linked(id) {
            return Vec::new();
        }

        let top = self.top_template(id);
        let mut members = Vec::new();
        let mut seen = HashSet::from([top.clone()]);
        let mut queue = VecDeque::from([top.clone()]);

        while let Some(current) = queue.pop_front() {
            for instance in self.instances_of(&current) {
                if seen.insert(instance.clone()) {
                    members.push(instance.clone());
                    queue.push_back(instance.clone());
                }
            }
        }

        members.push(top);
        members
    }

    /// Whether two nodes belong to the same relation
    pub fn same_relation(&self, a: &NodeId, b: &NodeId) -> bool {
        self.is_linked(a) && self.is_linked(b) && self.top_template(a) == self.top_template(b)
    }

    /// Check that a link could be established without breaking invariants
    pub fn validate_link(
        &self,
        tree: &Tree,
        instance: &NodeId,
        template: &NodeId,
    ) -> Result<(), RelationError> {
        if instance == template {
            return Err(RelationError::SelfLink(instance.clone()));
        }
        for id in [instance, template] {
            if !tree.contains(id) {
                return Err(RelationError::Missing(id.clone()));
            }
        }
        if let Some(existing) = self.template_of(instance) {
            if existing != template {
                return Err(RelationError::AlreadyInstance {
                    node: instance.clone(),
                    template: existing.clone(),
                });
            }
        }
        if tree.is_ancestor_or_self(instance, template) || tree.is_ancestor_or_self(template, instance)
        {
            return Err(RelationError::AncestorLink {
                node: instance.clone(),
                template: template.clone(),
            });
        }

        let mut current = Some(template);
        let mut seen = HashSet::new();
        while let Some(id) = current {
            if id == instance || !seen.insert(id) {
                return Err(RelationError::TemplateCycle {
                    node: instance.clone(),
                    template: template.clone(),
                });
            }
            current = self.template_of(id);
        }

        Ok(())
    }

    /// Link `instance` to `template` (`symbolOf` + `symbolInstances`)
    pub(crate) fn link(
        &mut self,
        tree: &Tree,
        instance: &NodeId,
        template: &NodeId,
    ) -> Result<(), RelationError> {
        self.validate_link(tree, instance, template)?;
        if self.template_of(instance) == Some(template) {
            return Ok(());
        }

        self.set_template(instance, template.clone());
        self.push_instance(template, instance.clone());
        debug!(instance = %instance, template = %template, "Linked symbol instance");
        Ok(())
    }

    /// Remove the `symbolOf` side of `instance` (and its entry in the
    /// template's instance list). Returns the former template.
    pub(crate) fn unlink(&mut self, instance: &NodeId) -> Option<NodeId> {
        let template = self.clear_template(instance)?;
        self.remove_instance(&template, instance);
        debug!(instance = %instance, template = %template, "Unlinked symbol instance");
        Some(template)
    }

    /// Cut every link of `id`: its own `symbolOf` side and the `symbolOf`
    /// side of each of its instances. Former instances keep their own
    /// instances.
    pub(crate) fn isolate(&mut self, id: &NodeId) {
        self.unlink(id);
        for instance in self.take_instances(id) {
            self.clear_template(&instance);
            debug!(node = %id, instance = %instance, "Cut symbol instance");
        }
    }

    fn set_template(&mut self, id: &NodeId, template: NodeId) {
        let next = match self.links.remove(id) {
            None | Some(SymbolLink::Instance { .. }) => SymbolLink::Instance { template },
            Some(SymbolLink::Template { instances }) | Some(SymbolLink::Both { instances, .. }) => {
                SymbolLink::Both {
                    template,
                    instances,
                }
            }
        };
        self.links.insert(id.clone(), next);
    }

    fn clear_template(&mut self, id: &NodeId) -> Option<NodeId> {
        match self.links.remove(id)? {
            SymbolLink::Instance { template } => Some(template),
            SymbolLink::Both {
                template,
                instances,
            } => {
                self.links
                    .insert(id.clone(), SymbolLink::Template { instances });
                Some(template)
            }
            link @ SymbolLink::Template { .. } => {
                self.links.insert(id.clone(), link);
                None
            }
        }
    }

    fn push_instance(&mut self, id: &NodeId, instance: NodeId) {
        let next = match self.links.remove(id) {
            None => SymbolLink::Template {
                instances: vec![instance],
            },
            Some(SymbolLink::Instance { template }) => SymbolLink::Both {
                template,
                instances: vec![instance],
            },
            Some(SymbolLink::Template { mut instances }) => {
                instances.push(instance);
                SymbolLink::Template { instances }
            }
            Some(SymbolLink::Both {
                template,
                mut instances,
            }) => {
                instances.push(instance);
                SymbolLink::Both {
                    template,
                    instances,
                }
            }
        };
        self.links.insert(id.clone(), next);
    }

    fn remove_instance(&mut self, id: &NodeId, instance: &NodeId) {
        let next = match self.links.remove(id) {
            None => None,
            Some(SymbolLink::Template { mut instances }) => {
                instances.retain(|i| i != instance);
                (!instances.is_empty()).then_some(SymbolLink::Template { instances })
            }
            Some(SymbolLink::Both {
                template,
                mut instances,
            }) => {
                instances.retain(|i| i != instance);
                Some(if instances.is_empty() {
                    SymbolLink::Instance { template }
                } else {
                    SymbolLink::Both {
                        template,
                        instances,
                    }
                })
            }
            Some(link @ SymbolLink::Instance { .. }) => Some(link),
        };
        if let Some(next) = next {
            self.links.insert(id.clone(), next);
        }
    }

    /// Take away the instance list of a template, leaving its own
    /// `symbolOf` side untouched
    fn take_instances(&mut self, id: &NodeId) -> Vec<NodeId> {
        match self.links.remove(id) {
            Some(SymbolLink::Template { instances }) => instances,
            Some(SymbolLink::Both {
                template,
                instances,
            }) => {
                self.links
                    .insert(id.clone(), SymbolLink::Instance { template });
                instances
            }
            Some(link @ SymbolLink::Instance { .. }) => {
                self.links.insert(id.clone(), link);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Tear down every link of the subtrees about to be removed.
    ///
    /// Must run while the nodes are still in the tree. Instances that
    /// survive outside the removed set are handed to the removed
    /// template's own template when it had one; otherwise the first
    /// survivor becomes the new main symbol (when `promote` is set) or
    /// all survivors become plain nodes.
    pub(crate) fn unlink_subtrees(
        &mut self,
        tree: &Tree,
        roots: &[NodeId],
        promote: bool,
    ) -> Vec<SyncWarning> {
        let removed: Vec<NodeId> = roots.iter().flat_map(|r| tree.descendants(r)).collect();
        let removed_set: HashSet<&NodeId> = removed.iter().collect();
        let mut warnings = Vec::new();

        let mut inherited = HashMap::new();
        for id in &removed {
            if let Some(template) = self.unlink(id) {
                if !removed_set.contains(&template) {
                    inherited.insert(id.clone(), template);
                }
            }
        }

        for id in &removed {
            let survivors = self.take_instances(id);
            if survivors.is_empty() {
                continue;
            }
            for survivor in &survivors {
                self.clear_template(survivor);
            }

            let (new_template, relink) = match inherited.get(id) {
                Some(template) => (template.clone(), survivors.as_slice()),
                None if promote => {
                    debug!(removed = %id, promoted = %survivors[0], "Promoting instance to main symbol");
                    (survivors[0].clone(), &survivors[1..])
                }
                None => continue,
            };

            for survivor in relink {
                if let Err(error) = self.link(tree, survivor, &new_template) {
                    warn!(node = %survivor, %error, "Could not relink surviving instance");
                    warnings.push(SyncWarning::InvalidRelation {
                        node: survivor.clone(),
                        error,
                    });
                }
            }
        }

        warnings
    }

    /// `(node, problem)` for every link whose two sides disagree
    pub fn check_consistency(&self) -> Vec<(NodeId, String)> {
        let mut problems = Vec::new();
        for (id, link) in &self.links {
            if let Some(template) = link.template() {
                if !self.instances_of(template).contains(id) {
                    problems.push((id.clone(), format!("missing from {} instances", template)));
                }
            }
            for instance in link.instances() {
                if self.template_of(instance) != Some(id) {
                    problems.push((id.clone(), format!("lists {} which links elsewhere", instance)));
                }
            }
            if matches!(link, SymbolLink::Template { instances } if instances.is_empty()) {
                problems.push((id.clone(), "template without instances".to_string()));
            }
        }
        problems.sort();
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use composer_model::NodeDef;

    fn forest(ids: &[&str]) -> Tree {
        let mut tree = Tree::new("test");
        for id in ids {
            tree.create(&NodeDef::new("div").with_id(*id));
        }
        tree
    }

    #[test]
    fn test_link_is_bidirectional() {
        let tree = forest(&["t", "a", "b"]);
        let mut index = RelationIndex::new();

        index.link(&tree, &"a".into(), &"t".into()).unwrap();
        index.link(&tree, &"b".into(), &"t".into()).unwrap();

        assert_eq!(index.template_of(&"a".into()), Some(&NodeId::from("t")));
        assert_eq!(index.instances_of(&"t".into()), &[NodeId::from("a"), NodeId::from("b")]);
        assert!(index.is_template(&"t".into()));
        assert!(index.check_consistency().is_empty());
    }

    #[test]
    fn test_relation_set_puts_template_last() {
        let tree = forest(&["t", "a", "b", "c"]);
        let mut index = RelationIndex::new();
        index.link(&tree, &"a".into(), &"t".into()).unwrap();
        index.link(&tree, &"b".into(), &"t".into()).unwrap();
        index.link(&tree, &"c".into(), &"a".into()).unwrap();

        assert!(matches!(index.link_of(&"a".into()), Some(SymbolLink::Both { .. })));
        let set: Vec<_> = index
            .relation_set(&"c".into())
            .iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(set, vec!["a", "b", "c", "t"]);
    }

    #[test]
    fn test_link_rejects_invalid_relations() {
        let mut tree = forest(&["t", "a", "b"]);
        let child = tree.create(&NodeDef::new("span").with_id("child"));
        tree.insert(&"t".into(), &child, None).unwrap();
        let mut index = RelationIndex::new();

        assert_eq!(
            index.link(&tree, &"t".into(), &"t".into()),
            Err(RelationError::SelfLink("t".into()))
        );
        assert!(matches!(
            index.link(&tree, &child, &"t".into()),
            Err(RelationError::AncestorLink { .. })
        ));

        index.link(&tree, &"a".into(), &"t".into()).unwrap();
        assert!(matches!(
            index.link(&tree, &"a".into(), &"b".into()),
            Err(RelationError::AlreadyInstance { .. })
        ));
        assert!(matches!(
            index.link(&tree, &"t".into(), &"a".into()),
            Err(RelationError::TemplateCycle { .. })
        ));
    }

    #[test]
    fn test_unlink_last_instance_reverts_template() {
        let tree = forest(&["t", "a"]);
        let mut index = RelationIndex::new();
        index.link(&tree, &"a".into(), &"t".into()).unwrap();

        assert_eq!(index.unlink(&"a".into()), Some("t".into()));
        assert!(!index.is_linked(&"t".into()));
        assert!(index.is_empty());
    }

    #[test]
    fn test_removing_template_promotes_first_survivor() {
        let tree = forest(&["t", "a", "b", "c"]);
        let mut index = RelationIndex::new();
        for id in ["a", "b", "c"] {
            index.link(&tree, &id.into(), &"t".into()).unwrap();
        }

        let warnings = index.unlink_subtrees(&tree, &["t".into()], true);
        assert!(warnings.is_empty());
        assert!(!index.is_linked(&"t".into()));
        assert_eq!(index.instances_of(&"a".into()), &[NodeId::from("b"), NodeId::from("c")]);
        assert!(index.check_consistency().is_empty());
    }

    #[test]
    fn test_removing_template_without_promotion_detaches_all() {
        let tree = forest(&["t", "a", "b"]);
        let mut index = RelationIndex::new();
        index.link(&tree, &"a".into(), &"t".into()).unwrap();
        index.link(&tree, &"b".into(), &"t".into()).unwrap();

        index.unlink_subtrees(&tree, &["t".into()], false);
        assert!(index.is_empty());
    }

    #[test]
    fn test_isolate_cuts_both_sides() {
        let tree = forest(&["t", "a", "b", "c"]);
        let mut index = RelationIndex::new();
        index.link(&tree, &"a".into(), &"t".into()).unwrap();
        index.link(&tree, &"b".into(), &"a".into()).unwrap();
        index.link(&tree, &"c".into(), &"b".into()).unwrap();

        index.isolate(&"a".into());

        assert!(!index.is_linked(&"a".into()));
        assert!(!index.is_linked(&"t".into()));
        assert!(matches!(index.link_of(&"b".into()), Some(SymbolLink::Template { .. })));
        assert_eq!(index.template_of(&"c".into()), Some(&NodeId::from("b")));
        assert!(index.check_consistency().is_empty());
    }
}
