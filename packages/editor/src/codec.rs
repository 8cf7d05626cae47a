//! # Reference Codec
//!
//! Persists the component forest with symbol relations encoded as plain id
//! references:
//!
//! ```json
//! { "id": "card", "__symbols": ["card-copy"], "components": [...] }
//! { "id": "card-copy", "__symbol": "card", "components": [...] }
//! ```
//!
//! Import runs in two passes: every node is materialized first, then
//! references are resolved across the whole imported forest. References that
//! do not resolve are dropped and reported.

use crate::errors::SyncWarning;
use crate::relation::RelationIndex;
use composer_model::{NodeDef, NodeId, PropagationStop, Tree};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

/// Persisted project: the ordered list of root components
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    #[serde(default)]
    pub components: Vec<NodeRecord>,
}

fn default_tag_name() -> String {
    "div".to_string()
}

/// Persisted node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
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
    pub components: Vec<NodeRecord>,

    /// Template id, set on instances
    #[serde(rename = "__symbol", default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    /// Instance ids, set on templates
    #[serde(rename = "__symbols", default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<String>,

    #[serde(flatten)]
    pub properties: BTreeMap<String, Value>,
}

impl NodeRecord {
    /// Definition of this record and its components, without relations
    pub fn to_def(&self) -> NodeDef {
        NodeDef {
            id: self.id.clone(),
            tag_name: self.tag_name.clone(),
            attributes: self.attributes.clone(),
            classes: self.classes.clone(),
            style: self.style.clone(),
            content: self.content.clone(),
            propagation_stop: self.propagation_stop.clone(),
            components: self.components.iter().map(NodeRecord::to_def).collect(),
            properties: self.properties.clone(),
        }
    }

    /// This record followed by all nested records, in pre-order
    fn flatten(&self) -> Vec<&NodeRecord> {
        let mut out = vec![self];
        for child in &self.components {
            out.extend(child.flatten());
        }
        out
    }
}

/// Summary of an import
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub nodes: usize,
    pub relations: usize,
    pub warnings: Vec<SyncWarning>,
}

impl ImportReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Serialize every root of `tree` with its relation references
pub fn export(tree: &Tree, relations: &RelationIndex) -> ProjectData {
    let components = tree
        .roots()
        .iter()
        .filter_map(|root| export_node(tree, relations, root))
        .collect();
    ProjectData { components }
}

fn export_node(tree: &Tree, relations: &RelationIndex, id: &NodeId) -> Option<NodeRecord> {
    let node = tree.get(id)?;
    let def = node.to_def();

    Some(NodeRecord {
        id: def.id,
        tag_name: def.tag_name,
        attributes: def.attributes,
        classes: def.classes,
        style: def.style,
        content: def.content,
        propagation_stop: def.propagation_stop,
        components: node
            .children()
            .iter()
            .filter_map(|child| export_node(tree, relations, child))
            .collect(),
        symbol: relations.template_of(id).map(NodeId::to_string),
        symbols: relations
            .instances_of(id)
            .iter()
            .map(NodeId::to_string)
            .collect(),
        properties: def.properties,
    })
}

/// Materialize `data` into `tree` and re-establish its relations
pub fn import(data: &ProjectData, tree: &mut Tree, relations: &mut RelationIndex) -> ImportReport {
    let mut report = ImportReport::default();
    let mut by_declared_id: HashMap<String, NodeId> = HashMap::new();
    let mut declarations: Vec<(NodeId, &NodeRecord)> = Vec::new();

    // Pass 1: nodes only
    for component in &data.components {
        let root = tree.create(&component.to_def());
        let created = tree.descendants(&root);

        for (record, id) in component.flatten().into_iter().zip(created) {
            // Records without an id simply get a generated one
            if let Some(declared) = record.id.as_deref().filter(|d| !d.is_empty()) {
                // Clashes within the file or with nodes already in the tree
                if by_declared_id.contains_key(declared) || id.as_str() != declared {
                    warn!(id = declared, replacement = %id, "Duplicate id on import");
                    report.warnings.push(SyncWarning::DuplicateId {
                        id: declared.to_string(),
                        replacement: id.clone(),
                    });
                }
                by_declared_id
                    .entry(declared.to_string())
                    .or_insert_with(|| id.clone());
            }
            declarations.push((id, record));
            report.nodes += 1;
        }
    }

    let resolve = |node: &NodeId, reference: &str, warnings: &mut Vec<SyncWarning>| {
        let found = by_declared_id.get(reference).cloned();
        if found.is_none() {
            warn!(node = %node, reference, "Dropping dangling symbol reference");
            warnings.push(SyncWarning::DanglingReference {
                node: node.clone(),
                reference: reference.to_string(),
            });
        }
        found
    };

    // Pass 2: templates first, so instance order follows `__symbols`
    for (template, record) in &declarations {
        for reference in &record.symbols {
            let Some(instance) = resolve(template, reference, &mut report.warnings) else {
                continue;
            };
            let declared = declarations
                .iter()
                .find(|(id, _)| *id == instance)
                .and_then(|(_, r)| r.symbol.as_deref());
            // An instance's own `__symbol` wins over a template's listing
            if let Some(declared) = declared {
                if by_declared_id.get(declared) != Some(template) {
                    continue;
                }
            }
            link_imported(tree, relations, &instance, template, &mut report);
        }
    }

    for (instance, record) in &declarations {
        let Some(reference) = record.symbol.as_deref() else {
            continue;
        };
        if relations.is_instance(instance) {
            continue;
        }
        if let Some(template) = resolve(instance, reference, &mut report.warnings) {
            link_imported(tree, relations, instance, &template, &mut report);
        }
    }

    info!(
        nodes = report.nodes,
        relations = report.relations,
        warnings = report.warnings.len(),
        "Import complete"
    );
    report
}

fn link_imported(
    tree: &Tree,
    relations: &mut RelationIndex,
    instance: &NodeId,
    template: &NodeId,
    report: &mut ImportReport,
) {
    if relations.template_of(instance) == Some(template) {
        return;
    }
    match relations.link(tree, instance, template) {
        Ok(()) => report.relations += 1,
        Err(error) => {
            warn!(instance = %instance, template = %template, %error, "Dropping invalid relation");
            report.warnings.push(SyncWarning::InvalidRelation {
                node: instance.clone(),
                error,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn load(value: Value) -> (Tree, RelationIndex, ImportReport) {
        let data: ProjectData = serde_json::from_value(value).unwrap();
        let mut tree = Tree::default();
        let mut relations = RelationIndex::new();
        let report = import(&data, &mut tree, &mut relations);
        (tree, relations, report)
    }

    #[test]
    fn test_import_resolves_forward_references() {
        let (tree, relations, report) = load(json!({
            "components": [
                { "id": "copy", "__symbol": "main", "content": "A" },
                { "id": "main", "__symbols": ["copy"], "content": "A" }
            ]
        }));

        assert!(report.is_clean());
        assert_eq!(report.nodes, 2);
        assert_eq!(report.relations, 1);
        assert_eq!(tree.roots().len(), 2);
        assert_eq!(relations.template_of(&"copy".into()), Some(&"main".into()));
    }

    #[test]
    fn test_import_drops_dangling_references() {
        let (_, relations, report) = load(json!({
            "components": [
                { "id": "a", "__symbol": "ghost" },
                { "id": "b", "__symbols": ["phantom"] }
            ]
        }));

        assert!(relations.is_empty());
        assert_eq!(report.warnings.len(), 2);
        assert!(report
            .warnings
            .iter()
            .all(|w| matches!(w, SyncWarning::DanglingReference { .. })));
    }

    #[test]
    fn test_instance_declaration_wins_over_template_listing() {
        let (_, relations, report) = load(json!({
            "components": [
                { "id": "t1", "__symbols": ["i"] },
                { "id": "t2", "__symbols": ["i"] },
                { "id": "i", "__symbol": "t2" }
            ]
        }));

        assert!(report.is_clean());
        assert_eq!(relations.template_of(&"i".into()), Some(&"t2".into()));
        assert!(!relations.is_linked(&"t1".into()));
    }

    #[test]
    fn test_duplicate_ids_are_replaced() {
        let (tree, _, report) = load(json!({
            "components": [{ "id": "x" }, { "id": "x" }]
        }));

        assert_eq!(tree.len(), 2);
        assert!(matches!(
            report.warnings.as_slice(),
            [SyncWarning::DuplicateId { .. }]
        ));
    }

    #[test]
    fn test_import_reports_ids_taken_by_existing_nodes() {
        let mut tree = Tree::default();
        let mut relations = RelationIndex::new();
        tree.create(&NodeDef::new("div").with_id("card"));

        let data: ProjectData = serde_json::from_value(json!({
            "components": [
                { "id": "card", "__symbols": ["copy"] },
                { "id": "copy", "__symbol": "card" },
                { "tagName": "span" }
            ]
        }))
        .unwrap();
        let report = import(&data, &mut tree, &mut relations);

        assert_eq!(report.nodes, 3);
        assert_eq!(report.warnings.len(), 1);
        let SyncWarning::DuplicateId { id, replacement } = &report.warnings[0] else {
            panic!("expected a duplicate id warning, got {:?}", report.warnings);
        };
        assert_eq!(id, "card");
        assert_ne!(replacement.as_str(), "card");

        // References inside the file follow the renamed node
        assert_eq!(relations.template_of(&"copy".into()), Some(replacement));
        assert!(!relations.is_linked(&"card".into()));
    }

    #[test]
    fn test_export_writes_reference_fields() {
        let (tree, relations, _) = load(json!({
            "components": [
                { "id": "main", "__symbols": ["copy"], "removable": false },
                { "id": "copy", "__symbol": "main" }
            ]
        }));

        let value = serde_json::to_value(export(&tree, &relations)).unwrap();
        assert_eq!(value["components"][0]["__symbols"], json!(["copy"]));
        assert_eq!(value["components"][0]["removable"], json!(false));
        assert_eq!(value["components"][1]["__symbol"], json!("main"));
        assert!(value["components"][1].get("__symbols").is_none());
    }
}
