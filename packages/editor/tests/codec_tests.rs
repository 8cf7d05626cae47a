//! Reference codec tests

use composer_editor::{Document, EditorConfig, ProjectData, SymbolLink, SyncWarning};
use composer_model::{NodeDef, NodeId};
use serde_json::json;

fn nested_document() -> Document {
    let mut doc = Document::default();
    let button = doc.create(&NodeDef::text("button", "Buy").with_id("button"));
    let card = doc.create(
        &NodeDef::new("div")
            .with_id("card")
            .with_child(NodeDef::text("h2", "Title")),
    );
    doc.create_symbol_in(&button, Some(&card), None).unwrap();
    doc.create_symbol(&card).unwrap();
    doc.create_symbol(&card).unwrap();
    doc
}

#[test]
fn test_round_trip_preserves_relation_pairs() {
    let doc = nested_document();
    let json = doc.to_json().unwrap();

    let (restored, report) = Document::from_json(&json, EditorConfig::default()).unwrap();

    assert!(report.is_clean(), "{:?}", report.warnings);
    assert_eq!(restored.relations().pairs(), doc.relations().pairs());
    assert_eq!(restored.tree().len(), doc.tree().len());
    assert_eq!(restored.tree().roots(), doc.tree().roots());
    assert_eq!(restored.relations().check_consistency(), Vec::new());
    assert!(restored.verify().is_empty());
}

#[test]
fn test_round_trip_through_file() {
    let doc = nested_document();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("project.json");

    doc.save(&path).unwrap();
    let (restored, _) = Document::load(&path, EditorConfig::default()).unwrap();

    assert_eq!(restored.export(), doc.export());
}

#[test]
fn test_import_restores_chained_templates() {
    let data: ProjectData = serde_json::from_value(json!({
        "components": [
            { "id": "a", "__symbols": ["b"] },
            { "id": "b", "__symbol": "a", "__symbols": ["c"] },
            { "id": "c", "__symbol": "b" }
        ]
    }))
    .unwrap();

    let (mut doc, report) = Document::from_project(&data, EditorConfig::default());
    assert!(report.is_clean());
    assert_eq!(report.relations, 2);
    assert!(matches!(
        doc.relations().link_of(&"b".into()),
        Some(SymbolLink::Both { .. })
    ));

    let c = NodeId::from("c");
    doc.set_attributes(&c, [("title", "chained")]).unwrap();
    for id in ["a", "b", "c"] {
        let node = doc.tree().node(&id.into()).unwrap();
        assert_eq!(node.attributes.get("title").map(String::as_str), Some("chained"));
    }
}

#[test]
fn test_import_reports_problems_without_failing() {
    let data: ProjectData = serde_json::from_value(json!({
        "components": [
            { "id": "t", "__symbols": ["gone"], "components": [{ "id": "inner" }] },
            { "id": "self", "__symbol": "self" },
            { "id": "inner", "content": "duplicate" },
            { "id": "child-link", "components": [{ "id": "nested", "__symbol": "child-link" }] }
        ]
    }))
    .unwrap();

    let (doc, report) = Document::from_project(&data, EditorConfig::default());

    assert_eq!(report.nodes, 6);
    assert_eq!(doc.tree().len(), 6);
    assert!(doc.relations().is_empty());

    let dangling = report
        .warnings
        .iter()
        .filter(|w| matches!(w, SyncWarning::DanglingReference { .. }))
        .count();
    let invalid = report
        .warnings
        .iter()
        .filter(|w| matches!(w, SyncWarning::InvalidRelation { .. }))
        .count();
    let duplicates = report
        .warnings
        .iter()
        .filter(|w| matches!(w, SyncWarning::DuplicateId { .. }))
        .count();
    assert_eq!((dangling, invalid, duplicates), (1, 2, 1));
}

#[test]
fn test_exported_shape() {
    let mut doc = Document::default();
    let t = doc.create(
        &NodeDef::new("section")
            .with_id("hero")
            .with_attribute("title", "Hero")
            .with_style("color", "red"),
    );
    doc.create_symbol(&t).unwrap();

    let value = serde_json::to_value(doc.export()).unwrap();
    let hero = &value["components"][0];
    assert_eq!(hero["tagName"], json!("section"));
    assert_eq!(hero["attributes"]["title"], json!("Hero"));
    assert_eq!(hero["style"]["color"], json!("red"));
    assert_eq!(hero["__symbols"].as_array().map(Vec::len), Some(1));
    assert_eq!(value["components"][1]["__symbol"], json!("hero"));
}
