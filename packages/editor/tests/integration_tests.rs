//! Integration tests for the editor crate: scripted edits end to end

use composer_editor::{ChangeKind, ChangeLog, Document, EditorConfig, Mutation, ProjectData};
use composer_model::NodeId;
use serde_json::json;

const PROJECT: &str = r#"{
    "components": [
        {
            "id": "page",
            "tagName": "main",
            "components": [
                {
                    "id": "card",
                    "classes": ["card"],
                    "__symbols": ["card-2"],
                    "components": [
                        { "id": "title", "tagName": "h2", "content": "Title", "__symbols": ["title-2"] }
                    ]
                },
                {
                    "id": "card-2",
                    "classes": ["card"],
                    "__symbol": "card",
                    "components": [
                        { "id": "title-2", "tagName": "h2", "content": "Title", "__symbol": "title" }
                    ]
                }
            ]
        }
    ]
}"#;

fn load() -> Document {
    let (doc, report) = Document::from_json(PROJECT, EditorConfig::default()).unwrap();
    assert!(report.is_clean());
    doc
}

#[test]
fn test_replay_script() {
    let mut doc = load();
    let log = ChangeLog::new();
    doc.add_listener(log.clone());

    let script: Vec<Mutation> = serde_json::from_value(json!([
        { "InsertNode": { "parent_id": "card-2", "node": { "id": "cta", "tagName": "button", "content": "Buy" } } },
        { "SetStyle": { "node_id": "card", "style": { "padding": "8px" } } },
        { "SetContent": { "node_id": "title-2", "content": "Sale" } },
        { "CreateSymbol": { "node_id": "card", "parent_id": "page" } },
        { "SetAttributes": { "node_id": "cta", "attributes": { "href": "/buy" } } }
    ]))
    .unwrap();

    for mutation in script {
        doc.apply(mutation).unwrap();
    }

    assert_eq!(doc.version, 5);
    assert_eq!(log.len(), 5);
    assert_eq!(log.events()[3].kind, ChangeKind::SymbolCreated);

    let page = NodeId::from("page");
    let cards = doc.tree().children(&page).to_vec();
    assert_eq!(cards.len(), 3);
    for card in &cards {
        let node = doc.tree().node(card).unwrap();
        assert_eq!(node.style.get("padding").map(String::as_str), Some("8px"));

        let children = doc.tree().children(card);
        assert_eq!(children.len(), 2);
        let title = doc.tree().node(&children[0]).unwrap();
        assert_eq!(title.content.as_deref(), Some("Sale"));
        let cta = doc.tree().node(&children[1]).unwrap();
        assert_eq!(cta.attributes.get("href").map(String::as_str), Some("/buy"));
    }

    // The button was inserted through an instance, so the main card owns
    // the template copy
    let cta = NodeId::from("cta");
    let main_cta = doc.tree().children(&"card".into())[1].clone();
    assert_eq!(doc.get_symbol_template(&cta), Some(&main_cta));
    assert_eq!(doc.get_symbol_instances(&main_cta).len(), 2);
    assert!(doc.verify().is_empty());
}

#[test]
fn test_failed_mutation_stops_nothing_else() {
    let mut doc = load();

    let result = doc.apply(Mutation::MoveNode {
        node_id: "title".into(),
        new_parent_id: "card".into(),
        index: 4,
    });
    assert!(result.is_err());
    assert_eq!(doc.version, 0);

    doc.apply(Mutation::RemoveNode {
        node_id: "title".into(),
    })
    .unwrap();
    assert!(doc.tree().children(&"card-2".into()).is_empty());
    assert!(doc.is_main_symbol(&"card".into()));
    assert_eq!(doc.relations().pairs().len(), 1);
}

#[test]
fn test_export_after_edits_reimports_cleanly() {
    let mut doc = load();
    doc.apply(Mutation::CloneNode {
        node_id: "card".into(),
    })
    .unwrap();
    doc.apply(Mutation::DetachSymbol {
        node_id: "card-2".into(),
    })
    .unwrap();

    let data: ProjectData = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
    let (restored, report) = Document::from_project(&data, EditorConfig::default());

    assert!(report.is_clean());
    assert!(restored.relations().is_empty());
    assert_eq!(restored.tree().roots().len(), 2);
}
