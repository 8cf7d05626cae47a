use super::open_project;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use composer_editor::{Document, Mutation};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Project JSON file
    pub project: PathBuf,

    /// JSON array of mutations
    pub script: PathBuf,

    /// Where to write the edited project (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn apply(args: ApplyArgs, cwd: &Path) -> Result<()> {
    let (mut doc, _) = open_project(&args.project, cwd)?;
    let source = fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read script {}", args.script.display()))?;
    let script: Vec<Mutation> = serde_json::from_str(&source)
        .with_context(|| format!("Invalid mutation script {}", args.script.display()))?;

    let warnings = replay(&mut doc, script)?;

    match &args.output {
        Some(output) => {
            doc.save(output)?;
            eprintln!(
                "✨ {} {} → {}",
                "Applied".green().bold(),
                args.script.display(),
                output.display()
            );
        }
        None => println!("{}", doc.to_json()?),
    }

    for warning in &warnings {
        eprintln!("  {} {}", "warning".yellow().bold(), warning);
    }

    Ok(())
}

/// Apply every mutation in order; stops at the first failure
pub fn replay(doc: &mut Document, script: Vec<Mutation>) -> Result<Vec<String>> {
    let mut warnings = Vec::new();

    for (position, mutation) in script.into_iter().enumerate() {
        let name = mutation.name();
        let node = mutation.node_id().clone();
        let result = doc
            .apply(mutation)
            .with_context(|| format!("Mutation #{} ({} on {}) failed", position + 1, name, node))?;
        debug!(position, mutation = name, version = result.version, "Applied mutation");

        warnings.extend(result.warnings.iter().map(ToString::to_string));
    }

    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use composer_editor::EditorConfig;

    const PROJECT: &str = r#"{
        "components": [
            { "id": "card", "__symbols": ["copy"] },
            { "id": "copy", "__symbol": "card" }
        ]
    }"#;

    #[test]
    fn test_replay_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project.json");
        let script = dir.path().join("script.json");
        let output = dir.path().join("out.json");
        fs::write(&project, PROJECT).unwrap();
        fs::write(
            &script,
            r#"[{ "SetStyle": { "node_id": "copy", "style": { "color": "red" } } }]"#,
        )
        .unwrap();

        apply(
            ApplyArgs {
                project,
                script,
                output: Some(output.clone()),
            },
            dir.path(),
        )
        .unwrap();

        let (doc, _) = Document::from_json(&fs::read_to_string(output).unwrap(), EditorConfig::default())
            .unwrap();
        let card = doc.tree().node(&"card".into()).unwrap();
        assert_eq!(card.style.get("color").map(String::as_str), Some("red"));
    }

    #[test]
    fn test_replay_reports_failing_mutation() {
        let (mut doc, _) = Document::from_json(PROJECT, EditorConfig::default()).unwrap();
        let script = vec![
            Mutation::SetContent {
                node_id: "card".into(),
                content: Some("ok".to_string()),
            },
            Mutation::RemoveNode {
                node_id: "missing".into(),
            },
        ];

        let err = replay(&mut doc, script).unwrap_err();
        assert!(err.to_string().contains("Mutation #2 (RemoveNode on missing)"));
        assert_eq!(doc.version, 1);
    }
}
