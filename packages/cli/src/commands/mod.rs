pub mod apply;
pub mod check;
pub mod inspect;

pub use apply::{apply, ApplyArgs};
pub use check::{check, CheckArgs};
pub use inspect::{inspect, InspectArgs};

use anyhow::{Context, Result};
use composer_editor::{Document, EditorConfig, ImportReport};
use std::path::Path;

/// Load a project file using the `composer.config.json` found in `cwd`
pub fn open_project(project: &Path, cwd: &Path) -> Result<(Document, ImportReport)> {
    let config = EditorConfig::load(cwd).context("Failed to load composer.config.json")?;
    let (doc, report) = Document::load(project, config)
        .with_context(|| format!("Failed to load project {}", project.display()))?;
    Ok((doc, report))
}
