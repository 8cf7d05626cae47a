use super::open_project;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use composer_editor::SyncWarning;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Project JSON file
    pub project: PathBuf,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    pub format: String,
}

pub fn check(args: CheckArgs, cwd: &Path) -> Result<()> {
    let problems = collect_problems(&args.project, cwd)?;

    if args.format == "json" {
        let messages: Vec<String> = problems.iter().map(ToString::to_string).collect();
        println!("{}", serde_json::to_string_pretty(&messages)?);
    } else {
        println!("🔍 {} {}", "Checking".green().bold(), args.project.display());
        println!();

        for problem in &problems {
            let label = match problem {
                SyncWarning::DanglingReference { .. } => "dangling".yellow().bold(),
                SyncWarning::DuplicateId { .. } => "duplicate".yellow().bold(),
                SyncWarning::InvalidRelation { .. } => "invalid".red().bold(),
                SyncWarning::StructuralMismatch { .. } => "mismatch".red().bold(),
            };
            println!("  {} {}", label, problem);
        }

        if problems.is_empty() {
            println!("   {} No issues found!", "✓".green());
        } else {
            println!();
            println!("   {} {}", "Problems:".red(), problems.len());
        }
    }

    if !problems.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}

/// Import warnings followed by drift found in the loaded document
pub fn collect_problems(project: &Path, cwd: &Path) -> Result<Vec<SyncWarning>> {
    let (doc, report) = open_project(project, cwd)?;
    let mut problems = report.warnings;
    problems.extend(doc.verify());
    Ok(problems)
}
