use super::open_project;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use composer_editor::{Document, RelationIndex, SymbolLink};
use composer_model::{walk_node, walk_tree, Node, Tree, Visitor};
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Project JSON file
    pub project: PathBuf,

    /// Also print attributes and inline style
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn inspect(args: InspectArgs, cwd: &Path) -> Result<()> {
    let (doc, report) = open_project(&args.project, cwd)?;

    println!("🔍 {} {}", "Inspecting".green().bold(), args.project.display());
    println!();

    for line in render(&doc, args.verbose) {
        println!("{}", line);
    }

    println!();
    println!("   Nodes:     {}", doc.tree().len());
    println!("   Relations: {}", doc.relations().pairs().len());
    if !report.is_clean() {
        println!(
            "   {} {} (run `composer check` for details)",
            "Warnings:".yellow(),
            report.warnings.len()
        );
    }

    Ok(())
}

/// One line per node, indented by depth
pub fn render(doc: &Document, verbose: bool) -> Vec<String> {
    let mut printer = TreePrinter {
        relations: doc.relations(),
        verbose,
        lines: Vec::new(),
    };
    walk_tree(&mut printer, doc.tree());
    printer.lines
}

struct TreePrinter<'a> {
    relations: &'a RelationIndex,
    verbose: bool,
    lines: Vec<String>,
}

impl TreePrinter<'_> {
    fn marker(&self, node: &Node) -> String {
        match self.relations.link_of(node.id()) {
            None => String::new(),
            Some(SymbolLink::Template { instances }) => {
                format!(" {} ×{}", "◆".cyan(), instances.len())
            }
            Some(SymbolLink::Instance { template }) => {
                format!(" {} {}", "◇".magenta(), template)
            }
            Some(SymbolLink::Both {
                template,
                instances,
            }) => format!(" {} {} ×{}", "◈".blue(), template, instances.len()),
        }
    }
}

impl Visitor for TreePrinter<'_> {
    fn visit_node(&mut self, tree: &Tree, node: &Node, depth: usize) {
        let mut line = format!(
            "{}<{}> #{}{}",
            "  ".repeat(depth),
            node.tag_name,
            node.id(),
            self.marker(node)
        );
        if let Some(content) = &node.content {
            line.push_str(&format!(" {}", format!("{:?}", content).dimmed()));
        }
        if self.verbose {
            for (name, value) in &node.attributes {
                line.push_str(&format!(" {}={:?}", name, value));
            }
            for (property, value) in &node.style {
                line.push_str(&format!(" {}:{}", property, value));
            }
        }
        self.lines.push(line);

        walk_node(self, tree, node, depth);
    }
}
