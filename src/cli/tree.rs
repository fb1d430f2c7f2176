//! The `tree` command: display the last resolution.
//!
//! Reads `resolution.json` from the working directory and prints every
//! package under the package that first requested it:
//!
//! ```text
//! app
//! ├── a 1.2.0
//! │   └── b 0.2.0 (approximate)
//! └── c * (failed: registry)
//! ```
//!
//! With `--failed` only the failed packages and their diagnostics are listed.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{ConfigOverrides, ResolverConfig};
use crate::handoff::{BuildPlan, FailedModule, PlannedModule, load_resolution};

#[derive(Args, Debug)]
pub struct TreeCommand {
    /// Project directory (default: current directory)
    #[arg(long, value_name = "DIR")]
    project_dir: Option<PathBuf>,

    /// Working directory holding resolution.json, relative to the project
    #[arg(long, value_name = "DIR")]
    work_dir: Option<String>,

    /// Only list packages that failed, with their diagnostics
    #[arg(long)]
    failed: bool,
}

impl TreeCommand {
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        let project_dir = super::project_dir(self.project_dir.as_deref())?;
        let mut config = ResolverConfig::load(config_path).await?;
        config.apply_overrides(ConfigOverrides {
            work_dir: self.work_dir,
            ..ConfigOverrides::default()
        })?;

        let plan = load_resolution(&config.resolve_work_dir(&project_dir)?).await?;
        let title = project_dir
            .file_name()
            .map_or_else(|| project_dir.display().to_string(), |n| n.to_string_lossy().into_owned());

        for line in render_tree(&plan, &title, self.failed) {
            println!("{line}");
        }
        Ok(())
    }
}

enum Entry<'a> {
    Module(&'a PlannedModule),
    Failed(&'a FailedModule),
}

impl Entry<'_> {
    fn name(&self) -> &str {
        match self {
            Self::Module(m) => &m.name,
            Self::Failed(f) => &f.name,
        }
    }

    fn parent(&self) -> Option<&str> {
        match self {
            Self::Module(m) => m.requested_by.as_deref(),
            Self::Failed(f) => f.requested_by.as_deref(),
        }
    }

    fn label(&self) -> String {
        match self {
            Self::Module(m) => {
                let mut label = format!("{} {}", m.name.cyan(), m.version);
                if m.approximate {
                    label.push_str(&format!(" {}", "(approximate)".yellow()));
                }
                label
            }
            Self::Failed(f) => {
                let kind = f.diagnostics.last().map_or_else(|| "unknown".to_string(), |d| d.kind.to_string());
                format!("{} {} {}", f.name.red(), f.version_range, format!("(failed: {kind})").red())
            }
        }
    }
}

/// Renders the plan as lines of text.
#[must_use]
pub fn render_tree(plan: &BuildPlan, title: &str, failed_only: bool) -> Vec<String> {
    if failed_only {
        return render_failures(plan);
    }

    let entries: Vec<Entry<'_>> = plan
        .modules
        .iter()
        .map(Entry::Module)
        .chain(plan.failed.iter().map(Entry::Failed))
        .collect();

    let known: BTreeMap<&str, &Entry<'_>> = entries.iter().map(|e| (e.name(), e)).collect();
    let mut children: BTreeMap<Option<&str>, Vec<&Entry<'_>>> = BTreeMap::new();
    for entry in &entries {
        // Entries whose requester is missing are shown at the top level
        let parent = entry.parent().filter(|p| known.contains_key(p));
        children.entry(parent).or_default().push(entry);
    }
    for list in children.values_mut() {
        list.sort_by(|a, b| a.name().cmp(b.name()));
    }

    let mut lines = vec![title.bold().to_string()];
    render_children(None, "", &children, &mut lines);

    lines.push(String::new());
    lines.push(format!("{} resolved, {} failed", plan.modules.len(), plan.failed.len()));
    lines
}

fn render_children<'a>(
    parent: Option<&'a str>,
    prefix: &str,
    children: &BTreeMap<Option<&'a str>, Vec<&'a Entry<'a>>>,
    lines: &mut Vec<String>,
) {
    let Some(list) = children.get(&parent) else {
        return;
    };

    for (i, &entry) in list.iter().enumerate() {
        let is_last = i == list.len() - 1;
        let connector = if is_last { "└── " } else { "├── " };
        lines.push(format!("{prefix}{connector}{}", entry.label()));

        let child_prefix = if is_last { format!("{prefix}    ") } else { format!("{prefix}│   ") };
        render_children(Some(entry.name()), &child_prefix, children, lines);
    }
}

fn render_failures(plan: &BuildPlan) -> Vec<String> {
    if plan.failed.is_empty() {
        return vec![format!("{} No failed packages", "✓".green())];
    }

    let mut lines = Vec::new();
    for failed in &plan.failed {
        let via = failed.requested_by.as_deref().map(|p| format!(" (required by {p})")).unwrap_or_default();
        lines.push(format!("{} {}{}", failed.name.red().bold(), failed.version_range, via));
        for diagnostic in &failed.diagnostics {
            lines.push(format!("    [{}] {}", diagnostic.kind, diagnostic.message));
        }
    }
    lines
}
