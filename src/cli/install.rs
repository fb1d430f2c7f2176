//! The `install` command: resolve, fetch and hand off.
//!
//! 1. Load the configuration and apply command line overrides
//! 2. Read the root manifest (`cortex.json`, else `package.json`)
//! 3. Clear and recreate the working directory
//! 4. Resolve the dependency tree, cloning every package into the working
//!    directory
//! 5. Write `resolution.json` for the bundler and print a summary
//!
//! Individual package failures do not fail the command unless `--strict` is
//! given; they are reported in the summary and listed in the build plan.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{ConfigOverrides, ResolverConfig};
use crate::core::CortexError;
use crate::git::ensure_git_available;
use crate::handoff::{BuildPlan, Builder, HandoffWriter};
use crate::manifest::load_root;
use crate::registry::RegistryClient;
use crate::resolver::{ResolverOptions, TreeResolver};
use crate::snapshot::GitSnapshotFetcher;
use crate::source::RepositoryLocator;
use crate::utils::is_same_or_ancestor;
use crate::utils::progress::spinner_with_message;

#[derive(Args, Debug)]
pub struct InstallCommand {
    /// Project directory containing cortex.json (default: current directory)
    #[arg(long, value_name = "DIR")]
    project_dir: Option<PathBuf>,

    /// Registry base URL
    #[arg(long, value_name = "URL")]
    registry: Option<String>,

    /// Directory receiving the snapshots, relative to the project directory
    #[arg(long, value_name = "DIR")]
    work_dir: Option<String>,

    /// Maximum number of concurrent clones
    #[arg(long, value_name = "NUM", value_parser = clap::value_parser!(u32).range(1..))]
    max_parallel: Option<u32>,

    /// Exit with an error if any package failed to resolve
    #[arg(long)]
    strict: bool,
}

impl InstallCommand {
    pub async fn execute(self, config_path: Option<&Path>) -> Result<()> {
        let project_dir = super::project_dir(self.project_dir.as_deref())?;

        let mut config = ResolverConfig::load(config_path).await?;
        config.apply_overrides(ConfigOverrides {
            registry: self.registry,
            work_dir: self.work_dir,
            max_parallel: self.max_parallel.map(|n| n as usize),
        })?;

        let manifest = load_root(&project_dir).await?;
        debug!("Root manifest declares {} dependencies", manifest.dependencies.len());

        ensure_git_available()?;
        let work_dir = config.resolve_work_dir(&project_dir)?;
        prepare_work_dir(&work_dir, &project_dir).await?;

        let registry = RegistryClient::new(&config.registry, config.registry_timeout())?;
        let fetcher = GitSnapshotFetcher::new(Some(config.git_timeout()));
        let locator = RepositoryLocator::new(&config.fallback_repositories);
        let options = ResolverOptions::new(&work_dir).with_max_parallel(config.max_parallel);

        info!("Using registry {}", registry.base_url());
        let spinner = spinner_with_message("Resolving dependencies");
        spinner.set_prefix("cortex-fetch");
        let resolver = TreeResolver::new(registry, fetcher, locator, options).with_progress(spinner.clone());

        let tree = resolver.resolve(&manifest.dependencies).await;
        spinner.finish_and_clear();
        let tree = tree?;

        let plan = BuildPlan::from_tree(&tree, &project_dir, manifest.main.as_deref(), &work_dir);
        let writer = HandoffWriter::new(&work_dir);
        writer.build(&plan)?;

        print_summary(&plan, writer.path());

        if self.strict && !plan.failed.is_empty() {
            return Err(CortexError::ResolutionIncomplete {
                failed: plan.failed.len(),
            }
            .into());
        }
        Ok(())
    }
}

/// Empties `work_dir` for a fresh run.
///
/// # Errors
///
/// [`CortexError::UnsafeWorkDir`] if `work_dir` is the project directory or
/// one of its ancestors; nothing is deleted in that case.
pub async fn prepare_work_dir(work_dir: &Path, project_dir: &Path) -> Result<()> {
    if is_same_or_ancestor(work_dir, project_dir) {
        return Err(CortexError::UnsafeWorkDir {
            path: work_dir.display().to_string(),
            reason: "it contains the project directory".to_string(),
        }
        .into());
    }

    if tokio::fs::try_exists(work_dir).await.unwrap_or(false) {
        debug!("Removing previous snapshots in {}", work_dir.display());
        tokio::fs::remove_dir_all(work_dir)
            .await
            .with_context(|| CortexError::FileSystemError {
                operation: "clear working directory".to_string(),
                path: work_dir.display().to_string(),
            })?;
    }

    tokio::fs::create_dir_all(work_dir).await.with_context(|| CortexError::FileSystemError {
        operation: "create working directory".to_string(),
        path: work_dir.display().to_string(),
    })?;
    Ok(())
}

fn print_summary(plan: &BuildPlan, path: &Path) {
    let resolved = plan.modules.len();
    let failed = plan.failed.len();

    let mark = if failed == 0 { "✓".green() } else { "!".yellow() };
    println!("{mark} {resolved} resolved, {failed} failed");

    for diagnostic in plan.diagnostics() {
        let label = if diagnostic.soft { "warning".yellow() } else { "error".red() };
        println!("  {} {}: {}", label, diagnostic.package.bold(), diagnostic.message);
    }

    println!("Build plan written to {}", path.display());
}
