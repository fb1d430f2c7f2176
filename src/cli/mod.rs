//! Command-line interface for cortex-fetch.
//!
//! ```bash
//! # Resolve cortex.json in the current directory and write the build plan
//! cortex-fetch install
//!
//! # Use a private registry and bound concurrent clones
//! cortex-fetch install --registry https://registry.example.com --max-parallel 4
//!
//! # Show the last resolution
//! cortex-fetch tree
//! cortex-fetch tree --failed
//! ```
//!
//! Global flags (`--verbose`, `--quiet`, `--config`, `--no-progress`) are
//! accepted before or after the subcommand.

mod install;
mod tree;

pub use install::{InstallCommand, prepare_work_dir};
pub use tree::{TreeCommand, render_tree};

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::constants::NO_PROGRESS_ENV;

/// Process-wide settings derived from the global flags.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_level: String,
    pub no_progress: bool,
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Exports settings that deeper layers read from the environment.
    pub fn apply_to_env(&self) {
        if self.no_progress {
            // SAFETY: runs once at startup, before any task reads the environment
            unsafe { std::env::set_var(NO_PROGRESS_ENV, "1") };
        }
    }

    /// Installs the global tracing subscriber, writing to stderr.
    ///
    /// `RUST_LOG` takes precedence over the verbosity flags.
    pub fn init_logging(&self) {
        let filter = if std::env::var_os("RUST_LOG").is_some() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(&self.log_level)
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

#[derive(Parser)]
#[command(
    name = "cortex-fetch",
    about = "Resolve cortex package dependencies into exact git snapshots",
    version,
    long_about = "cortex-fetch reads the dependencies of a cortex project, resolves every \
                  transitive dependency through the registry, checks out the exact commit \
                  each version was published from and writes a build plan for the bundler."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a config file (default: ~/.cortex-fetch/config.toml)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable progress spinners
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve and fetch all dependencies, then write the build plan
    Install(InstallCommand),

    /// Display the last resolution as a dependency tree
    Tree(TreeCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        };

        CliConfig {
            log_level: log_level.to_string(),
            no_progress: self.no_progress,
            config_path: self.config.clone(),
        }
    }

    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.apply_to_env();
        config.init_logging();

        let config_path = config.config_path.as_deref();
        match self.command {
            Commands::Install(cmd) => cmd.execute(config_path).await,
            Commands::Tree(cmd) => cmd.execute(config_path).await,
        }
    }
}

/// Absolute project directory: `dir` if given (relative to the current
/// directory), otherwise the current directory.
pub(crate) fn project_dir(dir: Option<&Path>) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(match dir {
        Some(dir) if dir.is_absolute() => dir.to_path_buf(),
        Some(dir) => cwd.join(dir),
        None => cwd,
    })
}
