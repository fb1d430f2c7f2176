//! Git test helper utilities
//!
//! Builds throwaway upstream repositories for snapshot and CLI tests.

use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Synchronous git wrapper for setting up test repositories.
///
/// Use this instead of raw `std::process::Command` when a test needs an
/// upstream repository to clone from.
pub struct TestGit {
    repo_path: PathBuf,
}

impl TestGit {
    fn run_git_command(&self, args: &[&str], action: &str) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .output()
            .with_context(|| action.to_string())?;

        if !output.status.success() {
            bail!("{} failed: {}", action, String::from_utf8_lossy(&output.stderr));
        }

        Ok(output)
    }

    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    pub fn init(&self) -> Result<()> {
        self.run_git_command(&["init", "--quiet"], "Failed to initialize git repository")?;
        Ok(())
    }

    /// Sets a committer identity and disables commit signing.
    pub fn config_user(&self) -> Result<()> {
        self.run_git_command(
            &["config", "user.email", "test@cortex.example"],
            "Failed to configure git user email",
        )?;
        self.run_git_command(&["config", "user.name", "Test User"], "Failed to configure git user name")?;
        self.run_git_command(&["config", "commit.gpgsign", "false"], "Failed to disable commit signing")?;
        Ok(())
    }

    pub fn add_all(&self) -> Result<()> {
        self.run_git_command(&["add", "."], "Failed to add files to git")?;
        Ok(())
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.run_git_command(&["commit", "--quiet", "-m", message], "Failed to create git commit")?;
        Ok(())
    }

    /// Full SHA of HEAD.
    pub fn rev_parse_head(&self) -> Result<String> {
        let output = self.run_git_command(&["rev-parse", "HEAD"], "Failed to get current commit SHA")?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// `file://` URL of this repository, suitable for `git clone`.
    pub fn file_url(&self) -> String {
        format!("file://{}", self.repo_path.display())
    }

    /// Creates an initialised repository at `path` whose single commit
    /// contains the given files. Returns the helper and the commit SHA.
    pub fn with_files(path: impl Into<PathBuf>, files: &[(&str, &str)]) -> Result<(Self, String)> {
        let git = Self::new(path);
        std::fs::create_dir_all(&git.repo_path)
            .with_context(|| format!("Failed to create {}", git.repo_path.display()))?;
        git.init()?;
        git.config_user()?;
        git.write_files(files)?;
        git.add_all()?;
        git.commit("initial")?;
        let sha = git.rev_parse_head()?;
        Ok((git, sha))
    }

    /// Writes files relative to the repository root, creating directories.
    pub fn write_files(&self, files: &[(&str, &str)]) -> Result<()> {
        for (relative, content) in files {
            let path = self.repo_path.join(relative);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        }
        Ok(())
    }
}
