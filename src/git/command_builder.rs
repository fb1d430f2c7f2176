//! Type-safe builder for git invocations.
//!
//! Every git call made by cortex-fetch goes through [`GitCommand`], which
//! runs the system `git` binary via `tokio::process`, applies a timeout,
//! logs the command line under the `git` tracing target and converts
//! failures into [`CortexError`] variants keyed on the subcommand.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::constants::{GIT_CLONE_TIMEOUT, GIT_QUERY_TIMEOUT};
use crate::core::CortexError;
use crate::utils::platform::get_git_command;

/// Builder for a single git process.
pub struct GitCommand {
    /// Arguments passed to git, after the optional `-C <dir>`
    args: Vec<String>,

    /// Directory passed to git with `-C`
    current_dir: Option<PathBuf>,

    /// Extra environment for the child process
    env_vars: Vec<(String, String)>,

    /// Upper bound on the command's runtime; `None` waits forever
    timeout_duration: Option<Duration>,

    /// Label included in log lines (usually the package name)
    context: Option<String>,

    /// URL remembered for clone error reporting
    clone_url: Option<String>,
}

impl Default for GitCommand {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            current_dir: None,
            // Never let git block on an interactive credential prompt
            env_vars: vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())],
            timeout_duration: Some(GIT_QUERY_TIMEOUT),
            context: None,
            clone_url: None,
        }
    }
}

impl GitCommand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout_duration = duration;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Runs the command and captures its output.
    ///
    /// # Errors
    ///
    /// - [`CortexError::GitCloneFailed`] for a failed `clone`
    /// - [`CortexError::GitResetFailed`] for a failed `reset`
    /// - [`CortexError::GitCommandError`] for any other failure or a timeout
    pub async fn execute(self) -> Result<GitCommandOutput> {
        let start = std::time::Instant::now();
        let git_command = get_git_command();
        let mut cmd = Command::new(git_command);

        let mut full_args = Vec::new();
        if let Some(ref dir) = self.current_dir {
            // -C keeps git independent of the process working directory
            full_args.push("-C".to_string());
            full_args.push(dir.display().to_string());
        }
        full_args.extend(self.args.iter().cloned());
        let operation = self.args.first().cloned().unwrap_or_else(|| "unknown".to_string());
        let label = self.context.as_deref().unwrap_or("-");

        cmd.args(&full_args);
        tracing::debug!(
            target: "git",
            "({}) Executing command: {} {}",
            label,
            git_command,
            full_args.join(" ")
        );

        for (key, value) in &self.env_vars {
            tracing::trace!(target: "git", "Setting env var: {}={}", key, value);
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output_future = cmd.output();
        let output = if let Some(duration) = self.timeout_duration {
            if let Ok(result) = timeout(duration, output_future).await {
                result.with_context(|| format!("Failed to execute git {}", full_args.join(" ")))?
            } else {
                tracing::warn!(
                    target: "git",
                    "({}) Command timed out after {} seconds: git {}",
                    label,
                    duration.as_secs(),
                    full_args.join(" ")
                );
                return Err(CortexError::GitCommandError {
                    operation,
                    stderr: format!(
                        "git command timed out after {} seconds: git {}",
                        duration.as_secs(),
                        full_args.join(" ")
                    ),
                }
                .into());
            }
        } else {
            output_future
                .await
                .with_context(|| format!("Failed to execute git {}", full_args.join(" ")))?
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::debug!(
                target: "git",
                "({}) Command failed with exit code: {:?}",
                label,
                output.status.code()
            );
            if !stderr.is_empty() {
                tracing::debug!(target: "git", "({}) Error: {}", label, stderr.trim());
            }

            let reason = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };

            let error = match operation.as_str() {
                "clone" => CortexError::GitCloneFailed {
                    url: self.clone_url.unwrap_or_else(|| "unknown".to_string()),
                    reason,
                },
                "reset" => CortexError::GitResetFailed {
                    reference: self.args.get(2).cloned().unwrap_or_default(),
                    reason,
                },
                _ => CortexError::GitCommandError {
                    operation,
                    stderr: reason,
                },
            };
            return Err(error.into());
        }

        if !stderr.trim().is_empty() {
            tracing::debug!(target: "git", "({}) {}", label, stderr.trim());
        }

        let elapsed = start.elapsed();
        if elapsed.as_secs() > 1 {
            tracing::info!(target: "git::perf", "({}) Git {} took {:.2}s", label, operation, elapsed.as_secs_f64());
        } else if elapsed.as_millis() > 100 {
            tracing::debug!(target: "git::perf", "({}) Git {} took {}ms", label, operation, elapsed.as_millis());
        }

        Ok(GitCommandOutput {
            stdout,
            stderr,
        })
    }

    /// Runs the command and returns trimmed stdout.
    pub async fn execute_stdout(self) -> Result<String> {
        let output = self.execute().await?;
        Ok(output.stdout.trim().to_string())
    }

    /// Runs the command, discarding its output.
    pub async fn execute_success(self) -> Result<()> {
        self.execute().await?;
        Ok(())
    }
}

/// Captured output of a successful git command.
#[derive(Debug)]
pub struct GitCommandOutput {
    pub stdout: String,
    pub stderr: String,
}

// Convenience builders for the operations cortex-fetch performs

impl GitCommand {
    /// `git clone` of the default branch into `target`.
    pub fn clone(url: &str, target: impl AsRef<Path>) -> Self {
        let mut cmd = Self::new().with_timeout(Some(GIT_CLONE_TIMEOUT));
        cmd.args.push("clone".to_string());
        cmd.args.push("--quiet".to_string());
        // A URL starting with '-' must not be parsed as an option
        cmd.args.push("--".to_string());
        cmd.args.push(url.to_string());
        cmd.args.push(target.as_ref().display().to_string());
        cmd.clone_url = Some(url.to_string());
        cmd
    }

    /// `git reset --hard <commit>`
    pub fn reset_hard(commit: &str) -> Self {
        Self::new().with_timeout(Some(GIT_CLONE_TIMEOUT)).args(["reset", "--hard", commit])
    }

    /// Exits 0 only when `commit` names a commit object present locally.
    pub fn verify_commit(commit: &str) -> Self {
        Self::new().args(["rev-parse", "--verify", "--quiet", &format!("{commit}^{{commit}}")])
    }

    pub fn current_commit() -> Self {
        Self::new().args(["rev-parse", "HEAD"])
    }

    pub fn version() -> Self {
        Self::new().arg("--version")
    }
}
