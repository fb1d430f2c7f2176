//! Configuration for cortex-fetch.
//!
//! Settings come from a TOML file, looked up in this order:
//!
//! 1. the `--config <path>` flag
//! 2. the `CORTEX_FETCH_CONFIG` environment variable
//! 3. `~/.cortex-fetch/config.toml` (`%LOCALAPPDATA%\cortex-fetch\config.toml`
//!    on Windows)
//! 4. built-in defaults
//!
//! An explicitly named file (1 or 2) must exist; the default location is
//! optional. Command line flags are applied on top with
//! [`ResolverConfig::apply_overrides`].
//!
//! ```toml
//! registry = "http://registry.cortexjs.dp/"
//! work_dir = "browserify-cortex"
//! registry_timeout_secs = 30
//! git_timeout_secs = 120
//! max_parallel = 8
//!
//! [fallback_repositories]
//! jquery = "https://git.example.com/mirrors/jquery.git"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::debug;

use crate::constants::{CONFIG_ENV, DEFAULT_REGISTRY, DEFAULT_WORK_DIR, GIT_CLONE_TIMEOUT, REGISTRY_TIMEOUT};
use crate::core::CortexError;
use crate::utils::platform::resolve_path;

const fn default_registry_timeout_secs() -> u64 {
    REGISTRY_TIMEOUT.as_secs()
}

const fn default_git_timeout_secs() -> u64 {
    GIT_CLONE_TIMEOUT.as_secs()
}

fn default_registry() -> String {
    DEFAULT_REGISTRY.to_string()
}

fn default_work_dir() -> String {
    DEFAULT_WORK_DIR.to_string()
}

/// Resolver settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// Registry base URL.
    #[serde(default = "default_registry")]
    pub registry: String,

    /// Snapshot directory; relative paths are taken from the project dir.
    #[serde(default = "default_work_dir")]
    pub work_dir: String,

    #[serde(default = "default_registry_timeout_secs")]
    pub registry_timeout_secs: u64,

    #[serde(default = "default_git_timeout_secs")]
    pub git_timeout_secs: u64,

    /// Concurrent snapshot fetches; unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,

    /// Extra or replacement entries for the repository fallback table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fallback_repositories: BTreeMap<String, String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            work_dir: default_work_dir(),
            registry_timeout_secs: default_registry_timeout_secs(),
            git_timeout_secs: default_git_timeout_secs(),
            max_parallel: None,
            fallback_repositories: BTreeMap::new(),
        }
    }
}

/// Values given on the command line; `None` leaves the file's value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub registry: Option<String>,
    pub work_dir: Option<String>,
    pub max_parallel: Option<usize>,
}

impl ResolverConfig {
    /// Loads the configuration following the lookup order above.
    ///
    /// # Errors
    ///
    /// [`CortexError::ConfigError`] when an explicitly named file is missing,
    /// unreadable, not valid TOML or fails validation.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_required(path).await;
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Self::load_required(Path::new(&path)).await;
        }

        match Self::default_path() {
            Ok(path) if path.exists() => Self::load_from(&path).await,
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    async fn load_required(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CortexError::ConfigError {
                message: format!("config file {} does not exist", path.display()),
            }
            .into());
        }
        Self::load_from(path).await
    }

    /// Reads and validates a config file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        debug!("Loading config from {}", path.display());
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let config: Self = toml::from_str(&content).map_err(|e| CortexError::ConfigError {
            message: format!("{}: {}", path.display(), e.message()),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `~/.cortex-fetch/config.toml`, or the Windows equivalent.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine local data directory"))?
                .join("cortex-fetch")
        } else {
            dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("Unable to determine home directory"))?
                .join(".cortex-fetch")
        };
        Ok(config_dir.join("config.toml"))
    }

    /// Checks values that would only fail later, mid-resolution.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| -> Result<()> {
            Err(CortexError::ConfigError {
                message,
            }
            .into())
        };

        if !(self.registry.starts_with("http://") || self.registry.starts_with("https://")) {
            return invalid(format!("registry must be an http(s) URL, got '{}'", self.registry));
        }
        if self.work_dir.trim().is_empty() {
            return invalid("work_dir must not be empty".to_string());
        }
        if self.registry_timeout_secs == 0 || self.git_timeout_secs == 0 {
            return invalid("timeouts must be at least one second".to_string());
        }
        if self.max_parallel == Some(0) {
            return invalid("max_parallel must be at least 1".to_string());
        }
        if let Some((name, _)) = self.fallback_repositories.iter().find(|(_, url)| url.trim().is_empty()) {
            return invalid(format!("fallback repository for '{name}' is empty"));
        }
        Ok(())
    }

    /// Applies command line values and re-validates.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<()> {
        if let Some(registry) = overrides.registry {
            self.registry = registry;
        }
        if let Some(work_dir) = overrides.work_dir {
            self.work_dir = work_dir;
        }
        if overrides.max_parallel.is_some() {
            self.max_parallel = overrides.max_parallel;
        }
        self.validate()
    }

    #[must_use]
    pub const fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }

    #[must_use]
    pub const fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }

    /// The working directory as an absolute path (`~` and `$VAR` expanded).
    pub fn resolve_work_dir(&self, project_dir: &Path) -> Result<PathBuf> {
        resolve_path(&self.work_dir, project_dir)
    }
}
