//! Global constants used throughout the cortex-fetch codebase.
//!
//! File names, default locations and timeout durations that are shared by
//! several modules live here so the magic values stay discoverable.

use std::time::Duration;

/// Primary manifest file read from the project and from every snapshot.
pub const CORTEX_JSON: &str = "cortex.json";

/// Secondary manifest file; dependencies live under its `cortex` section.
pub const PACKAGE_JSON: &str = "package.json";

/// Working directory (relative to the project) holding one snapshot per package.
pub const DEFAULT_WORK_DIR: &str = "browserify-cortex";

/// Hand-off document written into the working directory after resolution.
pub const RESOLUTION_FILE: &str = "resolution.json";

/// Registry queried when neither the config file nor the CLI name one.
pub const DEFAULT_REGISTRY: &str = "http://registry.cortexjs.dp/";

/// Entry point assumed for packages whose metadata carries no `main`.
pub const DEFAULT_ENTRY: &str = "index.js";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "CORTEX_FETCH_CONFIG";

/// Environment variable that hides progress output when set.
pub const NO_PROGRESS_ENV: &str = "CORTEX_FETCH_NO_PROGRESS";

/// Timeout for a single registry request (30 seconds).
pub const REGISTRY_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for Git clone and reset operations (120 seconds).
///
/// Clone operations may take a while for repositories with long histories.
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for quick local git queries such as `rev-parse` (30 seconds).
pub const GIT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);
