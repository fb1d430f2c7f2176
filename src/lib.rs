//! cortex-fetch - dependency resolution and snapshot fetching for cortex
//! projects.
//!
//! A cortex project lists its dependencies as name to version range pairs in
//! `cortex.json` (or `package.json`). cortex-fetch turns that list into a
//! complete, concrete dependency tree:
//!
//! - every package's published versions are looked up in the registry and the
//!   highest version satisfying the range is chosen
//! - the git repository the version was published from is located and cloned
//!   into the working directory, then reset to the exact commit recorded at
//!   publish time
//! - the snapshot's own manifest is read and its dependencies are resolved the
//!   same way, concurrently, until the tree is closed
//!
//! The result is written as a build plan (`resolution.json`) for the bundler.
//!
//! # Architecture Overview
//!
//! ```text
//!   cortex.json ──► manifest ──► resolver ──► handoff ──► resolution.json
//!                                 │  ▲
//!                 registry ◄──────┤  │ manifest (per snapshot)
//!                 source   ◄──────┤  │
//!                 snapshot ◄──────┘──┘
//!                   │
//!                   └── git (system git binary)
//! ```
//!
//! Failures are per package: a registry error, a missing repository or a
//! failed clone marks that node as failed with a diagnostic, and the rest of
//! the tree continues to resolve. A published commit that no longer exists is
//! a soft failure; the snapshot stays at the default branch and its
//! dependencies are still followed.
//!
//! # Core Modules
//!
//! - [`cli`] - `install` and `tree` commands
//! - [`config`] - `~/.cortex-fetch/config.toml` and command line overrides
//! - [`core`] - error types and user-facing error formatting
//! - [`resolver`] - the concurrent tree walk and completion detection
//!
//! ## Data Sources
//! - [`registry`] - registry HTTP client and package metadata
//! - [`source`] - repository URL lookup and normalization
//! - [`snapshot`] - clone and checkout of one package version
//! - [`git`] - wrapper around the system `git` command
//! - [`manifest`] - `cortex.json` / `package.json` reading
//!
//! ## Supporting Modules
//! - [`handoff`] - build plan produced for the bundler
//! - [`version`] - version range parsing and selection
//! - [`utils`] - paths and progress indicators
//! - [`constants`] - file names, defaults and timeouts
//!
//! # Example
//!
//! ```rust,no_run
//! use cortex_fetch::registry::RegistryClient;
//! use cortex_fetch::resolver::{ResolverOptions, TreeResolver};
//! use cortex_fetch::snapshot::GitSnapshotFetcher;
//! use cortex_fetch::source::RepositoryLocator;
//! use std::collections::BTreeMap;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let registry = RegistryClient::new("http://registry.cortexjs.dp/", Duration::from_secs(30))?;
//! let resolver = TreeResolver::new(
//!     registry,
//!     GitSnapshotFetcher::default(),
//!     RepositoryLocator::default(),
//!     ResolverOptions::new("browserify-cortex"),
//! );
//!
//! let roots = BTreeMap::from([("jquery".to_string(), "~1.9.0".to_string())]);
//! let tree = resolver.resolve(&roots).await?;
//! for node in tree.done() {
//!     println!("{} {}", node.name, node.resolved_version.as_deref().unwrap_or("?"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod resolver;

// Data sources
pub mod git;
pub mod manifest;
pub mod registry;
pub mod snapshot;
pub mod source;

// Supporting modules
pub mod constants;
pub mod handoff;
pub mod utils;
pub mod version;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
