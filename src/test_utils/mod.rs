//! Test utilities for cortex-fetch
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration test targets.
//!
//! - [`MockRegistry`] and [`MockFetcher`] drive the resolver without network
//!   or git access
//! - [`PackageBuilder`] builds registry documents
//! - [`TestGit`] creates real upstream repositories to clone from
//!
//! # Example
//!
//! ```rust,no_run
//! use cortex_fetch::test_utils::{MockFetcher, MockRegistry, PackageBuilder};
//!
//! let registry = MockRegistry::new()
//!     .with_package(PackageBuilder::new("a").repository("https://example.com/a.git").version("1.0.0", "aaa").build());
//! let fetcher = MockFetcher::new().with_dependencies("a", &[("b", "*")]);
//! ```

pub mod fakes;
pub mod git_helper;

pub use fakes::{MockFetcher, MockRegistry, PackageBuilder};
pub use git_helper::TestGit;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, logging stays
/// off.
///
/// ```bash
/// RUST_LOG=cortex_fetch=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
