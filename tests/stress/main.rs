//! Stress test suite for cortex-fetch
//!
//! Large and adversarial dependency graphs driven through the resolver with
//! the in-memory registry and fetcher. These tests hunt for lost completion
//! events, duplicate fetches and deadlocks under heavy task interleaving.
//! They are slower than the integration suite and are not run in CI.
//!
//! # Running Stress Tests
//!
//! ```bash
//! cargo test --test stress
//! cargo test --test stress -- --nocapture   # show timings
//! ```
//!
//! Timings are printed rather than asserted; a hang shows up as a test
//! timeout.
//!
//! # Test Organization
//!
//! - **fan_out**: hundreds of siblings sharing dependencies
//! - **depth**: long chains and cycles

mod depth;

use std::collections::BTreeMap;
use std::path::Path;

use cortex_fetch::resolver::{ResolverOptions, TreeResolver};
use cortex_fetch::source::RepositoryLocator;
use cortex_fetch::test_utils::{MockFetcher, MockRegistry, PackageBuilder};

pub fn roots<S: AsRef<str>>(names: &[S]) -> BTreeMap<String, String> {
    names.iter().map(|n| (n.as_ref().to_string(), "*".to_string())).collect()
}

pub fn registry_for<S: AsRef<str>>(names: &[S]) -> MockRegistry {
    names.iter().fold(MockRegistry::new(), |registry, name| {
        let name = name.as_ref();
        registry.with_package(
            PackageBuilder::new(name)
                .repository(&format!("https://example.com/{name}.git"))
                .version("1.0.0", &format!("{name}-head"))
                .build(),
        )
    })
}

pub fn resolver(
    registry: MockRegistry,
    fetcher: MockFetcher,
    work: &Path,
    max_parallel: Option<usize>,
) -> TreeResolver<MockRegistry, MockFetcher> {
    TreeResolver::new(
        registry,
        fetcher,
        RepositoryLocator::default(),
        ResolverOptions::new(work).with_max_parallel(max_parallel),
    )
}
