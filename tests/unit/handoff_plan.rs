//! From a resolved tree to the document the bundler consumes.

use std::collections::BTreeMap;

use anyhow::Result;
use tempfile::TempDir;

use cortex_fetch::core::CortexError;
use cortex_fetch::handoff::{BuildPlan, Builder, HandoffWriter, load_resolution};
use cortex_fetch::resolver::{ResolverOptions, TreeResolver};
use cortex_fetch::source::RepositoryLocator;
use cortex_fetch::test_utils::{MockFetcher, MockRegistry, PackageBuilder};

async fn resolved_plan(work: &std::path::Path, project: &std::path::Path) -> Result<BuildPlan> {
    let registry = MockRegistry::new()
        .with_package(PackageBuilder::new("ui").repository("https://example.com/ui.git").version("2.0.0", "u1").build())
        .with_package(
            PackageBuilder::new("icons").repository("https://example.com/icons.git").version("1.1.0", "i1").build(),
        );
    let fetcher = MockFetcher::new()
        .with_raw_manifest("ui", r#"{"main": "./src/ui.js", "dependencies": {"icons": "^1.0.0", "absent": "*"}}"#)
        .with_missing_commit("icons");

    let resolver = TreeResolver::new(registry, fetcher, RepositoryLocator::default(), ResolverOptions::new(work));
    let roots = BTreeMap::from([("ui".to_string(), "2.x".to_string())]);
    let tree = resolver.resolve(&roots).await?;

    Ok(BuildPlan::from_tree(&tree, project, Some("./main.js"), work))
}

#[tokio::test]
async fn test_plan_describes_modules_and_failures() -> Result<()> {
    let temp = TempDir::new()?;
    let work = temp.path().join("project").join("browserify-cortex");
    let plan = resolved_plan(&work, &temp.path().join("project")).await?;

    assert_eq!(plan.project_entry, temp.path().join("project").join("main.js"));

    let ui = plan.module("ui").unwrap();
    assert_eq!(ui.commit.as_deref(), Some("u1"));
    assert_eq!(ui.entry, work.join("ui").join("src/ui.js"));
    assert!(!ui.approximate);

    let icons = plan.module("icons").unwrap();
    assert!(icons.approximate);
    assert!(icons.commit.is_none(), "an approximate snapshot has no pinned commit");
    assert_eq!(icons.entry, work.join("icons").join("index.js"));
    assert_eq!(icons.requested_by.as_deref(), Some("ui"));

    assert_eq!(plan.failed.len(), 1);
    assert_eq!(plan.failed[0].name, "absent");
    assert_eq!(plan.failed[0].requested_by.as_deref(), Some("ui"));
    assert_eq!(plan.diagnostics().count(), 2);
    Ok(())
}

#[tokio::test]
async fn test_written_plan_is_loaded_back() -> Result<()> {
    let temp = TempDir::new()?;
    let work = temp.path().join("work");
    let plan = resolved_plan(&work, temp.path()).await?;

    let writer = HandoffWriter::new(&work);
    writer.build(&plan)?;
    assert!(writer.path().ends_with("resolution.json"));

    assert_eq!(load_resolution(&work).await?, plan);
    Ok(())
}

#[tokio::test]
async fn test_loading_without_a_previous_run() {
    let temp = TempDir::new().unwrap();
    let err = load_resolution(temp.path()).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<CortexError>(), Some(CortexError::ResolutionNotFound { .. })));
}
