//! `cortex-fetch install` end to end: mock registry, local git upstreams.

use mockito::{Mock, Server, ServerGuard};
use predicates::prelude::*;

use cortex_fetch::constants::RESOLUTION_FILE;
use cortex_fetch::handoff::BuildPlan;

use crate::common::{FileAssert, TestProject, UpstreamRepo, registry_document, registry_path};

fn publish(server: &mut ServerGuard, name: &str, version: &str, repo: &UpstreamRepo) -> Mock {
    server
        .mock("GET", registry_path(name).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(registry_document(name, version, &repo.url, Some(&repo.commit)))
}

fn read_plan(project: &TestProject) -> BuildPlan {
    let content = std::fs::read_to_string(project.work_path().join(RESOLUTION_FILE)).unwrap();
    serde_json::from_str(&content).unwrap()
}

#[test]
fn test_install_resolves_transitive_tree_and_writes_plan() {
    let project = TestProject::new().unwrap();
    let a = project.create_upstream("a", &[("b", "^1.0.0")]).unwrap();
    let b = project.create_upstream("b", &[]).unwrap();

    let mut server = Server::new();
    let mock_a = publish(&mut server, "a", "1.4.0", &a).expect(1).create();
    let mock_b = publish(&mut server, "b", "1.0.1", &b).expect(1).create();

    project.write_manifest(&[("a", "~1.4.0")]).unwrap();
    project
        .cortex_fetch()
        .args(["install", "--registry", &server.url()])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 resolved, 0 failed"))
        .stdout(predicate::str::contains(RESOLUTION_FILE));

    mock_a.assert();
    mock_b.assert();

    let plan = read_plan(&project);
    assert_eq!(plan.modules.len(), 2);
    assert!(plan.failed.is_empty());
    let planned_b = plan.module("b").unwrap();
    assert_eq!(planned_b.version, "1.0.1");
    assert_eq!(planned_b.commit.as_deref(), Some(b.commit.as_str()));
    assert_eq!(planned_b.requested_by.as_deref(), Some("a"));
    assert_eq!(plan.project_entry, project.project_path().join("index.js"));

    FileAssert::exists(project.work_path().join("a").join("index.js"));
    FileAssert::exists(project.work_path().join("b").join("index.js"));
}

#[test]
fn test_registry_failure_is_reported_but_not_fatal() {
    let project = TestProject::new().unwrap();
    let a = project.create_upstream("a", &[]).unwrap();

    let mut server = Server::new();
    let _a = publish(&mut server, "a", "1.0.0", &a).create();
    let _broken = server.mock("GET", "/broken").with_status(500).create();

    project.write_manifest(&[("a", "*"), ("broken", "^2.0.0")]).unwrap();
    project
        .cortex_fetch()
        .args(["install", "--registry", &server.url()])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 resolved, 1 failed"))
        .stdout(predicate::str::contains("HTTP 500"));

    let plan = read_plan(&project);
    assert_eq!(plan.failed.len(), 1);
    assert_eq!(plan.failed[0].name, "broken");
    assert_eq!(plan.failed[0].version_range, "^2.0.0");
}

#[test]
fn test_strict_fails_when_any_package_failed() {
    let project = TestProject::new().unwrap();

    let mut server = Server::new();
    let _missing = server.mock("GET", "/missing").with_status(404).create();

    project.write_manifest(&[("missing", "*")]).unwrap();
    project
        .cortex_fetch()
        .args(["install", "--strict", "--registry", &server.url()])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("1 package(s) failed to resolve"))
        .stderr(predicate::str::contains("tree --failed"));

    // The plan is still written for inspection
    FileAssert::exists(project.work_path().join(RESOLUTION_FILE));
}

#[test]
fn test_package_json_root_manifest() {
    let project = TestProject::new().unwrap();
    let a = project.create_upstream("a", &[]).unwrap();

    let mut server = Server::new();
    let _a = publish(&mut server, "a", "0.1.0", &a).create();

    project
        .write_file(
            "package.json",
            r#"{ "name": "app", "main": "lib/app.js", "cortex": { "dependencies": { "a": "0.1.x" } } }"#,
        )
        .unwrap();
    project.cortex_fetch().args(["install", "--registry", &server.url()]).assert().success();

    let plan = read_plan(&project);
    assert_eq!(plan.modules.len(), 1);
    assert_eq!(plan.project_entry, project.project_path().join("lib").join("app.js"));
}

#[test]
fn test_install_clears_previous_snapshots() {
    let project = TestProject::new().unwrap();
    project.write_file("browserify-cortex/stale/old.js", "// stale").unwrap();
    project.write_manifest(&[]).unwrap();

    let server = Server::new();
    project
        .cortex_fetch()
        .args(["install", "--registry", &server.url()])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 resolved, 0 failed"));

    FileAssert::not_exists(project.work_path().join("stale"));
    FileAssert::exists(project.work_path().join(RESOLUTION_FILE));
}

#[test]
fn test_registry_from_config_file() {
    let project = TestProject::new().unwrap();
    let a = project.create_upstream("a", &[]).unwrap();

    let mut server = Server::new();
    let mock = publish(&mut server, "a", "3.0.0", &a).expect(1).create();

    project
        .write_file("cortex-fetch.toml", &format!("registry = \"{}\"\nwork_dir = \"deps\"\n", server.url()))
        .unwrap();
    project.write_manifest(&[("a", ">=3")]).unwrap();
    project.cortex_fetch().args(["install", "--config", "cortex-fetch.toml"]).assert().success();

    mock.assert();
    FileAssert::exists(project.project_path().join("deps").join("a").join("index.js"));
}

#[test]
fn test_missing_manifest_fails() {
    let project = TestProject::new().unwrap();

    project
        .cortex_fetch()
        .arg("install")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No cortex.json or package.json found"));
}

#[test]
fn test_work_dir_enclosing_project_is_refused() {
    let project = TestProject::new().unwrap();
    project.write_manifest(&[]).unwrap();

    project
        .cortex_fetch()
        .args(["install", "--work-dir", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Refusing to use working directory"));

    FileAssert::exists(project.project_path().join("cortex.json"));
}
