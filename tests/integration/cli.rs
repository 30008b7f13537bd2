use assert_cmd::Command;
use predicates::prelude::*;

use mdxdb::test_utils::fixtures::{self, DocumentFixture};
use mdxdb::test_utils::TestProject;

use crate::common::RUST_TOPIC;

fn mdxdb(project: &TestProject) -> Command {
    let mut cmd = Command::cargo_bin("mdxdb").unwrap();
    cmd.current_dir(project.root()).env_remove("MDXDB_NAMESPACE").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_sync_command_renders_outputs() {
    let project = TestProject::new().unwrap();
    fixtures::blog(&project).unwrap();

    mdxdb(&project)
        .args(["--namespace", "blog", "sync"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Synced 5 instances of 2 types: 5 written"));

    assert_eq!(project.read("topics/rust.md").unwrap(), RUST_TOPIC);
}

#[test]
fn test_namespace_from_config_file() {
    let project = TestProject::new().unwrap();
    fixtures::blog(&project).unwrap();
    project.write("mdxdb.toml", "namespace = \"blog\"\n").unwrap();

    mdxdb(&project).arg("sync").assert().success().stdout(predicate::str::contains("5 written"));
}

#[test]
fn test_strict_sync_fails_without_namespace() {
    let project = TestProject::new().unwrap();
    fixtures::blog(&project).unwrap();

    mdxdb(&project)
        .args(["sync", "--strict"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("No namespace configured"))
        .stderr(predicate::str::contains("5 document(s) failed to sync"));
}

#[test]
fn test_render_prints_without_writing() {
    let project = TestProject::new().unwrap();
    fixtures::blog(&project).unwrap();

    mdxdb(&project)
        .args(["--namespace", "blog", "render", "topics/rust.mdx"])
        .assert()
        .success()
        .stdout(RUST_TOPIC);

    assert!(!project.exists("topics/rust.md"));
}

#[test]
fn test_render_missing_file_fails() {
    let project = TestProject::new().unwrap();

    mdxdb(&project)
        .args(["render", "nope.mdx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Source document not found"));
}

#[test]
fn test_types_lists_relationships() {
    let project = TestProject::new().unwrap();
    DocumentFixture::with_frontmatter("authors/[Author].mdx", &[("books", "Book.author")], "# {data.name}\n")
        .write_to(&project)
        .unwrap();
    DocumentFixture::new("books/[Book].mdx", "---\ntitle: Untitled\n---\n").write_to(&project).unwrap();

    mdxdb(&project)
        .arg("types")
        .assert()
        .success()
        .stdout(predicate::str::contains("Author"))
        .stdout(predicate::str::contains("books → Book [many] via author"))
        .stdout(predicate::str::contains("data only"));
}

#[test]
fn test_deps_json() {
    let project = TestProject::new().unwrap();
    fixtures::blog(&project).unwrap();

    let output = mdxdb(&project).args(["--namespace", "blog", "deps", "--format", "json"]).output().unwrap();
    assert!(output.status.success());

    let edges: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(edges["Post"], serde_json::json!(["topics/go.md", "topics/rust.md"]));
}
