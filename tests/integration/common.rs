//! Shared helpers for the integration suite.

// Not every helper is used by every suite
#![allow(dead_code)]

use mdxdb::store::MemoryStore;
use mdxdb::sync::SyncEngine;
use mdxdb::test_utils::{TestProject, fixtures};

/// A synced blog project and its engine.
pub async fn synced_blog() -> (TestProject, SyncEngine<MemoryStore>) {
    let project = TestProject::new().unwrap();
    fixtures::blog(&project).unwrap();
    let engine = project.engine().unwrap();
    let report = engine.full_sync().await;
    assert!(report.is_clean(), "blog fixture failed to sync: {:?}", report.failures);
    (project, engine)
}

/// Rendered Rust topic after the initial sync.
pub const RUST_TOPIC: &str = "# Rust

| title | date |
| --- | --- |
| [Ownership](../posts/ownership.md) | 2024-03-02 |
| [Hello Rust](../posts/hello.md) | 2024-01-10 |
";

/// Rendered Go topic after the initial sync.
pub const GO_TOPIC: &str = "# Go

| Property | Value |
| --- | --- |
| title | Goroutines |
| date | 2024-02-14 |
";
