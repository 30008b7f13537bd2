use mdxdb::sync::{EventOutcome, FsEvent, PathState};

use crate::common::{GO_TOPIC, RUST_TOPIC, synced_blog};

#[tokio::test]
async fn test_post_edit_rerenders_only_its_topic() {
    let (project, engine) = synced_blog().await;
    let path = project
        .write("posts/hello.mdx", "---\ntitle: Hello Again\ndate: \"2024-01-10\"\ntopic: rust\n---\nBody of Hello Rust.\n")
        .unwrap();

    let outcome = engine.handle_event(&FsEvent::changed(&path)).await.unwrap();
    assert_eq!(
        outcome,
        EventOutcome::SourceSynced {
            written: vec![project.path("posts/hello.md"), project.path("topics/rust.md")],
        }
    );
    assert!(project.read("topics/rust.md").unwrap().contains("| [Hello Again](../posts/hello.md) | 2024-01-10 |"));
    // Go's output has the same bytes, so it is not rewritten
    assert_eq!(project.read("topics/go.md").unwrap(), GO_TOPIC);
}

#[tokio::test]
async fn test_moving_post_between_topics_updates_both() {
    let (project, engine) = synced_blog().await;
    let path = project
        .write("posts/ownership.mdx", "---\ntitle: Ownership\ndate: \"2024-03-02\"\ntopic: go\n---\nBody of Ownership.\n")
        .unwrap();

    let EventOutcome::SourceSynced {
        written,
    } = engine.handle_event(&FsEvent::changed(&path)).await.unwrap()
    else {
        panic!("expected SourceSynced");
    };
    assert!(written.contains(&project.path("topics/rust.md")));
    assert!(written.contains(&project.path("topics/go.md")));
    assert!(!written.contains(&project.path("posts/ownership.md")));

    assert!(!project.read("topics/rust.md").unwrap().contains("Ownership"));
    assert!(project.read("topics/go.md").unwrap().contains("[Ownership](../posts/ownership.md)"));
}

#[tokio::test]
async fn test_own_writes_are_self_echoes() {
    let (project, engine) = synced_blog().await;
    let rust = project.path("topics/rust.md");

    assert_eq!(engine.state().state(&rust), PathState::WrittenSelf);
    assert_eq!(engine.handle_event(&FsEvent::changed(&rust)).await.unwrap(), EventOutcome::SelfEcho);
    assert_eq!(engine.state().state(&rust), PathState::Clean);
    // A late duplicate event carries the same bytes
    assert_eq!(engine.handle_event(&FsEvent::changed(&rust)).await.unwrap(), EventOutcome::SelfEcho);
    assert_eq!(project.read("topics/rust.md").unwrap(), RUST_TOPIC);
}

#[tokio::test]
async fn test_unchanged_source_is_ignored() {
    let (project, engine) = synced_blog().await;
    let path = project.path("posts/hello.mdx");

    assert_eq!(engine.handle_event(&FsEvent::changed(&path)).await.unwrap(), EventOutcome::Ignored);
}

#[tokio::test]
async fn test_removed_source_soft_deletes_and_fans_out() {
    let (project, engine) = synced_blog().await;
    let path = project.remove("posts/goroutines.mdx").unwrap();

    let outcome = engine.handle_event(&FsEvent::removed(&path)).await.unwrap();
    assert_eq!(
        outcome,
        EventOutcome::SourceRemoved {
            written: vec![project.path("topics/go.md")],
        }
    );
    assert!(!project.exists("posts/goroutines.md"));
    assert_eq!(project.read("topics/go.md").unwrap(), "# Go\n\n*No results.*\n");

    let row = engine.store().get("test", "Post", "goroutines").await.unwrap();
    assert_eq!(row["status"], "deleted");
    assert!(engine.deps().dependencies_of(&project.path("posts/goroutines.md")).is_empty());
}

#[tokio::test]
async fn test_new_source_is_picked_up() {
    let (project, engine) = synced_blog().await;
    let path = project
        .write("posts/traits.mdx", "---\ntitle: Traits\ndate: \"2024-04-01\"\ntopic: rust\n---\nBody.\n")
        .unwrap();

    engine.handle_event(&FsEvent::changed(&path)).await.unwrap();
    assert!(project.exists("posts/traits.md"));
    let rust = project.read("topics/rust.md").unwrap();
    assert!(rust.find("Traits").unwrap() < rust.find("Ownership").unwrap());
}

#[tokio::test]
async fn test_type_definition_change_rerenders_instances() {
    let (project, engine) = synced_blog().await;
    let path = project
        .write("posts/[Post].mdx", "---\ntitle: Untitled\ndate: \"\"\ntopic: \"\"\n---\n## {data.title}\n\n{content}\n")
        .unwrap();

    let EventOutcome::TypesReloaded {
        types,
        written,
    } = engine.handle_event(&FsEvent::changed(&path)).await.unwrap()
    else {
        panic!("expected TypesReloaded");
    };
    assert_eq!(types, vec!["Post".to_string()]);
    assert!(written.contains(&project.path("posts/hello.md")));
    assert!(project.read("posts/goroutines.md").unwrap().starts_with("## Goroutines"));
    // Topic tables show the same rows, so they are untouched
    assert!(!written.contains(&project.path("topics/rust.md")));
}

#[tokio::test]
async fn test_removed_type_definition_retires_instances() {
    let (project, engine) = synced_blog().await;
    let path = project.remove("posts/[Post].mdx").unwrap();

    let outcome = engine.handle_event(&FsEvent::removed(&path)).await.unwrap();
    assert!(matches!(outcome, EventOutcome::TypesReloaded { .. }));
    assert!(engine.registry().lookup("Post").is_none());
    assert!(!project.exists("posts/hello.md"));
    assert_eq!(project.read("topics/rust.md").unwrap(), "# Rust\n\n*Type 'Post' not found.*\n");
}

#[tokio::test]
async fn test_foreign_files_are_ignored() {
    let (project, engine) = synced_blog().await;
    let notes = project.write("notes.txt", "x").unwrap();
    let git = project.write(".git/posts/x.mdx", "---\ntitle: x\n---\n").unwrap();
    let stray = project.write("drafts/readme.md", "# not an output").unwrap();

    for path in [notes, git, stray] {
        assert_eq!(engine.handle_event(&FsEvent::changed(&path)).await.unwrap(), EventOutcome::Ignored);
    }
}
