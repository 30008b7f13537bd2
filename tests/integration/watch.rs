use std::sync::Arc;
use std::time::Duration;

use mdxdb::config::SyncConfig;
use mdxdb::sync::{FsEvent, WatchSession};
use mdxdb::test_utils::{TestProject, fixtures};
use tokio::sync::mpsc::unbounded_channel;

#[tokio::test]
async fn test_session_applies_events_and_reconciles_on_exit() {
    let project = TestProject::new().unwrap();
    fixtures::blog(&project).unwrap();
    let engine = Arc::new(
        project
            .engine_with(SyncConfig {
                namespace: Some("test".into()),
                debounce_ms: 60_000,
                ..SyncConfig::default()
            })
            .unwrap(),
    );
    engine.full_sync().await;

    let (session, _shutdown) = WatchSession::new(Arc::clone(&engine));
    let (tx, rx) = unbounded_channel();

    // Echo of the engine's own write, a source change and an edited output
    tx.send(FsEvent::changed(project.path("topics/go.md"))).unwrap();
    let goroutines = project
        .write("posts/goroutines.mdx", "---\ntitle: Channels\ndate: \"2024-02-14\"\ntopic: go\n---\nBody.\n")
        .unwrap();
    tx.send(FsEvent::changed(&goroutines)).unwrap();
    let edited = project.read("posts/hello.md").unwrap().replace("# Hello Rust", "# Hello Watch");
    project.write("posts/hello.md", &edited).unwrap();
    tx.send(FsEvent::changed(project.path("posts/hello.md"))).unwrap();
    // A burst of events for one edit is reconciled once
    tx.send(FsEvent::changed(project.path("posts/hello.md"))).unwrap();
    drop(tx);

    let stats = session.run_with(rx).await;
    assert_eq!(stats.events, 4);
    assert_eq!(stats.echoes, 1);
    assert_eq!(stats.merged, 1);
    assert_eq!(stats.reconciled, 1);
    assert_eq!(stats.errors, 0);

    assert!(project.read("topics/go.md").unwrap().contains("| title | Channels |"));
    assert!(project.read("posts/hello.mdx").unwrap().contains("title: Hello Watch"));
    assert!(project.read("topics/rust.md").unwrap().contains("[Hello Watch](../posts/hello.md)"));
}

#[tokio::test]
async fn test_debounced_edit_is_reconciled_after_window() {
    let project = TestProject::new().unwrap();
    fixtures::blog(&project).unwrap();
    let engine = Arc::new(
        project
            .engine_with(SyncConfig {
                namespace: Some("test".into()),
                debounce_ms: 20,
                ..SyncConfig::default()
            })
            .unwrap(),
    );
    engine.full_sync().await;

    let (session, shutdown) = WatchSession::new(Arc::clone(&engine));
    let (tx, rx) = unbounded_channel();
    let task = tokio::spawn(session.run_with(rx));

    let edited = project.read("posts/ownership.md").unwrap().replace("# Ownership", "# Borrowing");
    project.write("posts/ownership.md", &edited).unwrap();
    tx.send(FsEvent::changed(project.path("posts/ownership.md"))).unwrap();

    let mut merged = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if project.read("posts/ownership.mdx").unwrap().contains("title: Borrowing") {
            merged = true;
            break;
        }
    }
    shutdown.shutdown();
    let stats = task.await.unwrap();

    assert!(merged, "edit was not merged while the session was running");
    assert_eq!(stats.merged, 1);
}
