use mdxdb::markdown::Document;
use mdxdb::sync::{EventOutcome, FsEvent, PathState, ReconcileOutcome};
use mdxdb::test_utils::fixtures::DocumentFixture;
use mdxdb::test_utils::{LogCapture, TestProject};
use tracing::Level;

use crate::common::synced_blog;

#[tokio::test]
async fn test_title_edit_merges_into_source() {
    let (project, engine) = synced_blog().await;
    let output = project.path("posts/hello.md");
    let edited = project.read("posts/hello.md").unwrap().replace("# Hello Rust", "# Hello Again");
    project.write("posts/hello.md", &edited).unwrap();

    let outcome = engine.handle_event(&FsEvent::changed(&output)).await.unwrap();
    assert_eq!(outcome, EventOutcome::ExternalEdit(output.clone()));
    assert_eq!(engine.state().state(&output), PathState::ExternalEditPending);

    let ReconcileOutcome::Merged {
        fields,
        confidence,
    } = engine.reconcile(&output).await.unwrap()
    else {
        panic!("expected a merge");
    };
    assert_eq!(fields, vec!["title".to_string()]);
    assert!((confidence - 1.0).abs() < f64::EPSILON);

    let source = Document::read(&project.path("posts/hello.mdx")).unwrap();
    assert_eq!(source.frontmatter["title"], "Hello Again");
    assert_eq!(source.frontmatter["topic"], "rust");
    assert_eq!(source.frontmatter["date"], "2024-01-10");
    assert_eq!(source.body, "Body of Hello Rust.\n");

    // The merge propagated to dependents and left the edit in place
    assert!(project.read("topics/rust.md").unwrap().contains("[Hello Again](../posts/hello.md)"));
    assert_eq!(project.read("posts/hello.md").unwrap(), edited);
    assert_eq!(engine.state().state(&output), PathState::Clean);
}

#[tokio::test]
async fn test_merge_write_back_is_not_reprocessed() {
    let (project, engine) = synced_blog().await;
    let output = project.path("posts/hello.md");
    let edited = project.read("posts/hello.md").unwrap().replace("# Hello Rust", "# Hello Again");
    project.write("posts/hello.md", &edited).unwrap();
    engine.handle_event(&FsEvent::changed(&output)).await.unwrap();
    engine.reconcile(&output).await.unwrap();

    // Events for the rewritten source and the output are echoes
    let source = project.path("posts/hello.mdx");
    assert_eq!(engine.handle_event(&FsEvent::changed(&source)).await.unwrap(), EventOutcome::Ignored);
    assert_eq!(engine.handle_event(&FsEvent::changed(&output)).await.unwrap(), EventOutcome::SelfEcho);
}

#[tokio::test]
async fn test_content_edit_replaces_body() {
    let (project, engine) = synced_blog().await;
    let output = project.path("posts/hello.md");
    let edited = project.read("posts/hello.md").unwrap().replace("Body of Hello Rust.", "A rewritten body.");
    project.write("posts/hello.md", &edited).unwrap();

    engine.handle_event(&FsEvent::changed(&output)).await.unwrap();
    let outcome = engine.reconcile(&output).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Merged { ref fields, .. } if fields == &["content".to_string()]));

    let source = Document::read(&project.path("posts/hello.mdx")).unwrap();
    assert_eq!(source.body, "A rewritten body.\n");
    assert_eq!(source.frontmatter["title"], "Hello Rust");
}

#[tokio::test]
async fn test_low_confidence_leaves_source_untouched() {
    let (project, engine) = synced_blog().await;
    let before = project.read("posts/hello.mdx").unwrap();
    let output = project.path("posts/hello.md");
    project.write("posts/hello.md", "completely rewritten by hand").unwrap();

    engine.handle_event(&FsEvent::changed(&output)).await.unwrap();
    let outcome = engine.reconcile(&output).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::LowConfidence { confidence } if confidence < 0.5));
    assert_eq!(project.read("posts/hello.mdx").unwrap(), before);
    assert_eq!(engine.state().state(&output), PathState::Clean);

    // The same unmatched edit is not reconciled again
    assert_eq!(engine.handle_event(&FsEvent::changed(&output)).await.unwrap(), EventOutcome::Ignored);
}

#[tokio::test]
async fn test_edit_matching_current_data_changes_nothing() {
    let (project, engine) = synced_blog().await;
    let output = project.path("posts/hello.md");
    let before = project.read("posts/hello.mdx").unwrap();
    // Only whitespace around a value changes
    let edited = project.read("posts/hello.md").unwrap().replace("# Hello Rust", "#   Hello Rust  ");
    project.write("posts/hello.md", &edited).unwrap();

    engine.handle_event(&FsEvent::changed(&output)).await.unwrap();
    assert_eq!(engine.reconcile(&output).await.unwrap(), ReconcileOutcome::NoChanges);
    assert_eq!(project.read("posts/hello.mdx").unwrap(), before);
}

#[tokio::test]
async fn test_reconcile_unknown_path_is_skipped() {
    let (project, engine) = synced_blog().await;
    let stray = project.write("drafts/x.md", "# x").unwrap();
    assert_eq!(engine.reconcile(&stray).await.unwrap(), ReconcileOutcome::Skipped);
}

#[tokio::test]
async fn test_low_confidence_logs_warning() {
    let (project, engine) = synced_blog().await;
    let output = project.path("posts/hello.md");
    project.write("posts/hello.md", "completely rewritten by hand").unwrap();
    engine.handle_event(&FsEvent::changed(&output)).await.unwrap();

    let logs = LogCapture::default();
    let _guard = logs.install(Level::WARN);
    engine.reconcile(&output).await.unwrap();

    let text = logs.contents();
    assert!(text.contains("WARN"), "{text}");
    assert!(text.contains("Edit to posts/hello.md not merged: confidence"), "{text}");
}

#[tokio::test]
async fn test_fan_out_does_not_overwrite_pending_edit() {
    let (project, engine) = synced_blog().await;
    let output = project.path("topics/rust.md");
    let edited = project.read("topics/rust.md").unwrap().replace("# Rust\n", "# Rust Lang\n");
    project.write("topics/rust.md", &edited).unwrap();
    assert_eq!(
        engine.handle_event(&FsEvent::changed(&output)).await.unwrap(),
        EventOutcome::ExternalEdit(output.clone())
    );

    // A new post for the topic arrives before the edit is reconciled
    let traits = project
        .write("posts/traits.mdx", "---\ntitle: Traits\ndate: \"2024-04-01\"\ntopic: rust\n---\nBody.\n")
        .unwrap();
    let outcome = engine.handle_event(&FsEvent::changed(&traits)).await.unwrap();
    assert_eq!(
        outcome,
        EventOutcome::SourceSynced {
            written: vec![project.path("posts/traits.md")],
        }
    );
    assert_eq!(project.read("topics/rust.md").unwrap(), edited);
    assert_eq!(engine.state().state(&output), PathState::ExternalEditPending);

    let outcome = engine.reconcile(&output).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Merged { ref fields, .. } if fields == &["title".to_string()]));
    let source = Document::read(&project.path("topics/rust.mdx")).unwrap();
    assert_eq!(source.frontmatter["title"], "Rust Lang");

    // The held-back render lands with both the edit and the new post
    let rust = project.read("topics/rust.md").unwrap();
    assert!(rust.starts_with("# Rust Lang\n"), "{rust}");
    assert!(rust.contains("[Traits](../posts/traits.md)"), "{rust}");
}

#[tokio::test]
async fn test_deferred_render_runs_after_unmergeable_edit() {
    let (project, engine) = synced_blog().await;
    let output = project.path("topics/rust.md");
    project.write("topics/rust.md", "scribbles").unwrap();
    engine.handle_event(&FsEvent::changed(&output)).await.unwrap();

    let traits = project
        .write("posts/traits.mdx", "---\ntitle: Traits\ndate: \"2024-04-01\"\ntopic: rust\n---\nBody.\n")
        .unwrap();
    engine.handle_event(&FsEvent::changed(&traits)).await.unwrap();
    assert_eq!(project.read("topics/rust.md").unwrap(), "scribbles");

    let outcome = engine.reconcile(&output).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::LowConfidence { .. }));
    assert!(project.read("topics/rust.md").unwrap().contains("[Traits](../posts/traits.md)"));
    assert_eq!(engine.state().state(&output), PathState::WrittenSelf);
}

#[tokio::test]
async fn test_merge_ignores_synthetic_id() {
    let project = TestProject::new().unwrap();
    DocumentFixture::with_frontmatter(
        "posts/[Post].mdx",
        &[("title", "Untitled")],
        "# {data.title}\n\nSlug: {data.id}\n",
    )
    .write_to(&project)
    .unwrap();
    DocumentFixture::with_frontmatter("posts/hello.mdx", &[("title", "Hello")], "").write_to(&project).unwrap();
    let engine = project.engine().unwrap();
    engine.full_sync().await;
    assert_eq!(project.read("posts/hello.md").unwrap(), "# Hello\n\nSlug: hello\n");

    let output = project.path("posts/hello.md");
    project.write("posts/hello.md", "# Hi\n\nSlug: renamed\n").unwrap();
    engine.handle_event(&FsEvent::changed(&output)).await.unwrap();

    let outcome = engine.reconcile(&output).await.unwrap();
    assert!(matches!(outcome, ReconcileOutcome::Merged { ref fields, .. } if fields == &["title".to_string()]));
    assert_eq!(project.read("posts/hello.mdx").unwrap(), "---\ntitle: Hi\n---\n");
}

#[tokio::test]
async fn test_merge_keeps_source_comments() {
    let (project, engine) = synced_blog().await;
    project
        .write(
            "posts/hello.mdx",
            "---\n# draft notes\ntitle: Hello Rust\ndate: \"2024-01-10\"\ntopic: rust\n---\nBody of Hello Rust.\n",
        )
        .unwrap();
    engine.handle_event(&FsEvent::changed(project.path("posts/hello.mdx"))).await.unwrap();

    let output = project.path("posts/hello.md");
    let edited = project.read("posts/hello.md").unwrap().replace("# Hello Rust", "# Hello Comments");
    project.write("posts/hello.md", &edited).unwrap();
    engine.handle_event(&FsEvent::changed(&output)).await.unwrap();
    engine.reconcile(&output).await.unwrap();

    assert_eq!(
        project.read("posts/hello.mdx").unwrap(),
        "---\n# draft notes\ntitle: Hello Comments\ndate: \"2024-01-10\"\ntopic: rust\n---\nBody of Hello Rust.\n"
    );
}
