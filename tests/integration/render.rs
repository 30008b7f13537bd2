use mdxdb::test_utils::TestProject;
use mdxdb::test_utils::fixtures::DocumentFixture;

use crate::common::{GO_TOPIC, RUST_TOPIC, synced_blog};

#[tokio::test]
async fn test_full_sync_renders_every_instance() {
    let (project, engine) = synced_blog().await;

    assert_eq!(project.read("topics/rust.md").unwrap(), RUST_TOPIC);
    assert_eq!(project.read("topics/go.md").unwrap(), GO_TOPIC);
    assert!(project.read("posts/hello.md").unwrap().starts_with("# Hello Rust\n\nBody of Hello Rust."));

    // Definitions are templates, not instances
    assert!(!project.exists("topics/[Topic].md"));
    assert!(!project.exists("posts/[Post].md"));
    assert_eq!(engine.store().len("test").await, 5);
}

#[tokio::test]
async fn test_second_sync_writes_nothing() {
    let (_project, engine) = synced_blog().await;

    let report = engine.full_sync().await;
    assert_eq!(report.written, 0);
    assert_eq!(report.unchanged, 5);
    assert_eq!(report.instances, 5);
    assert_eq!(report.types, 2);
}

#[tokio::test]
async fn test_full_sync_repairs_deleted_output() {
    let (project, engine) = synced_blog().await;
    project.remove("topics/rust.md").unwrap();

    let report = engine.full_sync().await;
    assert_eq!(report.written, 1);
    assert_eq!(project.read("topics/rust.md").unwrap(), RUST_TOPIC);
}

#[tokio::test]
async fn test_dependency_edges_follow_templates() {
    let (project, engine) = synced_blog().await;

    let dependents = engine.deps().dependents_of("Post");
    assert!(dependents.contains(&project.path("topics/rust.md")));
    assert!(dependents.contains(&project.path("topics/go.md")));
    assert!(engine.deps().dependents_of("Topic").is_empty());
}

#[tokio::test]
async fn test_explicit_relationship_and_list_layout() {
    let project = TestProject::new().unwrap();
    for doc in [
        DocumentFixture::with_frontmatter(
            "authors/[Author].mdx",
            &[("name", "Anonymous"), ("books", "Book.author")],
            "# {data.name}\n\n<Related field=\"books\" format=\"list\" listFormat=\"- {title} ({year})\" orderBy=\"year\" />\n",
        ),
        DocumentFixture::with_frontmatter("books/[Book].mdx", &[("title", "Untitled"), ("year", "0")], ""),
        DocumentFixture::with_frontmatter("authors/le-guin.mdx", &[("name", "Ursula K. Le Guin")], ""),
        DocumentFixture::with_frontmatter(
            "books/dispossessed.mdx",
            &[("title", "The Dispossessed"), ("year", "1974"), ("author", "le-guin")],
            "",
        ),
        DocumentFixture::with_frontmatter(
            "books/earthsea.mdx",
            &[("title", "A Wizard of Earthsea"), ("year", "1968"), ("author", "le-guin")],
            "",
        ),
    ] {
        doc.write_to(&project).unwrap();
    }

    let engine = project.engine().unwrap();
    let report = engine.full_sync().await;
    assert!(report.is_clean(), "{:?}", report.failures);

    assert_eq!(
        project.read("authors/le-guin.md").unwrap(),
        "# Ursula K. Le Guin\n\n- A Wizard of Earthsea (1968)\n- The Dispossessed (1974)\n"
    );
    // Books have an empty template, so no outputs
    assert!(!project.exists("books/earthsea.md"));
}

#[tokio::test]
async fn test_unknown_component_renders_inline_message() {
    let project = TestProject::new().unwrap();
    DocumentFixture::new("notes/[Note].mdx", "# {data.title}\n\n<Persn />\n").write_to(&project).unwrap();
    DocumentFixture::new("people/[Person].mdx", "---\nname: x\n$output: false\n---\n")
        .write_to(&project)
        .unwrap();
    DocumentFixture::with_frontmatter("notes/a.mdx", &[("title", "A")], "").write_to(&project).unwrap();

    let engine = project.engine().unwrap();
    engine.full_sync().await;

    let text = project.read("notes/a.md").unwrap();
    assert!(text.contains("*Type 'Persn' not found. Did you mean 'Person'?*"), "{text}");
}

#[tokio::test]
async fn test_malformed_where_renders_error_marker() {
    let project = TestProject::new().unwrap();
    DocumentFixture::new("notes/[Note].mdx", "<Notes where=\"title = \" />\n").write_to(&project).unwrap();
    DocumentFixture::with_frontmatter("notes/a.mdx", &[("title", "A")], "").write_to(&project).unwrap();

    let engine = project.engine().unwrap();
    let report = engine.full_sync().await;
    assert!(report.is_clean());

    let text = project.read("notes/a.md").unwrap();
    assert!(text.starts_with("> **mdxdb error** (Notes):"), "{text}");
}

#[tokio::test]
async fn test_path_pattern_places_output() {
    let project = TestProject::new().unwrap();
    DocumentFixture::new("src/pages/[Page].mdx", "---\n$path: ../../site/{id}.md\n---\n# {data.title}\n")
        .write_to(&project)
        .unwrap();
    DocumentFixture::with_frontmatter("src/pages/about.mdx", &[("title", "About")], "")
        .write_to(&project)
        .unwrap();

    let engine = project.engine().unwrap();
    engine.full_sync().await;

    assert_eq!(project.read("site/about.md").unwrap(), "# About\n");
    assert_eq!(engine.source_for(&project.path("site/about.md")), Some(project.path("src/pages/about.mdx")));
}

#[tokio::test]
async fn test_preview_does_not_write() {
    let (project, engine) = synced_blog().await;
    project.remove("topics/go.md").unwrap();

    let text = engine.preview(&project.path("topics/go.mdx")).await.unwrap();
    assert_eq!(text, GO_TOPIC);
    assert!(!project.exists("topics/go.md"));
}

#[tokio::test]
async fn test_path_pattern_outside_root_is_rejected() {
    let project = TestProject::new().unwrap();
    DocumentFixture::new("src/pages/[Page].mdx", "---\n$path: ../../../outside/{id}.md\n---\n# {data.title}\n")
        .write_to(&project)
        .unwrap();
    DocumentFixture::with_frontmatter("src/pages/about.mdx", &[("title", "About")], "")
        .write_to(&project)
        .unwrap();

    let engine = project.engine().unwrap();
    let report = engine.full_sync().await;

    assert_eq!(report.written, 0);
    assert_eq!(report.failures.len(), 1, "{:?}", report.failures);
    assert_eq!(report.failures[0].0, project.path("src/pages/about.mdx"));
    assert!(report.failures[0].1.contains("outside the project root"), "{}", report.failures[0].1);
    assert!(!project.root().parent().unwrap().join("outside/about.md").exists());
}

#[tokio::test]
async fn test_implicit_match_requires_whole_tag() {
    let (project, engine) = synced_blog().await;
    project
        .write("posts/django.mdx", "---\ntitle: Django\ndate: \"2024-05-01\"\ntags: django\n---\nBody.\n")
        .unwrap();
    project
        .write("posts/channels.mdx", "---\ntitle: Channels\ndate: \"2024-06-01\"\ntags:\n- go\n- concurrency\n---\nBody.\n")
        .unwrap();
    engine.full_sync().await;

    let go = project.read("topics/go.md").unwrap();
    assert!(!go.contains("Django"), "{go}");
    assert!(go.contains("[Channels](../posts/channels.md)"), "{go}");
    assert!(go.contains("[Goroutines](../posts/goroutines.md)"), "{go}");
}
