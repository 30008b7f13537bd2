//! Canned content trees.
//!
//! [`blog`] writes a two-type tree: topics render a table of their posts,
//! posts render their own title and body.
//!
//! ```text
//! topics/[Topic].mdx   topics/rust.mdx   topics/go.mdx
//! posts/[Post].mdx     posts/hello.mdx   posts/ownership.mdx   posts/goroutines.mdx
//! ```

use anyhow::Result;
use std::path::PathBuf;

use super::TestProject;

/// A document at a path relative to the project root.
#[derive(Clone, Debug)]
pub struct DocumentFixture {
    pub path: String,
    pub content: String,
}

impl DocumentFixture {
    /// A document with raw content.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// A document with YAML frontmatter lines and a body.
    pub fn with_frontmatter(path: impl Into<String>, frontmatter: &[(&str, &str)], body: &str) -> Self {
        let mut content = String::from("---\n");
        for (key, value) in frontmatter {
            content.push_str(&format!("{key}: {value}\n"));
        }
        content.push_str("---\n");
        content.push_str(body);
        Self::new(path, content)
    }

    /// `topics/[Topic].mdx`: a heading and a table of the topic's posts.
    pub fn topic_type() -> Self {
        Self::with_frontmatter(
            "topics/[Topic].mdx",
            &[("title", "Untitled")],
            "# {data.title}\n\n<Posts orderBy=\"date desc\" fields=\"title,date\" />\n",
        )
    }

    /// `posts/[Post].mdx`: a heading and the post body.
    pub fn post_type() -> Self {
        Self::with_frontmatter(
            "posts/[Post].mdx",
            &[("title", "Untitled"), ("date", "\"\""), ("topic", "\"\"")],
            "# {data.title}\n\n{content}\n",
        )
    }

    /// A topic instance.
    pub fn topic(id: &str, title: &str) -> Self {
        Self::with_frontmatter(format!("topics/{id}.mdx"), &[("title", title)], "")
    }

    /// A post instance.
    pub fn post(id: &str, title: &str, topic: &str, date: &str) -> Self {
        Self::with_frontmatter(
            format!("posts/{id}.mdx"),
            &[("title", title), ("date", &format!("\"{date}\"")), ("topic", topic)],
            &format!("Body of {title}.\n"),
        )
    }

    /// Write into `project`.
    pub fn write_to(&self, project: &TestProject) -> Result<PathBuf> {
        project.write(&self.path, &self.content)
    }
}

/// Write the blog tree into `project`.
pub fn blog(project: &TestProject) -> Result<()> {
    for doc in [
        DocumentFixture::topic_type(),
        DocumentFixture::post_type(),
        DocumentFixture::topic("rust", "Rust"),
        DocumentFixture::topic("go", "Go"),
        DocumentFixture::post("hello", "Hello Rust", "rust", "2024-01-10"),
        DocumentFixture::post("ownership", "Ownership", "rust", "2024-03-02"),
        DocumentFixture::post("goroutines", "Goroutines", "go", "2024-02-14"),
    ] {
        doc.write_to(project)?;
    }
    Ok(())
}
