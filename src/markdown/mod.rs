//! Structured documents: frontmatter + body, and their discovery on disk.
//!
//! Two kinds of source documents live in a content tree:
//!
//! - **Type definitions**, named `[TypeName].<ext>`: frontmatter holds schema
//!   defaults, the body holds the template.
//! - **Instances**, any other file with the source extension: frontmatter
//!   overrides the schema defaults, the body is free content.
//!
//! ```text
//! content/
//! ├── posts/
//! │   ├── [Post].mdx      # type definition
//! │   ├── hello.mdx       # instance of Post
//! │   └── hello.md        # rendered output (generated)
//! └── topics/
//!     ├── [Topic].mdx
//!     └── rust.mdx
//! ```
//!
//! Keys starting with `$` are reserved directives and never become data.

pub mod frontmatter;

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::core::SyncError;
pub use frontmatter::{
    Fields, FrontmatterBoundaries, FrontmatterParser, patch_frontmatter, render_frontmatter,
};

static TYPE_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([A-Za-z_][A-Za-z0-9_]*)\]$").expect("valid regex"));

/// A parsed source document.
#[derive(Debug, Clone)]
pub struct Document {
    /// Location of the document on disk.
    pub path: PathBuf,
    /// Original bytes as text.
    pub raw: String,
    /// Frontmatter fields, `$` directives included.
    pub frontmatter: Fields,
    /// Body text after the frontmatter block.
    pub body: String,
    boundaries: Option<FrontmatterBoundaries>,
}

impl Document {
    /// Parse a document from its text.
    pub fn parse(path: impl Into<PathBuf>, raw: impl Into<String>) -> Result<Self, SyncError> {
        let path = path.into();
        let raw = raw.into();
        let parsed = FrontmatterParser::new().parse(&raw, &path)?;

        Ok(Self {
            path,
            frontmatter: parsed.fields,
            body: parsed.body,
            boundaries: parsed.boundaries,
            raw,
        })
    }

    /// Read and parse a document from disk.
    pub fn read(path: &Path) -> Result<Self, SyncError> {
        let raw = std::fs::read_to_string(path).map_err(|e| SyncError::io("read", path, &e))?;
        Self::parse(path, raw)
    }

    /// Type name if this document is a `[TypeName].<ext>` definition.
    pub fn type_definition_name(&self) -> Option<String> {
        type_definition_name(&self.path)
    }

    /// File stem, used as the default instance id.
    pub fn stem(&self) -> String {
        self.path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
    }

    /// Frontmatter fields with `$` directives removed.
    pub fn data_fields(&self) -> Fields {
        self.frontmatter
            .iter()
            .filter(|(k, _)| !is_directive(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// String value of a `$` directive.
    pub fn directive_str(&self, name: &str) -> Option<&str> {
        self.frontmatter.get(name).and_then(|v| v.as_str())
    }

    /// Boolean value of a `$` directive.
    pub fn directive_bool(&self, name: &str) -> Option<bool> {
        self.frontmatter.get(name).and_then(|v| v.as_bool())
    }

    /// Re-serialize the document with new frontmatter fields and body.
    ///
    /// When only the frontmatter changes, the original body bytes are kept
    /// exactly; `body` replaces them when given.
    pub fn to_text(&self, frontmatter: &Fields, body: Option<&str>) -> Result<String, SyncError> {
        let yaml = render_frontmatter(frontmatter)?;
        let body = body.unwrap_or(&self.body);
        let parser = FrontmatterParser::new();

        match self.boundaries {
            Some(boundaries) if body == self.body => {
                Ok(parser.replace_frontmatter(&self.raw, &yaml, boundaries))
            }
            _ if frontmatter.is_empty() => Ok(body.to_string()),
            _ => Ok(format!("---\n{}\n---\n{}", yaml.trim(), body)),
        }
    }
}

impl Document {
    /// Apply field `changes` and an optional new body to the document text.
    ///
    /// Only the changed frontmatter entries are rewritten; comments, quoting
    /// and order of the other entries are kept. Falls back to
    /// [`Document::to_text`] when there is no block or a changed key cannot
    /// be located in it.
    pub fn with_changes(&self, changes: &Fields, body: Option<&str>) -> Result<String, SyncError> {
        let patched = match self.boundaries {
            Some(boundaries) => patch_frontmatter(&self.raw, boundaries, &self.frontmatter, changes)?,
            None => None,
        };
        let (Some(block), Some(boundaries)) = (patched, self.boundaries) else {
            let mut frontmatter = self.frontmatter.clone();
            for (key, value) in changes {
                frontmatter.insert(key.clone(), value.clone());
            }
            return self.to_text(&frontmatter, body);
        };

        let head = format!("---\n{}\n---\n", block.trim_end());
        match body {
            Some(body) if body != self.body => Ok(format!("{head}{body}")),
            _ => Ok(format!("{head}{}", &self.raw[boundaries.end..])),
        }
    }
}

/// Whether a frontmatter key is a reserved `$` directive.
pub fn is_directive(key: &str) -> bool {
    key.starts_with('$')
}

/// Type name encoded in a `[TypeName].<ext>` file name.
pub fn type_definition_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    TYPE_FILE_RE.captures(stem).map(|caps| caps[1].to_string())
}

/// Whether `path` has the given extension (case-insensitive).
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// List all files under `root` with `extension`, in file-name order.
///
/// The walk is sorted so that duplicate type names resolve identically on
/// every platform. Paths rejected by `keep` are skipped.
pub fn list_documents(root: &Path, extension: &str, keep: impl Fn(&Path) -> bool) -> Vec<PathBuf> {
    let mut files = Vec::new();

    if !root.exists() {
        return files;
    }

    for entry in walkdir::WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(std::result::Result::ok)
    {
        let path = entry.path();
        if path.is_file() && has_extension(path, extension) && keep(path) {
            files.push(path.to_path_buf());
        }
    }

    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_type_definition_name() {
        assert_eq!(type_definition_name(Path::new("a/[Post].mdx")), Some("Post".to_string()));
        assert_eq!(type_definition_name(Path::new("[Blog_Post2].mdx")), Some("Blog_Post2".into()));
        assert_eq!(type_definition_name(Path::new("post.mdx")), None);
        assert_eq!(type_definition_name(Path::new("[1Bad].mdx")), None);
        assert_eq!(type_definition_name(Path::new("[Post]x.mdx")), None);
    }

    #[test]
    fn test_data_fields_exclude_directives() {
        let doc = Document::parse("a.mdx", "---\n$type: Post\ntitle: Hi\n$id: x\n---\n").unwrap();
        let data = doc.data_fields();
        assert_eq!(data.len(), 1);
        assert_eq!(data["title"], "Hi");
        assert_eq!(doc.directive_str("$type"), Some("Post"));
    }

    #[test]
    fn test_to_text_preserves_body() {
        let doc = Document::parse("a.mdx", "---\ntitle: Old\nn: 1\n---\n\nBody\n").unwrap();
        let mut fields = doc.frontmatter.clone();
        fields.insert("title".into(), "New".into());
        let text = doc.to_text(&fields, None).unwrap();
        assert_eq!(text, "---\ntitle: New\nn: 1\n---\n\nBody\n");
    }

    #[test]
    fn test_to_text_adds_frontmatter_when_missing() {
        let doc = Document::parse("a.mdx", "Body\n").unwrap();
        let mut fields = Fields::new();
        fields.insert("title".into(), "T".into());
        assert_eq!(doc.to_text(&fields, None).unwrap(), "---\ntitle: T\n---\nBody\n");
    }

    #[test]
    fn test_to_text_replaces_body() {
        let doc = Document::parse("a.mdx", "---\ntitle: T\n---\nOld\n").unwrap();
        let text = doc.to_text(&doc.frontmatter, Some("New\n")).unwrap();
        assert_eq!(text, "---\ntitle: T\n---\nNew\n");
    }

    #[test]
    fn test_with_changes_keeps_comments_and_quoting() {
        let doc = Document::parse(
            "a.mdx",
            "---\ntitle: Old # working title\n# publish later\ndate: \"2024-01-10\"\n---\n\nBody\n",
        )
        .unwrap();
        let mut changes = Fields::new();
        changes.insert("title".into(), "New".into());

        assert_eq!(
            doc.with_changes(&changes, None).unwrap(),
            "---\ntitle: New\n# publish later\ndate: \"2024-01-10\"\n---\n\nBody\n"
        );
        assert_eq!(
            doc.with_changes(&changes, Some("Other\n")).unwrap(),
            "---\ntitle: New\n# publish later\ndate: \"2024-01-10\"\n---\nOther\n"
        );
    }

    #[test]
    fn test_with_changes_without_frontmatter() {
        let doc = Document::parse("a.mdx", "Body\n").unwrap();
        let mut changes = Fields::new();
        changes.insert("title".into(), "T".into());
        assert_eq!(doc.with_changes(&changes, None).unwrap(), "---\ntitle: T\n---\nBody\n");
    }

    #[test]
    fn test_list_documents_sorted_and_filtered() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("b")).unwrap();
        std::fs::write(root.join("b/z.mdx"), "").unwrap();
        std::fs::write(root.join("a.mdx"), "").unwrap();
        std::fs::write(root.join("a.md"), "").unwrap();
        std::fs::write(root.join("skip.mdx"), "").unwrap();

        let files = list_documents(root, "mdx", |p| !p.ends_with("skip.mdx"));
        let names: Vec<_> =
            files.iter().map(|p| p.strip_prefix(root).unwrap().to_path_buf()).collect();
        assert_eq!(names, vec![PathBuf::from("a.mdx"), PathBuf::from("b/z.mdx")]);
    }
}
