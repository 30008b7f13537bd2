//! Frontmatter parsing with a raw gray_matter engine.
//!
//! Frontmatter is extracted verbatim with a custom [`Engine`] that performs no
//! parsing, then deserialized by `serde_yaml` into an insertion-ordered field
//! map. Keeping the raw text separate from the parse lets a malformed block be
//! reported with its path instead of silently disappearing.
//!
//! Write-back uses byte boundaries: only the frontmatter block is replaced,
//! every byte of the body is preserved. [`patch_frontmatter`] narrows that
//! further to the changed top-level entries, so comments and the quoting of
//! untouched fields survive a merge.
//!
//! # Example
//!
//! ```rust
//! use mdxdb::markdown::frontmatter::FrontmatterParser;
//! use std::path::Path;
//!
//! let parser = FrontmatterParser::new();
//! let parsed = parser.parse("---\ntitle: Hello\n---\nBody\n", Path::new("a.mdx")).unwrap();
//! assert_eq!(parsed.fields["title"], "Hello");
//! assert_eq!(parsed.body, "Body\n");
//! ```

use gray_matter::{Matter, Pod, engine::Engine};
use std::fmt::Debug;
use std::ops::Range;
use std::path::Path;

use crate::core::SyncError;

/// Insertion-ordered field map used for frontmatter, instance data and rows.
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// gray_matter engine that returns the frontmatter text without parsing it.
struct RawFrontmatter;

impl Engine for RawFrontmatter {
    fn parse(content: &str) -> Result<Pod, gray_matter::Error> {
        Ok(Pod::String(content.to_string()))
    }
}

/// Byte boundaries of the frontmatter section, delimiters included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontmatterBoundaries {
    /// Byte position of the opening `---`.
    pub start: usize,
    /// Byte position just after the closing `---` line.
    pub end: usize,
}

/// Result of splitting a document into frontmatter fields and body.
#[derive(Debug, Clone)]
pub struct ParsedFrontmatter {
    /// Parsed frontmatter, empty when absent.
    pub fields: Fields,
    /// Body text following the frontmatter block.
    pub body: String,
    /// Raw frontmatter text, if a block was present.
    pub raw_frontmatter: Option<String>,
    /// Byte boundaries of the block, if present.
    pub boundaries: Option<FrontmatterBoundaries>,
}

impl ParsedFrontmatter {
    /// Whether the document carried a frontmatter block.
    pub fn has_frontmatter(&self) -> bool {
        self.boundaries.is_some()
    }
}

/// Frontmatter parser for source documents.
pub struct FrontmatterParser {
    raw_matter: Matter<RawFrontmatter>,
}

impl Debug for FrontmatterParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrontmatterParser").finish()
    }
}

impl Default for FrontmatterParser {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for FrontmatterParser {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl FrontmatterParser {
    /// Create a new frontmatter parser.
    pub fn new() -> Self {
        Self {
            raw_matter: Matter::new(),
        }
    }

    /// Split `content` into ordered frontmatter fields and body.
    ///
    /// A frontmatter block that is not a YAML mapping is a
    /// [`SyncError::Parse`]. An empty block yields no fields.
    pub fn parse(&self, content: &str, file_path: &Path) -> Result<ParsedFrontmatter, SyncError> {
        let boundaries = self.get_frontmatter_boundaries(content);
        let raw_frontmatter = boundaries.map(|b| {
            self.extract_raw_frontmatter(content).unwrap_or_else(|| inner_block(content, b))
        });

        let body = match boundaries {
            Some(b) => content[b.end..].to_string(),
            None => content.to_string(),
        };

        let fields = match raw_frontmatter.as_deref() {
            Some(raw) if !raw.trim().is_empty() => {
                let value: serde_json::Value = serde_yaml::from_str(raw)
                    .map_err(|e| SyncError::parse(file_path.display(), e))?;
                match value {
                    serde_json::Value::Object(map) => map,
                    serde_json::Value::Null => Fields::new(),
                    other => {
                        return Err(SyncError::parse(
                            file_path.display(),
                            format!("frontmatter must be a mapping, found {}", kind_of(&other)),
                        ));
                    }
                }
            }
            _ => Fields::new(),
        };

        Ok(ParsedFrontmatter {
            fields,
            body,
            raw_frontmatter,
            boundaries,
        })
    }

    /// Check if content has frontmatter.
    pub fn has_frontmatter(&self, content: &str) -> bool {
        self.get_frontmatter_boundaries(content).is_some()
    }

    /// Extract the raw frontmatter string.
    pub fn extract_raw_frontmatter(&self, content: &str) -> Option<String> {
        match self.raw_matter.parse::<String>(content) {
            Ok(result) => result.data,
            Err(_) => None,
        }
    }

    /// Find the byte boundaries of the frontmatter section.
    ///
    /// The opening delimiter must be the first line; the closing delimiter is
    /// the next line consisting of exactly `---`.
    pub fn get_frontmatter_boundaries(&self, content: &str) -> Option<FrontmatterBoundaries> {
        let first_line_end = content.find('\n')?;
        if content[..first_line_end].trim_end() != "---" {
            return None;
        }

        let mut offset = first_line_end + 1;
        while offset <= content.len() {
            let rest = &content[offset..];
            let line_len = rest.find('\n').unwrap_or(rest.len());
            if rest[..line_len].trim_end() == "---" {
                let end = (offset + line_len + 1).min(content.len());
                return Some(FrontmatterBoundaries {
                    start: 0,
                    end,
                });
            }
            if line_len == rest.len() {
                break;
            }
            offset += line_len + 1;
        }

        None
    }

    /// Replace the frontmatter section, preserving the body exactly.
    pub fn replace_frontmatter(
        &self,
        original_content: &str,
        rendered_frontmatter: &str,
        boundaries: FrontmatterBoundaries,
    ) -> String {
        let before = &original_content[..boundaries.start];
        let after = &original_content[boundaries.end..];

        format!("{}---\n{}\n---\n{}", before, rendered_frontmatter.trim(), after)
    }
}

/// Serialize fields to YAML frontmatter text (without delimiters).
pub fn render_frontmatter(fields: &Fields) -> Result<String, SyncError> {
    if fields.is_empty() {
        return Ok(String::new());
    }
    serde_yaml::to_string(fields).map_err(|e| SyncError::parse("<frontmatter>", e))
}

/// Rewrite only the top-level entries named in `changes` inside the
/// frontmatter block of `content`. Keys not present yet are appended.
///
/// Returns the new block text without delimiters, or `None` when a key of
/// `existing` is not written as a plain `key:` line and cannot be located.
pub fn patch_frontmatter(
    content: &str,
    boundaries: FrontmatterBoundaries,
    existing: &Fields,
    changes: &Fields,
) -> Result<Option<String>, SyncError> {
    let mut lines: Vec<String> = inner_block(content, boundaries).lines().map(str::to_string).collect();

    for (key, value) in changes {
        let mut single = Fields::new();
        single.insert(key.clone(), value.clone());
        let replacement: Vec<String> =
            render_frontmatter(&single)?.trim_end().lines().map(str::to_string).collect();

        match find_entry(&lines, key) {
            Some(range) => {
                lines.splice(range, replacement);
            }
            None if existing.contains_key(key) => return Ok(None),
            None => lines.extend(replacement),
        }
    }

    Ok(Some(lines.join("\n")))
}

/// Lines of the top-level entry `key`, continuation lines included.
fn find_entry(lines: &[String], key: &str) -> Option<Range<usize>> {
    let prefix = format!("{key}:");
    let start = lines.iter().position(|line| {
        line.strip_prefix(&prefix).is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
    })?;
    let continuation =
        lines[start + 1..].iter().take_while(|line| line.starts_with([' ', '\t', '-'])).count();
    Some(start..start + 1 + continuation)
}

/// Text between the delimiter lines of a block located by boundaries.
fn inner_block(content: &str, boundaries: FrontmatterBoundaries) -> String {
    let block = &content[boundaries.start..boundaries.end];
    let after_open = block.find('\n').map_or(block.len(), |i| i + 1);
    let inner = block[after_open..].trim_end();
    inner.strip_suffix("---").unwrap_or(inner).to_string()
}

fn kind_of(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a sequence",
        serde_json::Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preserves_field_order() {
        let parser = FrontmatterParser::new();
        let parsed = parser
            .parse("---\nzeta: 1\nalpha: 2\nmid: 3\n---\nbody", Path::new("x.mdx"))
            .unwrap();
        let keys: Vec<&str> = parsed.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(parsed.body, "body");
    }

    #[test]
    fn test_parse_without_frontmatter() {
        let parser = FrontmatterParser::new();
        let parsed = parser.parse("# Just content\n", Path::new("x.mdx")).unwrap();
        assert!(!parsed.has_frontmatter());
        assert!(parsed.fields.is_empty());
        assert_eq!(parsed.body, "# Just content\n");
    }

    #[test]
    fn test_parse_malformed_yaml_is_error() {
        let parser = FrontmatterParser::new();
        let err = parser.parse("---\ntitle: [unclosed\n---\n", Path::new("bad.mdx")).unwrap_err();
        assert!(matches!(err, SyncError::Parse { .. }));
        assert!(err.to_string().contains("bad.mdx"));
    }

    #[test]
    fn test_parse_scalar_frontmatter_is_error() {
        let parser = FrontmatterParser::new();
        let err = parser.parse("---\njust a string\n---\n", Path::new("s.mdx")).unwrap_err();
        assert!(err.to_string().contains("mapping"));
    }

    #[test]
    fn test_boundaries_require_line_delimiters() {
        let parser = FrontmatterParser::new();
        assert!(parser.get_frontmatter_boundaries("a---b\n---\n").is_none());
        let content = "---\nkey: a---b\n---\nBody";
        let b = parser.get_frontmatter_boundaries(content).unwrap();
        assert_eq!(&content[b.end..], "Body");
    }

    #[test]
    fn test_replace_frontmatter_keeps_body_bytes() {
        let parser = FrontmatterParser::new();
        let content = "---\ntitle: Old\n---\n\nBody  with  spacing\n";
        let b = parser.get_frontmatter_boundaries(content).unwrap();
        let result = parser.replace_frontmatter(content, "title: New\n", b);
        assert_eq!(result, "---\ntitle: New\n---\n\nBody  with  spacing\n");
    }

    #[test]
    fn test_patch_keeps_untouched_lines() {
        let parser = FrontmatterParser::new();
        let content = "---\n# reviewed\ntitle: Old\ndate: \"2024-01-10\"\ntags:\n- a\n- b\nnote: 'x'\n---\nBody\n";
        let parsed = parser.parse(content, Path::new("a.mdx")).unwrap();
        let b = parsed.boundaries.unwrap();

        let mut changes = Fields::new();
        changes.insert("title".into(), "New".into());
        changes.insert("tags".into(), serde_json::json!(["c"]));
        changes.insert("extra".into(), 1.into());
        let block = patch_frontmatter(content, b, &parsed.fields, &changes).unwrap().unwrap();

        assert_eq!(block, "# reviewed\ntitle: New\ndate: \"2024-01-10\"\ntags:\n- c\nnote: 'x'\nextra: 1");
    }

    #[test]
    fn test_patch_gives_up_on_unlocatable_key() {
        let parser = FrontmatterParser::new();
        let content = "---\n\"title\": Old\n---\n";
        let parsed = parser.parse(content, Path::new("a.mdx")).unwrap();

        let mut changes = Fields::new();
        changes.insert("title".into(), "New".into());
        let patched = patch_frontmatter(content, parsed.boundaries.unwrap(), &parsed.fields, &changes).unwrap();
        assert!(patched.is_none());
    }

    #[test]
    fn test_render_frontmatter_round_trips_order() {
        let mut fields = Fields::new();
        fields.insert("title".into(), "Hello".into());
        fields.insert("tags".into(), serde_json::json!(["a", "b"]));
        let yaml = render_frontmatter(&fields).unwrap();
        assert!(yaml.starts_with("title: Hello\n"));
        assert!(yaml.contains("tags:"));
    }
}
