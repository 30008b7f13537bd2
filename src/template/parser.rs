//! Template syntax: placeholders and self-closing component tags.
//!
//! ```text
//! # {data.title}                        <- field placeholder
//! {content}                             <- free-text placeholder
//! <Table type="Post" fields="title,date" limit={5} />
//! <Posts />                             <- implicit relationship tag
//! ```
//!
//! Component tags are recognised by a small hand-written grammar rather than
//! a regex, so quotes and braces nested inside attribute values never end a
//! tag early:
//!
//! ```text
//! tag   := '<' Name ( ws attr )* ws? '/>'
//! Name  := [A-Z][A-Za-z0-9_]*
//! attr  := key ( ws? '=' ws? value )?        (a bare key means "true")
//! value := '"' .* '"' | "'" .* "'" | '{' balanced '}' | bare
//! ```
//!
//! Brace values are captured verbatim (outer braces removed) and never
//! evaluated. Text that looks like a tag but does not parse is left as
//! literal text.

use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::LazyLock;

use crate::markdown::Fields;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{(?:data\.([A-Za-z_][A-Za-z0-9_]*)|(content))\}").expect("valid regex")
});

/// Which built-in a component tag dispatches to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentKind {
    /// `<Table />`
    Table,
    /// `<List />`
    List,
    /// `<Related field="..." />`
    Related,
    /// Any other tag, read as an implicit relationship.
    Generic(String),
}

impl ComponentKind {
    fn from_name(name: &str) -> Self {
        match name {
            "Table" => Self::Table,
            "List" => Self::List,
            "Related" => Self::Related,
            other => Self::Generic(other.to_string()),
        }
    }
}

/// One component invocation found in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentTag {
    /// Dispatch kind.
    pub kind: ComponentKind,
    /// Tag name as written.
    pub name: String,
    /// Raw attribute values.
    pub attributes: BTreeMap<String, String>,
    /// Byte range of the whole tag in the parsed text.
    pub span: Range<usize>,
}

impl ComponentTag {
    /// Raw value of an attribute, if present and non-blank.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }
}

/// A piece of a template, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Literal text.
    Literal(&'a str),
    /// `{data.<field>}`
    Field(String),
    /// `{content}`
    Content,
    /// A component tag.
    Component(ComponentTag),
}

/// Find every component tag in `text`, in order of appearance.
pub fn parse_components(text: &str) -> Vec<ComponentTag> {
    let bytes = text.as_bytes();
    let mut tags = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'<'
            && let Some(tag) = parse_tag_at(text, i)
        {
            i = tag.span.end;
            tags.push(tag);
            continue;
        }
        i += 1;
    }

    tags
}

fn parse_tag_at(text: &str, start: usize) -> Option<ComponentTag> {
    let bytes = text.as_bytes();
    let mut i = start + 1;

    if !bytes.get(i)?.is_ascii_uppercase() {
        return None;
    }
    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    let name = &text[name_start..i];
    let mut attributes = BTreeMap::new();

    loop {
        let before_ws = i;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        match *bytes.get(i)? {
            b'/' => {
                return (bytes.get(i + 1) == Some(&b'>')).then(|| ComponentTag {
                    kind: ComponentKind::from_name(name),
                    name: name.to_string(),
                    attributes,
                    span: start..i + 2,
                });
            }
            c if (c.is_ascii_alphabetic() || c == b'_') && i > before_ws => {
                let key_start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'-' | b':'))
                {
                    i += 1;
                }
                let key = text[key_start..i].to_string();

                let mut j = i;
                while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                    j += 1;
                }
                if bytes.get(j) == Some(&b'=') {
                    j += 1;
                    while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                        j += 1;
                    }
                    let (value, end) = parse_value(text, j)?;
                    attributes.insert(key, value);
                    i = end;
                } else {
                    attributes.insert(key, "true".to_string());
                }
            }
            _ => return None,
        }
    }
}

/// Parse an attribute value starting at `start`; returns the value and the
/// byte position after it.
fn parse_value(text: &str, start: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    match *bytes.get(start)? {
        quote @ (b'"' | b'\'') => {
            let close = text[start + 1..].find(quote as char)? + start + 1;
            Some((text[start + 1..close].to_string(), close + 1))
        }
        b'{' => {
            let mut depth = 0usize;
            let mut i = start;
            let mut in_quote: Option<u8> = None;
            while i < bytes.len() {
                let c = bytes[i];
                match in_quote {
                    Some(q) if c == q => in_quote = None,
                    Some(_) => {}
                    None => match c {
                        b'"' | b'\'' | b'`' => in_quote = Some(c),
                        b'{' => depth += 1,
                        b'}' => {
                            depth -= 1;
                            if depth == 0 {
                                return Some((text[start + 1..i].trim().to_string(), i + 1));
                            }
                        }
                        _ => {}
                    },
                }
                i += 1;
            }
            None
        }
        _ => {
            let mut i = start;
            while i < bytes.len()
                && !bytes[i].is_ascii_whitespace()
                && !matches!(bytes[i], b'/' | b'>' | b'<')
            {
                i += 1;
            }
            (i > start).then(|| (text[start..i].to_string(), i))
        }
    }
}

/// Text form of a field value inside rendered output.
///
/// Strings are inserted as-is, arrays are comma-joined and `null` is empty.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) => items.iter().map(value_to_text).collect::<Vec<_>>().join(", "),
        Value::Object(_) => value.to_string(),
    }
}

/// Replace `{data.<field>}` and `{content}` placeholders.
///
/// Missing fields become empty strings.
pub fn substitute_placeholders(template: &str, data: &Fields, content: &str) -> String {
    PLACEHOLDER_RE
        .replace_all(template, |caps: &regex::Captures| match caps.get(1) {
            Some(field) => data.get(field.as_str()).map(value_to_text).unwrap_or_default(),
            None => content.to_string(),
        })
        .into_owned()
}

/// Split a template into literal text, placeholders and components.
///
/// Placeholders inside a component's attributes belong to the component.
pub fn segments(template: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut cursor = 0;

    for tag in parse_components(template) {
        split_placeholders(&template[cursor..tag.span.start], &mut out);
        cursor = tag.span.end;
        out.push(Segment::Component(tag));
    }
    split_placeholders(&template[cursor..], &mut out);

    out
}

fn split_placeholders<'a>(text: &'a str, out: &mut Vec<Segment<'a>>) {
    let mut cursor = 0;
    for caps in PLACEHOLDER_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if whole.start() > cursor {
            out.push(Segment::Literal(&text[cursor..whole.start()]));
        }
        out.push(match caps.get(1) {
            Some(field) => Segment::Field(field.as_str().to_string()),
            None => Segment::Content,
        });
        cursor = whole.end();
    }
    if cursor < text.len() {
        out.push(Segment::Literal(&text[cursor..]));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_table_tag() {
        let text = "Intro\n<Table type=\"Post\" fields='title,date' limit={5} />\nOutro";
        let tags = parse_components(text);
        assert_eq!(tags.len(), 1);
        let tag = &tags[0];
        assert_eq!(tag.kind, ComponentKind::Table);
        assert_eq!(tag.attr("type"), Some("Post"));
        assert_eq!(tag.attr("fields"), Some("title,date"));
        assert_eq!(tag.attr("limit"), Some("5"));
        assert_eq!(&text[tag.span.clone()], "<Table type=\"Post\" fields='title,date' limit={5} />");
    }

    #[test]
    fn test_nested_quotes_and_braces_in_values() {
        let text = r#"<List where={status = "a}b" and x = '{y}'} listFormat="- {title} (<b>)" />"#;
        let tags = parse_components(text);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].attr("where"), Some(r#"status = "a}b" and x = '{y}'"#));
        assert_eq!(tags[0].attr("listFormat"), Some("- {title} (<b>)"));
        assert_eq!(tags[0].span, 0..text.len());
    }

    #[test]
    fn test_generic_tags_and_flags() {
        let tags = parse_components("<Posts/> and <Authors compact />");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].kind, ComponentKind::Generic("Posts".into()));
        assert_eq!(tags[1].attr("compact"), Some("true"));
    }

    #[test]
    fn test_non_tags_are_literal() {
        assert!(parse_components("<div>html</div> <Open> a < b <lower /> <Bad attr=/>").is_empty());
        assert!(parse_components("<Table type=\"unterminated />").is_empty());
    }

    #[test]
    fn test_bare_attribute_value() {
        let tags = parse_components("<Table limit=3 orderBy=date/>");
        assert_eq!(tags[0].attr("limit"), Some("3"));
        assert_eq!(tags[0].attr("orderBy"), Some("date"));
    }

    #[test]
    fn test_substitute_placeholders() {
        let data = json!({"title": "Hi", "tags": ["a", "b"], "n": 3}).as_object().cloned().unwrap();
        let out = substitute_placeholders(
            "{data.title} {data.tags} {data.n} [{data.missing}] {content} {other}",
            &data,
            "Body",
        );
        assert_eq!(out, "Hi a, b 3 [] Body {other}");
    }

    #[test]
    fn test_segments() {
        let segs = segments("# {data.title}\n<Table where=\"id = '{data.id}'\" />\n{content}\n");
        assert_eq!(segs.len(), 7);
        assert_eq!(segs[0], Segment::Literal("# "));
        assert_eq!(segs[1], Segment::Field("title".into()));
        assert_eq!(segs[2], Segment::Literal("\n"));
        assert!(matches!(segs[3], Segment::Component(_)));
        assert_eq!(segs[4], Segment::Literal("\n"));
        assert_eq!(segs[5], Segment::Content);
        assert_eq!(segs[6], Segment::Literal("\n"));
    }
}
