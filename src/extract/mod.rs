//! Reconciling hand edits of rendered output back into field values.
//!
//! The template's literal text is used as a set of anchors. Each anchor is
//! located in the edited text, in template order; the text between two
//! located anchors is what filled the placeholder between them:
//!
//! ```text
//! template:  "# "  {data.title}  "\n\nBy "  {data.author}  "\n"
//! edited:    "# "  New Title     "\n\nBy "  Ann            "\n"
//!                  ^^^^^^^^^                ^^^
//! ```
//!
//! Confidence is the fraction of anchors found. Gaps holding a component or
//! several placeholders cannot be attributed to one field and yield nothing.

use serde_json::Value;

use crate::markdown::Fields;
use crate::template::{Segment, segments, value_to_text};

/// What filled a gap between two anchors.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Hole {
    Field(String),
    Content,
    Component,
}

#[derive(Debug)]
enum Piece<'a> {
    Anchor(&'a str),
    Gap(Vec<Hole>),
}

/// Result of matching an edited document against its template.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Extracted `(field, text)` pairs in template order; a field may repeat.
    pub values: Vec<(String, String)>,
    /// Extracted free-text content, if the `{content}` region was located.
    pub content: Option<String>,
    /// Fraction of anchors located, in `[0, 1]`.
    pub confidence: f64,
    /// Number of anchors located.
    pub anchors_found: usize,
    /// Number of anchors in the template.
    pub anchors_total: usize,
}

impl Extraction {
    /// Whether the match is good enough to merge.
    pub fn is_confident(&self, threshold: f64) -> bool {
        self.confidence >= threshold
    }
}

/// Field and content changes to merge into a source document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    /// Changed fields with values coerced to their current types.
    pub fields: Fields,
    /// Replacement content.
    pub content: Option<String>,
}

impl Changes {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.content.is_none()
    }
}

fn pieces(template: &str) -> Vec<Piece<'_>> {
    let mut out: Vec<Piece<'_>> = Vec::new();
    for segment in segments(template) {
        let hole = match segment {
            Segment::Literal(text) if !text.is_empty() => {
                out.push(Piece::Anchor(text));
                continue;
            }
            Segment::Literal(_) => continue,
            Segment::Field(name) => Hole::Field(name),
            Segment::Content => Hole::Content,
            Segment::Component(_) => Hole::Component,
        };
        match out.last_mut() {
            Some(Piece::Gap(holes)) => holes.push(hole),
            _ => out.push(Piece::Gap(vec![hole])),
        }
    }
    out
}

/// Match `edited` against `template` and extract placeholder values.
pub fn reconcile(template: &str, edited: &str) -> Extraction {
    let pieces = pieces(template);
    let anchors_total = pieces.iter().filter(|p| matches!(p, Piece::Anchor(_))).count();

    if anchors_total == 0 {
        return whole_text(&pieces, edited);
    }

    let last_anchor = pieces.iter().rposition(|p| matches!(p, Piece::Anchor(_)));
    let ends_with_literal = last_anchor == Some(pieces.len() - 1);

    // Located byte range of every anchor piece, by piece index
    let mut located: Vec<Option<(usize, usize)>> = vec![None; pieces.len()];
    let mut cursor = 0;
    for (index, piece) in pieces.iter().enumerate() {
        let Piece::Anchor(anchor) = piece else {
            continue;
        };
        let found = if ends_with_literal && Some(index) == last_anchor {
            locate_suffix(edited, anchor, cursor)
        } else {
            edited[cursor..].find(anchor).map(|at| (cursor + at, cursor + at + anchor.len()))
        };
        if let Some((start, end)) = found {
            located[index] = Some((start, end));
            cursor = end;
        }
    }
    let anchors_found = located.iter().filter(|l| l.is_some()).count();

    let mut values = Vec::new();
    let mut content = None;
    for (index, piece) in pieces.iter().enumerate() {
        let Piece::Gap(holes) = piece else {
            continue;
        };
        let [hole] = holes.as_slice() else {
            continue;
        };
        let start = match index.checked_sub(1) {
            None => Some(0),
            Some(prev) => located[prev].map(|(_, end)| end),
        };
        let end = match pieces.get(index + 1) {
            None => Some(edited.len()),
            Some(_) => located[index + 1].map(|(start, _)| start),
        };
        let (Some(start), Some(end)) = (start, end) else {
            continue;
        };
        if start > end {
            continue;
        }
        let text = edited[start..end].trim().to_string();
        match hole {
            Hole::Field(name) => values.push((name.clone(), text)),
            Hole::Content => content = Some(text),
            Hole::Component => {}
        }
    }

    Extraction {
        values,
        content,
        confidence: anchors_found as f64 / anchors_total as f64,
        anchors_found,
        anchors_total,
    }
}

/// Locate the template's closing literal at the end of `edited`, ignoring
/// trailing whitespace on both sides.
fn locate_suffix(edited: &str, anchor: &str, cursor: usize) -> Option<(usize, usize)> {
    let text = edited.trim_end();
    let needle = anchor.trim_end();
    if needle.is_empty() {
        let start = text.len().max(cursor);
        return (start <= edited.len()).then_some((start, edited.len()));
    }
    let start = text.strip_suffix(needle).map(str::len)?;
    (start >= cursor).then_some((start, edited.len()))
}

fn whole_text(pieces: &[Piece<'_>], edited: &str) -> Extraction {
    let single = match pieces {
        [Piece::Gap(holes)] if holes.len() == 1 => holes.first(),
        _ => None,
    };
    let text = edited.trim().to_string();
    let (values, content, confidence) = match single {
        Some(Hole::Field(name)) => (vec![(name.clone(), text)], None, 1.0),
        Some(Hole::Content) => (Vec::new(), Some(text), 1.0),
        _ => (Vec::new(), None, 0.0),
    };
    Extraction {
        values,
        content,
        confidence,
        anchors_found: 0,
        anchors_total: 0,
    }
}

/// Compare extracted values with the instance's current data and content.
///
/// A value whose text equals the current value's rendered text is
/// unchanged. When a field appears several times, the first occurrence that
/// differs wins.
pub fn changes(extraction: &Extraction, data: &Fields, content: &str) -> Changes {
    let mut out = Changes::default();

    for (field, text) in &extraction.values {
        if out.fields.contains_key(field) {
            continue;
        }
        let current = data.get(field);
        if current.map(value_to_text).unwrap_or_default() == *text {
            continue;
        }
        out.fields.insert(field.clone(), coerce(text, current));
    }

    if let Some(new_content) = &extraction.content
        && new_content.as_str() != content.trim()
    {
        out.content = Some(new_content.clone());
    }

    out
}

/// Convert extracted text to the JSON type of the field's current value.
pub fn coerce(text: &str, current: Option<&Value>) -> Value {
    match current {
        Some(Value::Number(n)) => {
            if n.is_f64() {
                text.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map_or_else(|| Value::String(text.to_string()), Value::Number)
            } else if let Ok(i) = text.parse::<i64>() {
                Value::from(i)
            } else {
                text.parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map_or_else(|| Value::String(text.to_string()), Value::Number)
            }
        }
        Some(Value::Bool(_)) => match text.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::String(text.to_string()),
        },
        Some(Value::Array(items)) => Value::Array(
            text.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| coerce(item, items.first()))
                .collect(),
        ),
        Some(Value::Null) if text.is_empty() => Value::Null,
        _ => Value::String(text.to_string()),
    }
}
