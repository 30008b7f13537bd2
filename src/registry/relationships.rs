//! Relationship resolution between types.
//!
//! Explicit relationships are declared in a type definition's schema defaults
//! with a `"Target.reverseField"` value:
//!
//! ```yaml
//! ---
//! topic: Topic.posts     # one Post -> one Topic, reverse field `posts`
//! authors: Person.books  # field ends in "s" -> many
//! ---
//! ```
//!
//! Implicit relationships come from component tag names alone: `<Posts />` in
//! a template refers to type `Post` through [`component_name_to_type`].

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

use crate::constants::IRREGULAR_PLURALS;
use crate::markdown::Fields;

static RELATIONSHIP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)$").expect("valid regex")
});

/// How many targets a relationship field refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    /// The field holds a single target id.
    One,
    /// The field holds several target ids.
    Many,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "one"),
            Self::Many => write!(f, "many"),
        }
    }
}

/// A declared link from a field of one type to another type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Relationship {
    /// Field on the declaring type.
    pub field: String,
    /// Type the field points at.
    pub target_type: String,
    /// `many` when the field name is plural.
    pub cardinality: Cardinality,
    /// Field on the target type pointing back.
    pub reverse_field: Option<String>,
}

/// Split a `"Target.field"` value into its parts.
pub fn parse_relationship_value(value: &serde_json::Value) -> Option<(String, String)> {
    let text = value.as_str()?;
    let caps = RELATIONSHIP_RE.captures(text.trim())?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

/// Derive the explicit relationships declared by a schema.
///
/// Order follows the schema's field order.
pub fn resolve(schema_defaults: &Fields) -> Vec<Relationship> {
    schema_defaults
        .iter()
        .filter_map(|(field, value)| {
            let (target_type, reverse) = parse_relationship_value(value)?;
            let cardinality = if field.ends_with('s') {
                Cardinality::Many
            } else {
                Cardinality::One
            };
            Some(Relationship {
                field: field.clone(),
                target_type,
                cardinality,
                reverse_field: Some(reverse),
            })
        })
        .collect()
}

/// Map a PascalCase component tag name to a singular type name.
///
/// Irregular plurals are looked up first, then `-ies -> y`, `-es -> ""`
/// (after s, x, z, ch, sh) and `-s -> ""`. Every name maps to some
/// candidate; names that are already singular map to themselves.
///
/// ```rust
/// use mdxdb::registry::component_name_to_type;
///
/// assert_eq!(component_name_to_type("Posts"), "Post");
/// assert_eq!(component_name_to_type("Categories"), "Category");
/// assert_eq!(component_name_to_type("People"), "Person");
/// assert_eq!(component_name_to_type("Stories"), "Story");
/// ```
pub fn component_name_to_type(name: &str) -> String {
    if let Some((_, singular)) = IRREGULAR_PLURALS.iter().find(|(plural, _)| *plural == name) {
        return (*singular).to_string();
    }

    if let Some(stem) = name.strip_suffix("ies")
        && !stem.is_empty()
    {
        return format!("{stem}y");
    }

    if let Some(stem) = name.strip_suffix("es")
        && is_sibilant(stem)
    {
        return stem.to_string();
    }

    if let Some(stem) = name.strip_suffix('s')
        && !stem.is_empty()
        && !stem.ends_with('s')
    {
        return stem.to_string();
    }

    name.to_string()
}

/// Pluralize a type name; inverse of [`component_name_to_type`] for regular nouns.
pub fn pluralize(name: &str) -> String {
    if let Some((plural, _)) = IRREGULAR_PLURALS.iter().find(|(_, singular)| *singular == name) {
        return (*plural).to_string();
    }

    if let Some(stem) = name.strip_suffix('y')
        && stem.chars().last().is_some_and(|c| !"aeiouAEIOU".contains(c))
    {
        return format!("{stem}ies");
    }

    if is_sibilant(name) {
        return format!("{name}es");
    }

    format!("{name}s")
}

/// Lowercase the first character: `BlogPost` -> `blogPost`.
pub fn to_field_name(type_name: &str) -> String {
    let mut chars = type_name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn is_sibilant(stem: &str) -> bool {
    !stem.is_empty()
        && ["s", "x", "z", "ch", "sh"].iter().any(|suffix| stem.ends_with(suffix))
}
