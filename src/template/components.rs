//! Built-in components: target resolution, query planning and formatting.
//!
//! Every component tag resolves to a target type and a [`Query`] scoped to
//! that type:
//!
//! | Tag | Target | Filter |
//! |-----|--------|--------|
//! | `<Table>`, `<List>` | `type` attr, else the rendering type | `type = T AND where` |
//! | `<Related field="f">` | relationship target | reverse field (many) or id (one) |
//! | `<Posts>` (any other) | explicit relationship named `posts`, else `Post` | candidate reverse fields OR'd |
//!
//! Formatting is pure and synchronous so it can be tested without a store.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use super::parser::{ComponentKind, ComponentTag, value_to_text};
use crate::constants::{DEFAULT_LIST_FORMAT, FIELD_LOW_PRIORITY, FIELD_PRIORITY};
use crate::core::SyncError;
use crate::registry::{
    Cardinality, Instance, Relationship, TypeDefinition, TypeRegistry, component_name_to_type,
    pluralize, to_field_name,
};
use crate::store::{Filter, OrderBy, Query, Row};

static LIST_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

/// Text emitted for a query with no rows.
pub const NO_RESULTS: &str = "*No results.*";

/// What a component tag refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// `<Table>` / `<List>` over a named type.
    Direct(String),
    /// An explicit relationship of the rendering type.
    Relationship(Relationship),
    /// A type inferred from the tag name.
    Implicit(String),
    /// The tag cannot be resolved; carries the reason.
    Unresolved(String),
}

impl Resolution {
    /// Type queried by this component, if any.
    pub fn target_type(&self) -> Option<&str> {
        match self {
            Self::Direct(target) | Self::Implicit(target) => Some(target),
            Self::Relationship(rel) => Some(&rel.target_type),
            Self::Unresolved(_) => None,
        }
    }
}

/// Resolve a tag against the type whose template contains it.
pub fn resolve(tag: &ComponentTag, context_type: Option<&TypeDefinition>) -> Resolution {
    match &tag.kind {
        ComponentKind::Table | ComponentKind::List => {
            match tag.attr("type").map(str::to_string).or_else(|| context_type.map(|d| d.name.clone())) {
                Some(target) => Resolution::Direct(target),
                None => Resolution::Unresolved("no `type` attribute and no enclosing type".into()),
            }
        }
        ComponentKind::Related => {
            let Some(field) = tag.attr("field") else {
                return Resolution::Unresolved("missing `field` attribute".into());
            };
            match context_type.and_then(|d| d.relationship(field)) {
                Some(rel) => Resolution::Relationship(rel.clone()),
                None => Resolution::Unresolved(format!("no relationship declared for field '{field}'")),
            }
        }
        ComponentKind::Generic(name) => {
            let field = to_field_name(name);
            if let Some(rel) = context_type.and_then(|d| d.relationship(&field)) {
                return Resolution::Relationship(rel.clone());
            }
            Resolution::Implicit(
                tag.attr("type").map_or_else(|| component_name_to_type(name), str::to_string),
            )
        }
    }
}

/// How result rows are laid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Markdown table; `fields` fixes the columns when given.
    Table {
        /// Explicit column order.
        fields: Option<Vec<String>>,
    },
    /// One line per row from a `{field}` format string.
    List {
        /// Row format.
        format: String,
    },
}

impl Layout {
    fn for_tag(tag: &ComponentTag, default_list: bool) -> Self {
        let list = match tag.attr("format") {
            Some(format) => format.eq_ignore_ascii_case("list"),
            None => default_list,
        };
        if list {
            Self::List {
                format: tag
                    .attr("listFormat")
                    .unwrap_or(DEFAULT_LIST_FORMAT)
                    .to_string(),
            }
        } else {
            Self::Table {
                fields: tag.attr("fields").map(split_fields),
            }
        }
    }

    /// Render rows in this layout.
    ///
    /// `link` gives the link target for a row's first table column.
    pub fn render(&self, rows: &[Row], link: impl Fn(&Row) -> Option<String>) -> String {
        match self {
            Self::Table { fields } => render_table(rows, fields.as_deref(), link),
            Self::List { format } => render_list(rows, format),
        }
    }
}

/// A component ready to run: either a query or a fixed message.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Query the store and lay the rows out.
    Query {
        /// Store query.
        query: Query,
        /// Output layout.
        layout: Layout,
    },
    /// Emit text without querying.
    Message(String),
}

/// Build the plan for one component while rendering `instance`.
pub fn plan(
    tag: &ComponentTag,
    instance: &Instance,
    typedef: &TypeDefinition,
    registry: &TypeRegistry,
) -> Result<Plan, SyncError> {
    let resolution = resolve(tag, Some(typedef));
    let is_list = tag.kind == ComponentKind::List;

    let base = match &resolution {
        Resolution::Unresolved(reason) => return Err(SyncError::query(reason)),
        Resolution::Direct(target) => Filter::eq("type", target.as_str()),
        Resolution::Relationship(rel) => relationship_filter(rel, instance),
        Resolution::Implicit(target) => {
            if registry.lookup(target).is_none() {
                return Ok(Plan::Message(not_found(target, registry.suggest(target).as_deref())));
            }
            implicit_filter(target, &typedef.name, &instance.id)
        }
    };

    let filter = match tag.attr("where") {
        Some(expr) => base.and(Filter::parse(expr)?),
        None => base,
    };
    let order_by = tag.attr("orderBy").map(OrderBy::parse).transpose()?.unwrap_or_default();
    let limit = tag
        .attr("limit")
        .map(|raw| {
            raw.parse::<usize>()
                .map_err(|_| SyncError::query(format!("invalid limit '{raw}'")))
        })
        .transpose()?;

    Ok(Plan::Query {
        query: Query::new(filter).order_by(order_by).limit(limit),
        layout: Layout::for_tag(tag, is_list),
    })
}

fn relationship_filter(rel: &Relationship, instance: &Instance) -> Filter {
    let by_type = Filter::eq("type", rel.target_type.as_str());
    match (rel.cardinality, rel.reverse_field.as_deref()) {
        (Cardinality::Many, Some(reverse)) => by_type.and(Filter::eq(reverse, instance.id.as_str())),
        _ => {
            let ids: Vec<Filter> = match instance.data.get(&rel.field) {
                Some(Value::Array(items)) => {
                    items.iter().map(|id| Filter::eq("id", id.clone())).collect()
                }
                Some(Value::Null) | None => Vec::new(),
                Some(id) => vec![Filter::eq("id", id.clone())],
            };
            by_type.and(Filter::any(ids))
        }
    }
}

/// Rows of `target` pointing back at the rendering instance through any of
/// the conventional reverse field names.
///
/// Each candidate is an equality test, which matches a scalar field holding
/// the id or an array field with the id as one element.
fn implicit_filter(target: &str, current_type: &str, instance_id: &str) -> Filter {
    let candidates = [
        to_field_name(current_type),
        to_field_name(&pluralize(current_type)),
        "tags".to_string(),
        "categories".to_string(),
        to_field_name(target),
    ];

    let mut seen = Vec::new();
    let mut alternatives = Vec::new();
    for field in candidates {
        if seen.contains(&field) {
            continue;
        }
        alternatives.push(Filter::eq(field.as_str(), instance_id));
        seen.push(field);
    }

    Filter::eq("type", target).and(Filter::any(alternatives))
}

/// Inline marker replacing a failed component.
pub fn error_marker(tag_name: &str, message: &str) -> String {
    format!("> **mdxdb error** ({tag_name}): {message}")
}

/// Message for an implicit tag whose type is not registered.
pub fn not_found(target: &str, suggestion: Option<&str>) -> String {
    match suggestion {
        Some(s) => format!("*Type '{target}' not found. Did you mean '{s}'?*"),
        None => format!("*Type '{target}' not found.*"),
    }
}

fn split_fields(raw: &str) -> Vec<String> {
    raw.split(',').map(str::trim).filter(|f| !f.is_empty()).map(str::to_string).collect()
}

/// Sort columns: priority fields first, reserved fields last, others in
/// their original relative order.
pub fn order_fields(fields: Vec<String>) -> Vec<String> {
    let mut keyed: Vec<((u8, usize), String)> = fields
        .into_iter()
        .enumerate()
        .map(|(i, field)| {
            let key = if let Some(p) = FIELD_PRIORITY.iter().position(|f| *f == field) {
                (0, p)
            } else if let Some(p) = FIELD_LOW_PRIORITY.iter().position(|f| *f == field) {
                (2, p)
            } else {
                (1, i)
            };
            (key, field)
        })
        .collect();
    keyed.sort_by_key(|(key, _)| *key);
    keyed.into_iter().map(|(_, field)| field).collect()
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace("\r\n", "<br>").replace('\n', "<br>")
}

fn cell(row: &Row, field: &str) -> String {
    row.get(field).map(value_to_text).unwrap_or_default()
}

/// Render rows as a Markdown table.
///
/// A single row is shown vertically as property/value pairs; several rows
/// are shown one per line, with the first column linking to whatever `link`
/// returns for the row.
pub fn render_table(
    rows: &[Row],
    fields: Option<&[String]>,
    link: impl Fn(&Row) -> Option<String>,
) -> String {
    if rows.is_empty() {
        return NO_RESULTS.to_string();
    }

    let columns: Vec<String> = match fields {
        Some(fields) if !fields.is_empty() => fields.to_vec(),
        _ => {
            let mut seen: Vec<String> = Vec::new();
            for key in rows.iter().flat_map(|row| row.keys()) {
                if !seen.contains(key) {
                    seen.push(key.clone());
                }
            }
            order_fields(seen)
        }
    };

    let mut lines = Vec::with_capacity(rows.len() + 2);

    if let [row] = rows {
        lines.push("| Property | Value |".to_string());
        lines.push("| --- | --- |".to_string());
        for field in &columns {
            lines.push(format!("| {} | {} |", escape_cell(field), escape_cell(&cell(row, field))));
        }
        return lines.join("\n");
    }

    lines.push(format!(
        "| {} |",
        columns.iter().map(|c| escape_cell(c)).collect::<Vec<_>>().join(" | ")
    ));
    lines.push(format!("|{}", " --- |".repeat(columns.len())));
    for row in rows {
        let target = link(row);
        let cells: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let text = escape_cell(&cell(row, field));
                match (&target, row.get("id").and_then(Value::as_str)) {
                    (Some(target), Some(id)) if i == 0 => {
                        let label = if text.is_empty() { escape_cell(id) } else { text };
                        format!("[{label}]({target})")
                    }
                    _ => text,
                }
            })
            .collect();
        lines.push(format!("| {} |", cells.join(" | ")));
    }
    lines.join("\n")
}

/// Render rows one per line using `{field}` substitution.
pub fn render_list(rows: &[Row], format: &str) -> String {
    if rows.is_empty() {
        return NO_RESULTS.to_string();
    }
    rows.iter()
        .map(|row| {
            LIST_FIELD_RE
                .replace_all(format, |caps: &regex::Captures| cell(row, &caps[1]))
                .into_owned()
        })
        .collect::<Vec<_>>()
        .join("\n")
}
