//! Rendering an instance through its type's template.

use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, warn};

use super::components::{self, Plan};
use super::parser::{ComponentTag, parse_components, substitute_placeholders};
use crate::constants::DEFAULT_OUTPUT_EXTENSION;
use crate::markdown::Fields;
use crate::registry::{Instance, TypeDefinition, TypeRegistry, row_output_path};
use crate::store::{Row, Store};
use crate::utils::fs::relative_link;

/// Renders instances against a registry snapshot and a store namespace.
///
/// Rendering only reads from the store, so the same inputs always produce
/// the same bytes.
pub struct Renderer<'a, S: Store> {
    store: &'a S,
    registry: &'a TypeRegistry,
    namespace: &'a str,
}

impl<'a, S: Store> Renderer<'a, S> {
    /// Create a renderer scoped to `namespace`.
    pub fn new(store: &'a S, registry: &'a TypeRegistry, namespace: &'a str) -> Self {
        Self {
            store,
            registry,
            namespace,
        }
    }

    /// Render `instance` through `typedef`'s template.
    ///
    /// Placeholders are substituted first, then component tags are expanded.
    /// A failing component is replaced by an inline error marker and the rest
    /// of the document still renders.
    pub async fn render(&self, instance: &Instance, typedef: &TypeDefinition) -> String {
        let data = placeholder_data(instance);
        let mut text = substitute_placeholders(&typedef.template, &data, &instance.content);

        let tags = parse_components(&text);
        let mut replacements = Vec::with_capacity(tags.len());
        for tag in tags {
            let rendered = self.render_component(&tag, instance, typedef).await;
            replacements.push((tag.span, rendered));
        }

        // Back to front so earlier spans stay valid
        for (span, rendered) in replacements.into_iter().rev() {
            text.replace_range(span, &rendered);
        }
        text
    }

    async fn render_component(
        &self,
        tag: &ComponentTag,
        instance: &Instance,
        typedef: &TypeDefinition,
    ) -> String {
        match components::plan(tag, instance, typedef, self.registry) {
            Ok(Plan::Message(message)) => message,
            Ok(Plan::Query { query, layout }) => {
                debug!("<{}> in {}: {query}", tag.name, instance.source_path.display());
                match self.store.query(self.namespace, &query).await {
                    Ok(rows) => layout.render(&rows, |row| self.row_link(row, instance)),
                    Err(e) => {
                        warn!("<{}> failed in {}: {e}", tag.name, instance.source_path.display());
                        components::error_marker(&tag.name, &e.to_string())
                    }
                }
            }
            Err(e) => {
                warn!("<{}> failed in {}: {e}", tag.name, instance.source_path.display());
                components::error_marker(&tag.name, &e.to_string())
            }
        }
    }
}

impl<S: Store> Renderer<'_, S> {
    /// Link from `instance`'s output to the output of `row`, if the row's
    /// type renders one.
    fn row_link(&self, row: &Row, instance: &Instance) -> Option<String> {
        let id = row.get("id")?.as_str()?;
        let def = self.registry.lookup(row.get("type")?.as_str()?)?;
        if !def.generates_output {
            return None;
        }

        let from = instance.rendered_path.as_deref().unwrap_or(&instance.source_path);
        let extension = from
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|_| instance.rendered_path.is_some())
            .unwrap_or(DEFAULT_OUTPUT_EXTENSION);
        let target = row_output_path(&def, id, row, extension);
        Some(relative_link(from.parent().unwrap_or_else(|| Path::new("")), &target))
    }
}

/// Instance data with `id` available to `{data.id}` unless a field shadows it.
pub fn placeholder_data(instance: &Instance) -> Cow<'_, Fields> {
    if instance.data.contains_key("id") {
        return Cow::Borrowed(&instance.data);
    }
    let mut data = instance.data.clone();
    data.insert("id".into(), instance.id.clone().into());
    Cow::Owned(data)
}
