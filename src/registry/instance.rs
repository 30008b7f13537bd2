//! Instances: source documents conforming to a registered type.

use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use super::{TypeDefinition, TypeRegistry};
use crate::core::SyncError;
use crate::markdown::{Document, Fields};

static PATH_PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"));

/// A structured source document bound to its type.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    /// `$id` or the file stem.
    pub id: String,
    /// Name of the instance's type.
    pub type_name: String,
    /// Schema defaults overlaid by the document's own fields.
    pub data: Fields,
    /// Free-text body.
    pub content: String,
    /// Source document location.
    pub source_path: PathBuf,
    /// Output location, when the type renders output.
    pub rendered_path: Option<PathBuf>,
    /// `$ns` of the instance, else of its type.
    pub namespace: Option<String>,
}

impl Instance {
    /// Bind a parsed document to its type.
    ///
    /// The type comes from `$type`, else from the single definition in the
    /// document's directory.
    pub fn from_document(
        doc: &Document,
        registry: &TypeRegistry,
        output_extension: &str,
    ) -> Result<(Self, Arc<TypeDefinition>), SyncError> {
        let def = match doc.directive_str("$type") {
            Some(name) => registry.lookup(name).ok_or_else(|| SyncError::TypeNotFound {
                name: name.to_string(),
            })?,
            None => {
                let dir = doc.path.parent().unwrap_or_else(|| Path::new(""));
                registry.type_for_directory(dir).ok_or_else(|| {
                    SyncError::parse(
                        doc.path.display(),
                        "no $type given and the directory has no single [Type] definition",
                    )
                })?
            }
        };

        let mut data = def.default_data();
        // Overridden defaults keep their schema position
        for (key, value) in doc.data_fields() {
            data.insert(key, value);
        }

        let id = doc.directive_str("$id").map_or_else(|| doc.stem(), str::to_string);
        let namespace = doc
            .directive_str("$ns")
            .map(str::to_string)
            .or_else(|| def.namespace.clone());

        let mut instance = Self {
            id,
            type_name: def.name.clone(),
            data,
            content: doc.body.clone(),
            source_path: doc.path.clone(),
            rendered_path: None,
            namespace,
        };
        if def.generates_output {
            instance.rendered_path = Some(instance.output_path(&def, output_extension));
        }
        Ok((instance, def))
    }

    /// Resolve the namespace, falling back to `default`.
    pub fn resolve_namespace(&self, default: Option<&str>) -> Result<String, SyncError> {
        self.namespace.as_deref().or(default).map(str::to_string).ok_or_else(|| {
            SyncError::NamespaceMissing {
                path: self.source_path.display().to_string(),
            }
        })
    }

    /// Where this instance's output is written.
    ///
    /// Without a `$path` pattern the output is a sibling of the source with
    /// `output_extension`.
    pub fn output_path(&self, def: &TypeDefinition, output_extension: &str) -> PathBuf {
        match &def.path_pattern {
            Some(pattern) => apply_path_pattern(pattern, def, &self.id, &self.data),
            None => self.source_path.with_extension(output_extension),
        }
    }
}

/// Where the output of the stored row `id` of `def` is expected.
///
/// Rows do not carry their source location, so without a `$path` pattern
/// the output is taken to sit beside the type definition.
pub fn row_output_path(def: &TypeDefinition, id: &str, data: &Fields, output_extension: &str) -> PathBuf {
    match &def.path_pattern {
        Some(pattern) => apply_path_pattern(pattern, def, id, data),
        None => def.dir().join(format!("{id}.{output_extension}")),
    }
}

fn apply_path_pattern(pattern: &str, def: &TypeDefinition, id: &str, data: &Fields) -> PathBuf {
    let relative = PATH_PLACEHOLDER_RE.replace_all(pattern, |caps: &regex::Captures| match &caps[1] {
        "id" => id.to_string(),
        "type" => def.name.clone(),
        field => data.get(field).map(path_segment).unwrap_or_default(),
    });
    def.dir().join(relative.as_ref())
}

fn path_segment(value: &Value) -> String {
    match value {
        Value::String(s) => s.replace(['/', '\\'], "-"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
