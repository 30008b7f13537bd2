//! Type registry: parsed `[TypeName]` definitions and their relationships.
//!
//! The registry is built from every type-definition document in the content
//! tree and is replaced wholesale when a definition changes. Readers take a
//! cheap `Arc` snapshot, so a reload never blocks an in-flight render.
//!
//! # Type definitions
//!
//! ```text
//! ---
//! $output: true          # optional, defaults to "template is non-blank"
//! $path: "../out/{id}.md" # optional output path pattern
//! $ns: blog              # optional namespace for all instances
//! title: Untitled        # schema default
//! topic: Topic.posts     # relationship declaration
//! ---
//! # {data.title}
//!
//! <Related field="topic" />
//! ```

pub mod graph;
pub mod instance;
pub mod relationships;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::SyncError;
use crate::deps::extract_dependencies;
use crate::markdown::{Document, Fields};

pub use graph::{TypeGraph, format_cycle};
pub use instance::{Instance, row_output_path};
pub use relationships::{
    Cardinality, Relationship, component_name_to_type, parse_relationship_value, pluralize,
    to_field_name,
};

/// A parsed type-definition document. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    /// Unique type name from the `[Name]` file name.
    pub name: String,
    /// Ordered field defaults, directives excluded.
    pub schema_defaults: Fields,
    /// Explicit relationships declared in the schema.
    pub relationships: Vec<Relationship>,
    /// Template text (the document body).
    pub template: String,
    /// Whether instances get a rendered output file.
    pub generates_output: bool,
    /// Output path pattern relative to the definition's directory.
    pub path_pattern: Option<String>,
    /// Namespace applied to instances without their own `$ns`.
    pub namespace: Option<String>,
    /// Definition document location.
    pub source_path: PathBuf,
}

impl TypeDefinition {
    /// Build a definition from a parsed `[Name].<ext>` document.
    pub fn from_document(doc: &Document) -> Result<Self, SyncError> {
        let name = doc.type_definition_name().ok_or_else(|| {
            SyncError::parse(doc.path.display(), "not a [TypeName] definition file")
        })?;

        let schema_defaults = doc.data_fields();
        let relationships = relationships::resolve(&schema_defaults);
        let generates_output =
            doc.directive_bool("$output").unwrap_or_else(|| !doc.body.trim().is_empty());

        Ok(Self {
            name,
            relationships,
            template: doc.body.clone(),
            generates_output,
            path_pattern: doc.directive_str("$path").map(str::to_string),
            namespace: doc.directive_str("$ns").map(str::to_string),
            source_path: doc.path.clone(),
            schema_defaults,
        })
    }

    /// Directory containing the definition document.
    pub fn dir(&self) -> &Path {
        self.source_path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Look up an explicit relationship by field name.
    pub fn relationship(&self, field: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.field == field)
    }

    /// Schema defaults that instances inherit as data.
    ///
    /// Relationship declarations are excluded: they describe the link, they
    /// are not a value.
    pub fn default_data(&self) -> Fields {
        self.schema_defaults
            .iter()
            .filter(|(field, _)| self.relationship(field).is_none())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// All known type definitions, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, Arc<TypeDefinition>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a set of documents.
    ///
    /// Non-definition documents are ignored. Definitions are inserted in the
    /// given order, so a duplicate name keeps the last one.
    pub fn load(documents: &[Document]) -> Self {
        let mut registry = Self::new();
        for doc in documents {
            if doc.type_definition_name().is_none() {
                continue;
            }
            match TypeDefinition::from_document(doc) {
                Ok(def) => {
                    registry.insert(def);
                }
                Err(e) => warn!("Skipping type definition: {e}"),
            }
        }
        registry
    }

    /// Insert or replace a definition, returning the replaced one.
    pub fn insert(&mut self, def: TypeDefinition) -> Option<Arc<TypeDefinition>> {
        debug!("Registering type '{}' from {}", def.name, def.source_path.display());
        let previous = self.types.insert(def.name.clone(), Arc::new(def));
        if let Some(prev) = &previous
            && let Some(current) = self.types.get(&prev.name)
            && prev.source_path != current.source_path
        {
            warn!(
                "Duplicate type '{}': {} overrides {}",
                prev.name,
                current.source_path.display(),
                prev.source_path.display()
            );
        }
        previous
    }

    /// Remove the definition loaded from `path`, returning its name.
    pub fn remove_path(&mut self, path: &Path) -> Option<String> {
        let name = self
            .types
            .iter()
            .find(|(_, def)| def.source_path == path)
            .map(|(name, _)| name.clone())?;
        self.types.remove(&name);
        Some(name)
    }

    /// Look up a definition by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<TypeDefinition>> {
        self.types.get(name).cloned()
    }

    /// The single definition living directly in `dir`, if exactly one does.
    pub fn type_for_directory(&self, dir: &Path) -> Option<Arc<TypeDefinition>> {
        let mut candidates = self.types.values().filter(|def| def.dir() == dir);
        let first = candidates.next()?;
        if candidates.next().is_some() {
            return None;
        }
        Some(Arc::clone(first))
    }

    /// Closest registered name to `name`, for "did you mean" hints.
    pub fn suggest(&self, name: &str) -> Option<String> {
        self.types
            .keys()
            .map(|candidate| (strsim::jaro_winkler(name, candidate), candidate))
            .filter(|(score, _)| *score >= 0.8)
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, candidate)| candidate.clone())
    }

    /// Registered definitions in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TypeDefinition>> {
        self.types.values()
    }

    /// Registered type names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are registered.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Build the type-level dependency graph from every template.
    pub fn graph(&self) -> TypeGraph {
        let mut graph = TypeGraph::new();
        for def in self.types.values() {
            graph.add_type(&def.name);
            for target in extract_dependencies(&def.template, Some(def)) {
                graph.add_dependency(&def.name, &target);
            }
        }
        graph
    }

    /// Log a warning if the registered templates depend on each other in a cycle.
    pub fn warn_on_cycles(&self) {
        if let Some(cycle) = self.graph().find_cycle() {
            warn!(
                "Type templates form a dependency cycle: {}. Each change renders every dependent once.",
                format_cycle(&cycle)
            );
        }
    }
}
