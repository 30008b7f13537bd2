//! Dependency tracking between rendered outputs and the types they query.
//!
//! Each rendered path owns the set of type names its template queries.
//! The set is recomputed on every render and replaces the previous one, so
//! removing a component from a template removes the edge on the next render.
//!
//! The tracker is shared by every task of a watch session. Edge updates take
//! a short write lock; fan-out lookups take a read lock and return owned
//! snapshots, so no lock is ever held across an await point.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::registry::TypeDefinition;
use crate::template::{parse_components, resolve};

/// Types queried by the components of `template`.
///
/// Uses the same tag grammar and target resolution as rendering. Implicit
/// tags contribute their mapped type name even when it is not registered, so
/// registering that type later still reaches this output.
pub fn extract_dependencies(template: &str, context_type: Option<&TypeDefinition>) -> BTreeSet<String> {
    parse_components(template)
        .iter()
        .filter_map(|tag| resolve(tag, context_type).target_type().map(str::to_string))
        .collect()
}

#[derive(Debug, Default)]
struct Edges {
    by_path: BTreeMap<PathBuf, BTreeSet<String>>,
    by_type: BTreeMap<String, BTreeSet<PathBuf>>,
}

/// Type → dependent rendered paths index.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    edges: RwLock<Edges>,
}

impl DependencyTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Edges> {
        self.edges.read().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Edges> {
        self.edges.write().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Replace the edge set of `rendered_path`.
    pub fn record_edges(&self, rendered_path: &Path, type_names: BTreeSet<String>) {
        let mut edges = self.write();
        Self::unlink(&mut edges, rendered_path);
        if type_names.is_empty() {
            return;
        }
        for name in &type_names {
            edges.by_type.entry(name.clone()).or_default().insert(rendered_path.to_path_buf());
        }
        edges.by_path.insert(rendered_path.to_path_buf(), type_names);
    }

    /// Drop every edge of `rendered_path`.
    pub fn remove_path(&self, rendered_path: &Path) {
        let mut edges = self.write();
        Self::unlink(&mut edges, rendered_path);
    }

    fn unlink(edges: &mut Edges, rendered_path: &Path) {
        let Some(old) = edges.by_path.remove(rendered_path) else {
            return;
        };
        for name in old {
            if let Some(paths) = edges.by_type.get_mut(&name) {
                paths.remove(rendered_path);
                if paths.is_empty() {
                    edges.by_type.remove(&name);
                }
            }
        }
    }

    /// Rendered paths whose templates query `type_name`.
    pub fn dependents_of(&self, type_name: &str) -> BTreeSet<PathBuf> {
        self.read().by_type.get(type_name).cloned().unwrap_or_default()
    }

    /// Types queried by `rendered_path`.
    pub fn dependencies_of(&self, rendered_path: &Path) -> BTreeSet<String> {
        self.read().by_path.get(rendered_path).cloned().unwrap_or_default()
    }

    /// Full type → paths index, for reporting.
    pub fn snapshot(&self) -> BTreeMap<String, BTreeSet<PathBuf>> {
        self.read().by_type.clone()
    }
}
