//! Global constants used throughout the mdxdb codebase.
//!
//! This module contains rendering tables, file conventions, and the tunable
//! defaults for the sync loop. Defining them centrally keeps magic numbers
//! and magic strings discoverable.

use std::time::Duration;

/// Name of the project configuration file looked up at the project root.
pub const CONFIG_FILE_NAME: &str = "mdxdb.toml";

/// Environment variable overriding the configured namespace.
pub const NAMESPACE_ENV_VAR: &str = "MDXDB_NAMESPACE";

/// Default extension of structured source documents.
pub const DEFAULT_SOURCE_EXTENSION: &str = "mdx";

/// Default extension of rendered output documents.
pub const DEFAULT_OUTPUT_EXTENSION: &str = "md";

/// Default debounce window for external edits to rendered files (150ms).
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

/// Default debounce window as a [`Duration`].
pub fn default_debounce() -> Duration {
    Duration::from_millis(DEFAULT_DEBOUNCE_MS)
}

/// Minimum fraction of relocated anchors required before an edit is merged.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// Columns sorted first in horizontal tables, in this order.
pub const FIELD_PRIORITY: &[&str] =
    &["title", "name", "date", "author", "description", "tags", "category"];

/// Columns sorted last in horizontal tables, in this order.
pub const FIELD_LOW_PRIORITY: &[&str] = &["id", "type", "ns", "content"];

/// Irregular plurals checked before the suffix rules when mapping a tag name
/// to a type name.
pub const IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("People", "Person"),
    ("Children", "Child"),
    ("Men", "Man"),
    ("Women", "Woman"),
    ("Mice", "Mouse"),
    ("Geese", "Goose"),
    ("Feet", "Foot"),
    ("Teeth", "Tooth"),
    ("Data", "Datum"),
    ("Criteria", "Criterion"),
    ("Analyses", "Analysis"),
    ("Indices", "Index"),
    ("Categories", "Category"),
];

/// Row field holding the soft-delete marker.
pub const STATUS_FIELD: &str = "status";

/// Value of [`STATUS_FIELD`] for soft-deleted rows.
pub const STATUS_DELETED: &str = "deleted";

/// Default row format for `<List>` components.
pub const DEFAULT_LIST_FORMAT: &str = "- {id}";

/// Default sort column for component queries.
pub const DEFAULT_ORDER_BY: &str = "id";

/// Glob patterns ignored by the watcher unless configured otherwise.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &["**/.git/**", "**/node_modules/**", "**/target/**"];
