//! The backing store collaborator.
//!
//! The engine only needs three operations from a store: upsert an instance,
//! query rows by a [`Filter`], and soft-delete. Everything else about the
//! store (dialect, connections, persistence) stays behind the [`Store`]
//! trait. [`MemoryStore`] is the in-process implementation used by the CLI
//! and the test suite.
//!
//! Rows are ordered field maps: the instance's data fields followed by the
//! reserved `id`, `type`, `ns` and `content` columns.

pub mod filter;
pub mod memory;

use std::fmt;
use std::future::Future;

use crate::constants::DEFAULT_ORDER_BY;
use crate::core::SyncError;
use crate::markdown::Fields;

pub use filter::{CmpOp, Filter, compare_values};
pub use memory::MemoryStore;

/// A single result row.
pub type Row = Fields;

/// Sort key for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Field to sort on.
    pub field: String,
    /// Sort descending instead of ascending.
    pub descending: bool,
}

impl OrderBy {
    /// Ascending order on `field`.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    /// Parse `field`, `field asc` or `field desc`.
    pub fn parse(spec: &str) -> Result<Self, SyncError> {
        let mut parts = spec.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| SyncError::query("orderBy must name a field"))?
            .to_string();
        let descending = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => false,
            Some("desc") => true,
            Some(other) => {
                return Err(SyncError::query(format!(
                    "invalid orderBy direction `{other}`, expected asc or desc"
                )));
            }
        };
        if let Some(extra) = parts.next() {
            return Err(SyncError::query(format!("unexpected `{extra}` in orderBy `{spec}`")));
        }
        Ok(Self {
            field,
            descending,
        })
    }
}

impl Default for OrderBy {
    fn default() -> Self {
        Self::asc(DEFAULT_ORDER_BY)
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, if self.descending { "DESC" } else { "ASC" })
    }
}

/// A read-only query against one namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Row predicate.
    pub filter: Filter,
    /// Sort key.
    pub order_by: OrderBy,
    /// Maximum number of rows.
    pub limit: Option<usize>,
}

impl Query {
    /// Query matching `filter`, ordered by id.
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            order_by: OrderBy::default(),
            limit: None,
        }
    }

    /// Set the sort key.
    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    /// Cap the number of rows.
    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WHERE {} ORDER BY {}", self.filter, self.order_by)?;
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        Ok(())
    }
}

/// Identity and payload of an instance written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<'a> {
    /// Namespace partition.
    pub namespace: &'a str,
    /// Type name.
    pub type_name: &'a str,
    /// Instance id, unique within namespace and type.
    pub id: &'a str,
    /// Effective data fields.
    pub data: &'a Fields,
    /// Free-text content.
    pub content: &'a str,
}

impl Record<'_> {
    /// Build the row stored for this record.
    pub fn to_row(&self) -> Row {
        let mut row: Row = self
            .data
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "id" | "type" | "ns" | "content"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        row.insert("id".into(), self.id.into());
        row.insert("type".into(), self.type_name.into());
        row.insert("ns".into(), self.namespace.into());
        row.insert("content".into(), self.content.into());
        row
    }
}

/// Storage backend consumed by the engine.
///
/// Implementations must be safe to share across tasks; the engine holds one
/// behind an `Arc` for the life of a watch session.
pub trait Store: Send + Sync + 'static {
    /// Insert or replace an instance. Clears a previous soft-delete.
    fn upsert(&self, record: Record<'_>) -> impl Future<Output = Result<(), SyncError>> + Send;

    /// Return rows of `namespace` matching `query`, excluding soft-deleted rows.
    fn query(
        &self,
        namespace: &str,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<Row>, SyncError>> + Send;

    /// Mark an instance deleted. Returns whether a live row was found.
    fn soft_delete(
        &self,
        namespace: &str,
        type_name: &str,
        id: &str,
    ) -> impl Future<Output = Result<bool, SyncError>> + Send;
}
