//! In-process [`Store`] implementation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{Query, Record, Row, Store, compare_values};
use crate::constants::{STATUS_DELETED, STATUS_FIELD};
use crate::core::SyncError;

/// Rows of one namespace, keyed by `(type, id)`.
type Partition = BTreeMap<(String, String), Row>;

/// A namespace-partitioned in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    partitions: RwLock<HashMap<String, Partition>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a row by identity, soft-deleted rows included.
    pub async fn get(&self, namespace: &str, type_name: &str, id: &str) -> Option<Row> {
        let partitions = self.partitions.read().await;
        partitions.get(namespace)?.get(&(type_name.to_string(), id.to_string())).cloned()
    }

    /// Number of live rows in a namespace.
    pub async fn len(&self, namespace: &str) -> usize {
        let partitions = self.partitions.read().await;
        partitions.get(namespace).map_or(0, |p| p.values().filter(|r| !is_deleted(r)).count())
    }
}

fn is_deleted(row: &Row) -> bool {
    row.get(STATUS_FIELD).and_then(|v| v.as_str()) == Some(STATUS_DELETED)
}

/// Sort rows by `field`; rows missing the field sort last, ties break on id.
fn sort_rows(rows: &mut [Row], field: &str, descending: bool) {
    rows.sort_by(|a, b| {
        let primary = match (a.get(field), b.get(field)) {
            (Some(x), Some(y)) => {
                let ord = compare_values(x, y).unwrap_or(Ordering::Equal);
                if descending { ord.reverse() } else { ord }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        primary.then_with(|| {
            let ida = a.get("id").and_then(|v| v.as_str()).unwrap_or_default();
            let idb = b.get("id").and_then(|v| v.as_str()).unwrap_or_default();
            ida.cmp(idb)
        })
    });
}

impl Store for MemoryStore {
    async fn upsert(&self, record: Record<'_>) -> Result<(), SyncError> {
        let row = record.to_row();
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(record.namespace.to_string())
            .or_default()
            .insert((record.type_name.to_string(), record.id.to_string()), row);
        Ok(())
    }

    async fn query(&self, namespace: &str, query: &Query) -> Result<Vec<Row>, SyncError> {
        let partitions = self.partitions.read().await;
        let Some(partition) = partitions.get(namespace) else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<Row> = partition
            .values()
            .filter(|row| !is_deleted(row) && query.filter.matches(row))
            .cloned()
            .collect();
        drop(partitions);

        sort_rows(&mut rows, &query.order_by.field, query.order_by.descending);
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn soft_delete(&self, namespace: &str, type_name: &str, id: &str) -> Result<bool, SyncError> {
        let mut partitions = self.partitions.write().await;
        let row = partitions
            .get_mut(namespace)
            .and_then(|p| p.get_mut(&(type_name.to_string(), id.to_string())));
        match row {
            Some(row) if !is_deleted(row) => {
                row.insert(STATUS_FIELD.into(), STATUS_DELETED.into());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
