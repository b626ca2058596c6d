//! In-process record store.
//!
//! Backs the façade when no native provider is wired in: test runs and
//! embedders that keep logins in memory. Ids are assigned per table,
//! starting at 1, and rows iterate in id order. `set_offline` simulates a
//! lost backend connection: queries report unavailable and mutations fail
//! until the store is brought back online.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::backend::{Cursor, DeleteTarget, RecordId, RecordStore, TableAddr};
use crate::error::StoreError;
use crate::record::{Filter, Record};

#[derive(Debug, Default)]
struct Table {
    next_id: RecordId,
    rows: BTreeMap<RecordId, Record>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    fn check_record(table: &TableAddr, record: &Record) -> Result<(), StoreError> {
        for column in record.columns() {
            if !table.has_column(column) {
                return Err(StoreError::UnknownColumn {
                    table: table.qualified(),
                    column: column.to_string(),
                });
            }
        }
        Ok(())
    }

    fn check_filter(table: &TableAddr, filter: &Filter) -> Result<(), StoreError> {
        for term in filter.terms() {
            if !table.has_column(term.column()) {
                return Err(StoreError::UnknownColumn {
                    table: table.qualified(),
                    column: term.column().to_string(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, table: &TableAddr, record: &Record) -> Result<RecordId, StoreError> {
        if self.is_offline() {
            return Err(StoreError::Unavailable);
        }
        Self::check_record(table, record)?;

        let mut tables = self.tables.write();
        let entry = tables.entry(table.qualified()).or_default();
        entry.next_id += 1;
        let id = entry.next_id;

        let mut row = record.clone();
        row.put_integer(crate::models::schema::ID, id);
        entry.rows.insert(id, row);
        Ok(id)
    }

    async fn update(
        &self,
        table: &TableAddr,
        id: RecordId,
        record: &Record,
    ) -> Result<u64, StoreError> {
        if self.is_offline() {
            return Err(StoreError::Unavailable);
        }
        Self::check_record(table, record)?;

        let mut tables = self.tables.write();
        let Some(entry) = tables.get_mut(&table.qualified()) else {
            return Ok(0);
        };
        match entry.rows.get_mut(&id) {
            Some(row) => {
                row.merge(record);
                row.put_integer(crate::models::schema::ID, id);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete(
        &self,
        table: &TableAddr,
        target: DeleteTarget<'_>,
    ) -> Result<u64, StoreError> {
        if self.is_offline() {
            return Err(StoreError::Unavailable);
        }

        let mut tables = self.tables.write();
        let Some(entry) = tables.get_mut(&table.qualified()) else {
            return Ok(0);
        };
        let removed = match target {
            DeleteTarget::ById(id) => entry.rows.remove(&id).map_or(0, |_| 1),
            DeleteTarget::Matching(filter) => {
                Self::check_filter(table, filter)?;
                let before = entry.rows.len();
                entry.rows.retain(|_, row| !filter.matches(row));
                (before - entry.rows.len()) as u64
            }
            DeleteTarget::All => {
                let count = entry.rows.len() as u64;
                entry.rows.clear();
                count
            }
        };
        debug!("deleted {} row(s) from {}", removed, table);
        Ok(removed)
    }

    async fn query(
        &self,
        table: &TableAddr,
        filter: Option<&Filter>,
        limit: Option<u32>,
    ) -> Result<Option<Cursor>, StoreError> {
        if self.is_offline() {
            return Ok(None);
        }
        if let Some(filter) = filter {
            Self::check_filter(table, filter)?;
        }

        let tables = self.tables.read();
        let rows: Vec<Record> = match tables.get(&table.qualified()) {
            Some(entry) => entry
                .rows
                .values()
                .filter(|row| filter.map_or(true, |f| f.matches(row)))
                .take(limit.map_or(usize::MAX, |n| n as usize))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(Some(Cursor::from_rows(rows)))
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::backend::{DeleteTarget, RecordStore, TableAddr};
    use crate::error::StoreError;
    use crate::record::{Filter, Record, Value};

    fn hosts_table() -> TableAddr {
        TableAddr::new("logins_disabled_hosts", "test", &["id", "hostname"])
    }

    fn host_row(hostname: &str) -> Record {
        let mut record = Record::new();
        record.put_text("hostname", hostname);
        record
    }

    #[tokio::test]
    async fn ids_are_assigned_per_table_starting_at_one() {
        let store = MemoryStore::new();
        let table = hosts_table();

        let first = store.insert(&table, &host_row("a.com")).await.expect("insert");
        let second = store.insert(&table, &host_row("b.com")).await.expect("insert");
        assert_eq!(first, 1);
        assert_eq!(second, 2);

        let other = TableAddr::new("logins", "test", &["id", "hostname"]);
        let third = store.insert(&other, &host_row("c.com")).await.expect("insert");
        assert_eq!(third, 1);
    }

    #[tokio::test]
    async fn query_filters_and_caps_rows() {
        let store = MemoryStore::new();
        let table = hosts_table();
        for host in ["a.com", "b.com", "a.com"] {
            store.insert(&table, &host_row(host)).await.expect("insert");
        }

        let filter = Filter::new().eq("hostname", Value::text("a.com"));
        let cursor = store
            .query(&table, Some(&filter), None)
            .await
            .expect("query")
            .expect("cursor");
        assert_eq!(cursor.remaining(), 2);

        let capped = store
            .query(&table, Some(&filter), Some(1))
            .await
            .expect("query")
            .expect("cursor");
        assert_eq!(capped.remaining(), 1);
    }

    #[tokio::test]
    async fn unknown_column_is_rejected() {
        let store = MemoryStore::new();
        let table = hosts_table();

        let mut bad_row = Record::new();
        bad_row.put_text("nonsense", "x");
        let err = store.insert(&table, &bad_row).await.expect_err("must fail");
        assert!(matches!(err, StoreError::UnknownColumn { .. }));

        let bad_filter = Filter::new().eq("nonsense", Value::text("x"));
        let err = store
            .query(&table, Some(&bad_filter), None)
            .await
            .expect_err("must fail");
        assert!(matches!(err, StoreError::UnknownColumn { .. }));
    }

    #[tokio::test]
    async fn delete_targets() {
        let store = MemoryStore::new();
        let table = hosts_table();
        let id = store.insert(&table, &host_row("a.com")).await.expect("insert");
        store.insert(&table, &host_row("b.com")).await.expect("insert");
        store.insert(&table, &host_row("b.com")).await.expect("insert");

        assert_eq!(store.delete(&table, DeleteTarget::ById(id)).await.expect("delete"), 1);
        assert_eq!(store.delete(&table, DeleteTarget::ById(id)).await.expect("delete"), 0);

        let filter = Filter::new().eq("hostname", Value::text("b.com"));
        assert_eq!(
            store.delete(&table, DeleteTarget::Matching(&filter)).await.expect("delete"),
            2
        );

        store.insert(&table, &host_row("c.com")).await.expect("insert");
        assert_eq!(store.delete(&table, DeleteTarget::All).await.expect("delete"), 1);
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryStore::new();
        let table = hosts_table();
        store.insert(&table, &host_row("a.com")).await.expect("insert");

        store.set_offline(true);
        assert!(store.query(&table, None, None).await.expect("query").is_none());
        assert!(matches!(
            store.insert(&table, &host_row("b.com")).await,
            Err(StoreError::Unavailable)
        ));

        store.set_offline(false);
        let cursor = store.query(&table, None, None).await.expect("query").expect("cursor");
        assert_eq!(cursor.remaining(), 1);
    }
}
