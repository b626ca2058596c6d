//! The record-store contract the login façade delegates to.
//!
//! Anything that can address profile-scoped tables and run the four verbs
//! (insert / update / delete / query) can back the store: the in-process
//! `MemoryStore`, or a native provider on the embedding platform. The
//! façade performs no retries and no result translation; backend failures
//! reach the caller as-is.

use std::fmt;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{Filter, Record};

/// Store-assigned numeric row id.
pub type RecordId = i64;

/// Profile name used when the caller passes an empty one.
pub const DEFAULT_PROFILE: &str = "default";

/// A resolved, profile-scoped table address.
///
/// Addresses are built once at construction and reused for every call.
/// Each address carries its table's column set so a backend can reject
/// filters and rows naming a column the table does not have.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableAddr {
    name: &'static str,
    profile: String,
    columns: &'static [&'static str],
}

impl TableAddr {
    pub fn new(name: &'static str, profile: &str, columns: &'static [&'static str]) -> Self {
        let profile = if profile.is_empty() {
            DEFAULT_PROFILE.to_string()
        } else {
            profile.to_string()
        };
        Self { name, profile, columns }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn columns(&self) -> &'static [&'static str] {
        self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(&column)
    }

    /// Fully-qualified address, e.g. `logins/default`.
    pub fn qualified(&self) -> String {
        format!("{}/{}", self.name, self.profile)
    }
}

impl fmt::Display for TableAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.profile)
    }
}

/// Row target for `delete`.
#[derive(Debug, Clone)]
pub enum DeleteTarget<'a> {
    ById(RecordId),
    Matching(&'a Filter),
    All,
}

/// Forward-only result sequence.
///
/// Dropping the cursor releases it; `close` exists for call sites that want
/// the release to be visible.
#[derive(Debug)]
pub struct Cursor {
    rows: std::vec::IntoIter<Record>,
}

impl Cursor {
    pub fn from_rows(rows: Vec<Record>) -> Self {
        Self { rows: rows.into_iter() }
    }

    /// Rows not yet consumed.
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    pub fn close(self) {}
}

impl Iterator for Cursor {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.rows.next()
    }
}

/// Durable tabular storage addressable by typed filters.
///
/// `query` distinguishes an unavailable backend (`Ok(None)`) from an empty
/// result (`Ok(Some(cursor))` with no rows); callers must handle both.
/// `update` and `delete` report a missing target as zero rows affected,
/// never as an error.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a row and return its store-assigned id.
    async fn insert(&self, table: &TableAddr, record: &Record) -> Result<RecordId, StoreError>;

    /// Overwrite the supplied columns on the row `id`. Returns rows affected.
    async fn update(&self, table: &TableAddr, id: RecordId, record: &Record)
        -> Result<u64, StoreError>;

    /// Delete the targeted rows. Returns rows affected.
    async fn delete(&self, table: &TableAddr, target: DeleteTarget<'_>)
        -> Result<u64, StoreError>;

    /// Read rows matching `filter` (all rows when `None`), capped to `limit`.
    async fn query(
        &self,
        table: &TableAddr,
        filter: Option<&Filter>,
        limit: Option<u32>,
    ) -> Result<Option<Cursor>, StoreError>;
}
