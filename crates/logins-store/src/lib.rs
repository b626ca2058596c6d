//! logins_store: profile-scoped saved-logins storage.
//!
//! # Layering
//! - `backend` defines the record-store contract: profile-scoped table
//!   addresses plus the four verbs (insert / update / delete / query).
//!   `memory` is the in-process implementation used by tests and embedders
//!   without a native provider.
//! - `db::LoginDb` is the thin per-profile façade. One or two backend
//!   calls per operation; no caching or retry logic; atomicity is per
//!   backend call only.
//! - `storage::LoginStorage` adds the management policy: validation, GUID
//!   and timestamp bookkeeping, duplicate guards, submit-URL scheme
//!   fallback, and change notifications.
//!
//! # Soft delete
//! Removing a login keeps a `(guid, time_deleted)` tombstone in the
//! deleted-logins table so a later sync can reconcile the deletion.
//! `remove_all_logins` wipes both tables; disabled hosts survive.

pub mod backend;
pub mod db;
pub mod error;
pub mod memory;
pub mod models;
pub mod record;
pub mod storage;

pub use backend::{Cursor, DeleteTarget, RecordId, RecordStore, TableAddr};
pub use db::LoginDb;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use models::{Login, LoginUpdate, ProfileTables};
pub use record::{Filter, Record, Value};
pub use storage::{ChangeEvent, LoginQuery, LoginStorage, Match};
