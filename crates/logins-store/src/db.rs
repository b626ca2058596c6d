//! Profile-scoped login store façade.
//!
//! `LoginDb` owns nothing but the resolved table addresses and a handle to
//! the record backend; every operation is one or two backend calls with no
//! caching or retry logic in between. Removing a login keeps a tombstone
//! row in the deleted-logins table so a later sync can reconcile the
//! deletion.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::backend::{Cursor, DeleteTarget, RecordId, RecordStore};
use crate::error::StoreError;
use crate::models::{schema, validate_hostname, Login, LoginUpdate, ProfileTables};
use crate::record::{Filter, Record, Value};

/// Central store handle. Cheap to clone (Arc internally).
#[derive(Clone)]
pub struct LoginDb {
    store: Arc<dyn RecordStore>,
    tables: ProfileTables,
}

impl LoginDb {
    /// Build a façade over `store` with already-resolved table addresses.
    pub fn new(store: Arc<dyn RecordStore>, tables: ProfileTables) -> Self {
        Self { store, tables }
    }

    /// Resolve the three addresses for `profile` and build.
    pub fn with_profile(store: Arc<dyn RecordStore>, profile: &str) -> Self {
        Self::new(store, ProfileTables::for_profile(profile))
    }

    pub fn tables(&self) -> &ProfileTables {
        &self.tables
    }

    /// Insert a new login row and return its id.
    ///
    /// Field validation runs here; dedup does not. A caller-supplied guid
    /// clears any matching tombstone first.
    pub async fn add_login(&self, login: &Login) -> Result<RecordId, StoreError> {
        login.validate()?;

        if let Some(guid) = login.guid.as_deref() {
            let filter = Filter::new().eq(schema::deleted_logins::GUID, Value::text(guid));
            let cleared = self
                .store
                .delete(&self.tables.deleted_logins, DeleteTarget::Matching(&filter))
                .await?;
            if cleared > 0 {
                debug!("cleared {} tombstone(s) for guid {}", cleared, guid);
            }
        }

        let id = self.store.insert(&self.tables.logins, &login.to_record()).await?;
        debug!("added login {} for {}", id, login.hostname);
        Ok(id)
    }

    /// Delete the login row `id`, keeping a tombstone.
    ///
    /// The tombstone write and the delete are two separate store calls;
    /// atomicity is per call only. A missing id deletes nothing and is not
    /// an error.
    pub async fn remove_login(&self, id: RecordId) -> Result<(), StoreError> {
        let filter = Filter::new().eq(schema::ID, Value::Integer(id));
        let row = match self
            .store
            .query(&self.tables.logins, Some(&filter), Some(1))
            .await?
        {
            Some(mut cursor) => cursor.next(),
            None => None,
        };

        if let Some(row) = row {
            let mut tombstone = Record::new();
            if let Some(guid) = row.text(schema::logins::GUID) {
                tombstone.put_text(schema::deleted_logins::GUID, guid);
            }
            tombstone.put_integer(
                schema::deleted_logins::TIME_DELETED,
                Utc::now().timestamp_millis(),
            );
            self.store.insert(&self.tables.deleted_logins, &tombstone).await?;
        }

        let removed = self
            .store
            .delete(&self.tables.logins, DeleteTarget::ById(id))
            .await?;
        debug!("removed {} login row(s) for id {}", removed, id);
        Ok(())
    }

    /// Overwrite only the supplied fields on the login row `id`. A missing
    /// id reports zero rows affected, silently.
    pub async fn modify_login(&self, id: RecordId, update: &LoginUpdate) -> Result<u64, StoreError> {
        let affected = self
            .store
            .update(&self.tables.logins, id, update.as_record())
            .await?;
        debug!("modified {} login row(s) for id {}", affected, id);
        Ok(affected)
    }

    /// Unconditionally clear the live and tombstone tables for this
    /// profile. Disabled hosts are left untouched.
    pub async fn remove_all_logins(&self) -> Result<(), StoreError> {
        let live = self
            .store
            .delete(&self.tables.logins, DeleteTarget::All)
            .await?;
        let tombstones = self
            .store
            .delete(&self.tables.deleted_logins, DeleteTarget::All)
            .await?;
        info!("cleared all logins ({} live, {} tombstones)", live, tombstones);
        Ok(())
    }

    /// Number of live login rows. An unavailable backend counts as zero
    /// rather than failing.
    pub async fn count_logins(&self) -> Result<u64, StoreError> {
        match self.store.query(&self.tables.logins, None, None).await? {
            Some(cursor) => Ok(cursor.remaining() as u64),
            None => Ok(0),
        }
    }

    /// Filtered read of the logins table. `Ok(None)` is the backend's
    /// unavailable sentinel, distinct from an empty cursor; callers must
    /// handle both.
    pub async fn search_logins(&self, filter: Option<&Filter>) -> Result<Option<Cursor>, StoreError> {
        self.store.query(&self.tables.logins, filter, None).await
    }

    /// Every disabled-host row for this profile.
    pub async fn get_all_disabled_hosts(&self) -> Result<Option<Cursor>, StoreError> {
        self.store.query(&self.tables.disabled_hosts, None, None).await
    }

    /// Disabled-host lookup. With a hostname, at most one row comes back;
    /// with `None` every row does.
    pub async fn get_logins_saved_enabled(
        &self,
        hostname: Option<&str>,
    ) -> Result<Option<Cursor>, StoreError> {
        match hostname {
            Some(host) => {
                let filter =
                    Filter::new().eq(schema::disabled_hosts::HOSTNAME, Value::text(host));
                self.store
                    .query(&self.tables.disabled_hosts, Some(&filter), Some(1))
                    .await
            }
            None => self.store.query(&self.tables.disabled_hosts, None, None).await,
        }
    }

    /// Flip the saving policy for one hostname. Saving is enabled by
    /// default; disabling inserts a marker row. Disabling is idempotent:
    /// any existing entry is replaced, never duplicated.
    pub async fn set_login_saving_enabled(
        &self,
        hostname: &str,
        enabled: bool,
    ) -> Result<(), StoreError> {
        validate_hostname(hostname)?;

        let filter = Filter::new().eq(schema::disabled_hosts::HOSTNAME, Value::text(hostname));
        self.store
            .delete(&self.tables.disabled_hosts, DeleteTarget::Matching(&filter))
            .await?;

        if !enabled {
            let mut record = Record::new();
            record.put_text(schema::disabled_hosts::HOSTNAME, hostname);
            self.store.insert(&self.tables.disabled_hosts, &record).await?;
        }
        debug!(
            "login saving {} for {}",
            if enabled { "enabled" } else { "disabled" },
            hostname
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::LoginDb;
    use crate::backend::RecordStore;
    use crate::memory::MemoryStore;
    use crate::models::{schema, Login, LoginUpdate};
    use crate::record::{Filter, Value};

    fn login(host: &str, user: &str) -> Login {
        let mut login = Login::new(
            host,
            Some(host),
            None,
            user,
            "enc-pass",
            "username",
            "password",
        );
        login.guid = Some(format!("guid-{user}"));
        login
    }

    fn db() -> LoginDb {
        LoginDb::with_profile(Arc::new(MemoryStore::new()), "test")
    }

    #[tokio::test]
    async fn remove_login_leaves_a_tombstone() {
        let db = db();
        let id = db.add_login(&login("https://example.com", "a")).await.expect("add");
        assert_eq!(db.count_logins().await.expect("count"), 1);

        db.remove_login(id).await.expect("remove");
        assert_eq!(db.count_logins().await.expect("count"), 0);

        let filter = Filter::new().eq(schema::deleted_logins::GUID, Value::text("guid-a"));
        let mut tombstones = db
            .store
            .query(&db.tables.deleted_logins, Some(&filter), None)
            .await
            .expect("query")
            .expect("cursor");
        let tombstone = tombstones.next().expect("tombstone row");
        assert!(tombstone.integer(schema::deleted_logins::TIME_DELETED).expect("time") > 0);
    }

    #[tokio::test]
    async fn re_adding_a_guid_clears_its_tombstone() {
        let db = db();
        let entry = login("https://example.com", "a");
        let id = db.add_login(&entry).await.expect("add");
        db.remove_login(id).await.expect("remove");

        db.add_login(&entry).await.expect("re-add");

        let tombstones = db
            .store
            .query(&db.tables.deleted_logins, None, None)
            .await
            .expect("query")
            .expect("cursor");
        assert_eq!(tombstones.remaining(), 0);
    }

    #[tokio::test]
    async fn remove_unknown_id_is_silent_and_writes_no_tombstone() {
        let db = db();
        db.remove_login(42).await.expect("remove");

        let tombstones = db
            .store
            .query(&db.tables.deleted_logins, None, None)
            .await
            .expect("query")
            .expect("cursor");
        assert_eq!(tombstones.remaining(), 0);
    }

    #[tokio::test]
    async fn modify_unknown_id_reports_zero_rows() {
        let db = db();
        let affected = db
            .modify_login(42, &LoginUpdate::new().encrypted_password("enc"))
            .await
            .expect("modify");
        assert_eq!(affected, 0);
    }

    #[tokio::test]
    async fn disabling_twice_keeps_one_entry() {
        let db = db();
        db.set_login_saving_enabled("example.com", false).await.expect("disable");
        db.set_login_saving_enabled("example.com", false).await.expect("disable again");

        let hosts = db
            .get_all_disabled_hosts()
            .await
            .expect("query")
            .expect("cursor");
        assert_eq!(hosts.remaining(), 1);
    }

    #[tokio::test]
    async fn hostname_lookup_is_capped_to_one_row_but_all_rows_are_not() {
        let db = db();
        db.set_login_saving_enabled("a.com", false).await.expect("disable");
        db.set_login_saving_enabled("b.com", false).await.expect("disable");

        let capped = db
            .get_logins_saved_enabled(Some("a.com"))
            .await
            .expect("query")
            .expect("cursor");
        assert_eq!(capped.remaining(), 1);

        let all = db
            .get_logins_saved_enabled(None)
            .await
            .expect("query")
            .expect("cursor");
        assert_eq!(all.remaining(), 2);
    }
}
