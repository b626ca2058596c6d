//! Login management layer above the façade.
//!
//! Owns the policy the thin façade deliberately leaves out: GUID
//! assignment and uniqueness, timestamp bookkeeping, duplicate guards, the
//! http/https submit-URL fallback used by form autofill, and change
//! notifications over a broadcast channel.
//!
//! Read operations treat an unavailable backend as an empty result set,
//! logged at warn level.

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::backend::RecordId;
use crate::db::LoginDb;
use crate::error::StoreError;
use crate::models::{schema, Login, LoginUpdate};
use crate::record::{Filter, Value};

/// Emitted on every successful mutation. Subscribe before mutating;
/// events sent while no receiver exists are dropped.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    LoginAdded(Login),
    LoginRemoved(Login),
    LoginModified { old: Login, new: Login },
    AllLoginsRemoved,
    HostSavingEnabled(String),
    HostSavingDisabled(String),
}

/// One search constraint: match a concrete value or require NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match<T> {
    Is(T),
    Null,
}

/// Typed match criteria for [`LoginStorage::search_logins`]. Unset fields
/// do not constrain.
///
/// `form_submit_url` is special: a concrete value is matched after the
/// query, because a stored empty submit URL matches anything and an
/// http/https scheme flip on the same host:port is accepted as a fallback
/// when no exact match exists.
#[derive(Debug, Clone, Default)]
pub struct LoginQuery {
    pub id: Option<RecordId>,
    pub hostname: Option<Match<String>>,
    pub http_realm: Option<Match<String>>,
    pub form_submit_url: Option<Match<String>>,
    pub username_field: Option<Match<String>>,
    pub password_field: Option<Match<String>>,
    pub encrypted_username: Option<Match<String>>,
    pub encrypted_password: Option<Match<String>>,
    pub guid: Option<Match<String>>,
    pub enc_type: Option<i64>,
    pub time_created: Option<i64>,
    pub time_last_used: Option<i64>,
    pub time_password_changed: Option<i64>,
    pub times_used: Option<i64>,
}

impl LoginQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_guid(guid: &str) -> Self {
        Self {
            guid: Some(Match::Is(guid.to_string())),
            ..Self::default()
        }
    }

    pub fn by_id(id: RecordId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    /// Backend filter for every criterion except a concrete submit URL.
    fn to_filter(&self) -> Filter {
        use schema::logins as col;
        let mut filter = Filter::new();
        if let Some(id) = self.id {
            filter = filter.eq(schema::ID, Value::Integer(id));
        }
        for (column, criterion) in [
            (col::HOSTNAME, &self.hostname),
            (col::HTTP_REALM, &self.http_realm),
            (col::USERNAME_FIELD, &self.username_field),
            (col::PASSWORD_FIELD, &self.password_field),
            (col::ENCRYPTED_USERNAME, &self.encrypted_username),
            (col::ENCRYPTED_PASSWORD, &self.encrypted_password),
            (col::GUID, &self.guid),
        ] {
            match criterion {
                Some(Match::Is(value)) => filter = filter.eq(column, Value::text(value)),
                Some(Match::Null) => filter = filter.is_null(column),
                None => {}
            }
        }
        if let Some(Match::Null) = &self.form_submit_url {
            filter = filter.is_null(col::FORM_SUBMIT_URL);
        }
        for (column, criterion) in [
            (col::ENC_TYPE, self.enc_type),
            (col::TIME_CREATED, self.time_created),
            (col::TIME_LAST_USED, self.time_last_used),
            (col::TIME_PASSWORD_CHANGED, self.time_password_changed),
            (col::TIMES_USED, self.times_used),
        ] {
            if let Some(value) = criterion {
                filter = filter.eq(column, Value::Integer(value));
            }
        }
        filter
    }

    fn wanted_submit_url(&self) -> Option<&str> {
        match &self.form_submit_url {
            Some(Match::Is(url)) => Some(url),
            _ => None,
        }
    }
}

/// Login storage with management policy and change notifications.
pub struct LoginStorage {
    db: LoginDb,
    events: broadcast::Sender<ChangeEvent>,
}

impl LoginStorage {
    pub fn new(db: LoginDb) -> Self {
        let (events, _) = broadcast::channel(64);
        Self { db, events }
    }

    /// The underlying façade, for callers that want raw cursor access.
    pub fn db(&self) -> &LoginDb {
        &self.db
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ChangeEvent) {
        let _ = self.events.send(event);
    }

    /// Validate, fill metadata, store. Returns the stored login with its
    /// assigned id and guid.
    ///
    /// A caller-supplied guid is kept when it is unique and rejected with
    /// `GuidConflict` otherwise; absent guids get a fresh UUIDv4. Unset
    /// timestamps are set to now and an unset use count starts at 1.
    pub async fn add_login(&self, login: Login) -> Result<Login, StoreError> {
        login.validate()?;
        let mut login = login;

        match login.guid.as_deref() {
            Some(guid) if !guid.is_empty() => {
                if !self.is_guid_unique(guid).await? {
                    return Err(StoreError::GuidConflict(guid.to_string()));
                }
            }
            _ => login.guid = Some(Uuid::new_v4().to_string()),
        }

        let now = Utc::now().timestamp_millis();
        if login.time_created == 0 {
            login.time_created = now;
        }
        if login.time_last_used == 0 {
            login.time_last_used = now;
        }
        if login.time_password_changed == 0 {
            login.time_password_changed = now;
        }
        if login.times_used == 0 {
            login.times_used = 1;
        }

        let id = self.db.add_login(&login).await?;
        login.id = Some(id);
        self.emit(ChangeEvent::LoginAdded(login.clone()));
        Ok(login)
    }

    /// Remove the stored row matching `login`. Errors with
    /// `NoMatchingLogin` when nothing matches.
    pub async fn remove_login(&self, login: &Login) -> Result<(), StoreError> {
        let stored = self
            .find_stored(login)
            .await?
            .ok_or(StoreError::NoMatchingLogin)?;
        let id = stored_id(&stored)?;
        self.db.remove_login(id).await?;
        self.emit(ChangeEvent::LoginRemoved(stored));
        Ok(())
    }

    /// Merge `update` into the stored row matching `old_login`.
    ///
    /// Guards: a changed guid must not collide with another login, and
    /// when the key fields change the result must not duplicate a login
    /// that already exists.
    pub async fn modify_login(
        &self,
        old_login: &Login,
        update: &LoginUpdate,
    ) -> Result<Login, StoreError> {
        let stored = self
            .find_stored(old_login)
            .await?
            .ok_or(StoreError::NoMatchingLogin)?;
        let id = stored_id(&stored)?;

        let new_login = stored.apply(update);
        new_login.validate()?;

        if new_login.guid != stored.guid {
            if let Some(guid) = new_login.guid.as_deref() {
                if !self.is_guid_unique(guid).await? {
                    return Err(StoreError::GuidConflict(guid.to_string()));
                }
            }
        }

        if !new_login.matches(&stored, true) {
            let peers = self
                .find_logins(
                    &new_login.hostname,
                    new_login.form_submit_url.as_deref(),
                    new_login.http_realm.as_deref(),
                )
                .await?;
            if peers.iter().any(|peer| new_login.matches(peer, true)) {
                return Err(StoreError::DuplicateLogin);
            }
        }

        self.db
            .modify_login(id, &LoginUpdate::from_login(&new_login))
            .await?;
        self.emit(ChangeEvent::LoginModified {
            old: stored,
            new: new_login.clone(),
        });
        Ok(new_login)
    }

    /// Wipe live logins and tombstones for the profile. Disabled hosts
    /// are kept.
    pub async fn remove_all_logins(&self) -> Result<(), StoreError> {
        self.db.remove_all_logins().await?;
        self.emit(ChangeEvent::AllLoginsRemoved);
        Ok(())
    }

    pub async fn get_all_logins(&self) -> Result<Vec<Login>, StoreError> {
        self.search_logins(&LoginQuery::default()).await
    }

    pub async fn count_all_logins(&self) -> Result<u64, StoreError> {
        self.db.count_logins().await
    }

    /// Arbitrary field search. An unavailable backend yields an empty
    /// list.
    pub async fn search_logins(&self, query: &LoginQuery) -> Result<Vec<Login>, StoreError> {
        let filter = query.to_filter();
        let filter = if filter.is_empty() { None } else { Some(&filter) };
        let cursor = match self.db.search_logins(filter).await? {
            Some(cursor) => cursor,
            None => {
                warn!("record store unavailable, returning no logins");
                return Ok(Vec::new());
            }
        };

        let mut exact = Vec::new();
        let mut fallback = Vec::new();
        for row in cursor {
            let login = Login::from_record(&row);
            match query.wanted_submit_url() {
                None => exact.push(login),
                Some(wanted) => {
                    let stored = login.form_submit_url.as_deref().unwrap_or("");
                    if stored.is_empty() || stored == wanted {
                        exact.push(login);
                    } else if schemes_flipped(stored, wanted) {
                        fallback.push(login);
                    }
                }
            }
        }

        if exact.is_empty() && !fallback.is_empty() {
            debug!("search returning {} scheme-fallback logins", fallback.len());
            return Ok(fallback);
        }
        debug!("search returning {} logins", exact.len());
        Ok(exact)
    }

    /// Autofill lookup by origin key.
    ///
    /// An empty hostname or submit URL leaves that field unconstrained; a
    /// `None` realm constrains the realm column to NULL, keeping form
    /// logins out of HTTP-auth lookups.
    pub async fn find_logins(
        &self,
        hostname: &str,
        form_submit_url: Option<&str>,
        http_realm: Option<&str>,
    ) -> Result<Vec<Login>, StoreError> {
        let mut query = LoginQuery::new();
        if !hostname.is_empty() {
            query.hostname = Some(Match::Is(hostname.to_string()));
        }
        if let Some(url) = form_submit_url {
            if !url.is_empty() {
                query.form_submit_url = Some(Match::Is(url.to_string()));
            }
        }
        match http_realm {
            Some("") => {}
            Some(realm) => query.http_realm = Some(Match::Is(realm.to_string())),
            None => query.http_realm = Some(Match::Null),
        }
        let logins = self.search_logins(&query).await?;
        debug!("find_logins: {} logins for {}", logins.len(), hostname);
        Ok(logins)
    }

    /// Count logins for one origin key, retrying once with the opposite
    /// submit-URL scheme when nothing matched.
    pub async fn count_logins(
        &self,
        hostname: &str,
        form_submit_url: Option<&str>,
        http_realm: Option<&str>,
    ) -> Result<usize, StoreError> {
        let found = self.find_logins(hostname, form_submit_url, http_realm).await?;
        if !found.is_empty() {
            return Ok(found.len());
        }

        let Some(submit) = form_submit_url.filter(|s| !s.is_empty() && *s != "javascript:")
        else {
            return Ok(0);
        };
        let Some(flipped) = flip_scheme(submit) else {
            return Ok(0);
        };
        let retried = self
            .find_logins(hostname, Some(&flipped), http_realm)
            .await?;
        debug!("count_logins retried with {}: {} logins", flipped, retried.len());
        Ok(retried.len())
    }

    /// True when no disabled-host entry exists for `hostname`.
    pub async fn get_login_saving_enabled(&self, hostname: &str) -> Result<bool, StoreError> {
        Ok(self.query_disabled_hosts(Some(hostname)).await?.is_empty())
    }

    pub async fn get_all_disabled_hosts(&self) -> Result<Vec<String>, StoreError> {
        let hosts = self.query_disabled_hosts(None).await?;
        debug!("returning {} disabled hosts", hosts.len());
        Ok(hosts)
    }

    pub async fn set_login_saving_enabled(
        &self,
        hostname: &str,
        enabled: bool,
    ) -> Result<(), StoreError> {
        self.db.set_login_saving_enabled(hostname, enabled).await?;
        self.emit(if enabled {
            ChangeEvent::HostSavingEnabled(hostname.to_string())
        } else {
            ChangeEvent::HostSavingDisabled(hostname.to_string())
        });
        Ok(())
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    async fn query_disabled_hosts(
        &self,
        hostname: Option<&str>,
    ) -> Result<Vec<String>, StoreError> {
        let cursor = match self.db.get_logins_saved_enabled(hostname).await? {
            Some(cursor) => cursor,
            None => {
                warn!("record store unavailable, treating disabled hosts as empty");
                return Ok(Vec::new());
            }
        };
        Ok(cursor
            .filter_map(|row| row.text(schema::disabled_hosts::HOSTNAME).map(str::to_string))
            .collect())
    }

    async fn is_guid_unique(&self, guid: &str) -> Result<bool, StoreError> {
        Ok(self.search_logins(&LoginQuery::by_guid(guid)).await?.is_empty())
    }

    /// Locate the stored row for a caller-supplied login: origin-key
    /// search, then strict field equality.
    async fn find_stored(&self, login: &Login) -> Result<Option<Login>, StoreError> {
        let candidates = self
            .find_logins(
                &login.hostname,
                login.form_submit_url.as_deref(),
                login.http_realm.as_deref(),
            )
            .await?;
        Ok(candidates.into_iter().find(|c| c.same_login(login)))
    }
}

fn stored_id(login: &Login) -> Result<RecordId, StoreError> {
    login
        .id
        .ok_or_else(|| StoreError::Backend("stored login row has no id".into()))
}

/// True when the two submit URLs share host:port and differ only by an
/// http/https scheme flip.
fn schemes_flipped(stored: &str, wanted: &str) -> bool {
    if stored == "javascript:" || wanted == "javascript:" {
        return false;
    }
    let (Ok(a), Ok(b)) = (Url::parse(stored), Url::parse(wanted)) else {
        return false;
    };
    // Compare explicit ports only; the http/https defaults never agree.
    let host_port = |u: &Url| (u.host_str().map(str::to_string), u.port());
    host_port(&a) == host_port(&b)
        && matches!((a.scheme(), b.scheme()), ("http", "https") | ("https", "http"))
}

/// Same-host submit URL with the opposite scheme, when the input has one.
fn flip_scheme(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let scheme = match parsed.scheme() {
        "http" => "https",
        "https" => "http",
        _ => return None,
    };
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    })
}

#[cfg(test)]
mod tests {
    use super::{flip_scheme, schemes_flipped};

    #[test]
    fn scheme_flip_requires_same_host_and_port() {
        assert!(schemes_flipped("http://example.com", "https://example.com"));
        assert!(schemes_flipped("https://example.com/login", "http://example.com"));
        assert!(!schemes_flipped("http://example.com", "http://example.com"));
        assert!(!schemes_flipped("https://example.com", "https://other.com"));
        assert!(!schemes_flipped("http://example.com:8080", "https://example.com:9090"));
        assert!(!schemes_flipped("javascript:", "https://example.com"));
        assert!(!schemes_flipped("not a url", "https://example.com"));
    }

    #[test]
    fn flip_scheme_keeps_explicit_ports() {
        assert_eq!(flip_scheme("http://example.com").as_deref(), Some("https://example.com"));
        assert_eq!(
            flip_scheme("https://example.com:8443/path").as_deref(),
            Some("http://example.com:8443")
        );
        assert_eq!(flip_scheme("ftp://example.com"), None);
        assert_eq!(flip_scheme("javascript:"), None);
    }
}
