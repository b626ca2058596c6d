//! Typed login models and the table schemas they map to.
//!
//! The original store kept rows as untyped field bags and left validation
//! entirely to callers; here the row shape is a struct with named fields,
//! validated before any backend call, and the `Record` conversion happens
//! at the façade boundary.

use serde::{Deserialize, Serialize};

use crate::backend::{RecordId, TableAddr};
use crate::error::StoreError;
use crate::record::Record;

/// Table names and column sets. Addresses are resolved per profile via
/// [`ProfileTables`].
pub mod schema {
    pub const ID: &str = "id";

    pub mod logins {
        pub const TABLE: &str = "logins";
        pub const HOSTNAME: &str = "hostname";
        pub const HTTP_REALM: &str = "http_realm";
        pub const FORM_SUBMIT_URL: &str = "form_submit_url";
        pub const USERNAME_FIELD: &str = "username_field";
        pub const PASSWORD_FIELD: &str = "password_field";
        pub const ENCRYPTED_USERNAME: &str = "encrypted_username";
        pub const ENCRYPTED_PASSWORD: &str = "encrypted_password";
        pub const GUID: &str = "guid";
        pub const ENC_TYPE: &str = "enc_type";
        pub const TIME_CREATED: &str = "time_created";
        pub const TIME_LAST_USED: &str = "time_last_used";
        pub const TIME_PASSWORD_CHANGED: &str = "time_password_changed";
        pub const TIMES_USED: &str = "times_used";

        pub const COLUMNS: &[&str] = &[
            super::ID,
            HOSTNAME,
            HTTP_REALM,
            FORM_SUBMIT_URL,
            USERNAME_FIELD,
            PASSWORD_FIELD,
            ENCRYPTED_USERNAME,
            ENCRYPTED_PASSWORD,
            GUID,
            ENC_TYPE,
            TIME_CREATED,
            TIME_LAST_USED,
            TIME_PASSWORD_CHANGED,
            TIMES_USED,
        ];
    }

    pub mod deleted_logins {
        pub const TABLE: &str = "deleted_logins";
        pub const GUID: &str = "guid";
        pub const TIME_DELETED: &str = "time_deleted";

        pub const COLUMNS: &[&str] = &[super::ID, GUID, TIME_DELETED];
    }

    pub mod disabled_hosts {
        pub const TABLE: &str = "logins_disabled_hosts";
        pub const HOSTNAME: &str = "hostname";

        pub const COLUMNS: &[&str] = &[super::ID, HOSTNAME];
    }
}

/// The three profile-scoped table addresses, resolved once and injected
/// into the façade at construction.
#[derive(Debug, Clone)]
pub struct ProfileTables {
    pub logins: TableAddr,
    pub deleted_logins: TableAddr,
    pub disabled_hosts: TableAddr,
}

impl ProfileTables {
    /// Resolve addresses for `profile`. An empty name maps to the default
    /// profile.
    pub fn for_profile(profile: &str) -> Self {
        Self {
            logins: TableAddr::new(schema::logins::TABLE, profile, schema::logins::COLUMNS),
            deleted_logins: TableAddr::new(
                schema::deleted_logins::TABLE,
                profile,
                schema::deleted_logins::COLUMNS,
            ),
            disabled_hosts: TableAddr::new(
                schema::disabled_hosts::TABLE,
                profile,
                schema::disabled_hosts::COLUMNS,
            ),
        }
    }
}

/// A saved login.
///
/// `http_realm` and `form_submit_url` are mutually exclusive: a login
/// belongs either to an HTTP-auth realm or to a submit form. Credential
/// material arrives already encrypted; `enc_type` tags the scheme.
/// Timestamps are epoch milliseconds; zero means unset and is filled by
/// the storage layer on add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Login {
    /// Store-assigned row id; `None` until stored.
    pub id: Option<RecordId>,
    pub hostname: String,
    pub http_realm: Option<String>,
    pub form_submit_url: Option<String>,
    pub username_field: String,
    pub password_field: String,
    pub encrypted_username: String,
    pub encrypted_password: String,
    /// Stable identifier for sync; assigned on add when absent.
    pub guid: Option<String>,
    pub enc_type: i64,
    pub time_created: i64,
    pub time_last_used: i64,
    pub time_password_changed: i64,
    pub times_used: i64,
}

impl Login {
    pub fn new(
        hostname: impl Into<String>,
        form_submit_url: Option<&str>,
        http_realm: Option<&str>,
        encrypted_username: impl Into<String>,
        encrypted_password: impl Into<String>,
        username_field: impl Into<String>,
        password_field: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            hostname: hostname.into(),
            http_realm: http_realm.map(str::to_string),
            form_submit_url: form_submit_url.map(str::to_string),
            username_field: username_field.into(),
            password_field: password_field.into(),
            encrypted_username: encrypted_username.into(),
            encrypted_password: encrypted_password.into(),
            guid: None,
            enc_type: 0,
            time_created: 0,
            time_last_used: 0,
            time_password_changed: 0,
            times_used: 0,
        }
    }

    /// Reject field combinations the storage contract forbids.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.hostname.is_empty() {
            return Err(StoreError::InvalidLogin("hostname must not be empty".into()));
        }
        match (&self.http_realm, &self.form_submit_url) {
            (None, None) => {
                return Err(StoreError::InvalidLogin(
                    "either http_realm or form_submit_url is required".into(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(StoreError::InvalidLogin(
                    "http_realm and form_submit_url are mutually exclusive".into(),
                ));
            }
            _ => {}
        }
        if self.encrypted_password.is_empty() {
            return Err(StoreError::InvalidLogin("password must not be empty".into()));
        }
        for field in self.text_fields() {
            if field.contains('\0') {
                return Err(StoreError::InvalidLogin("field contains a NUL byte".into()));
            }
        }
        Ok(())
    }

    fn text_fields(&self) -> impl Iterator<Item = &str> {
        [
            Some(self.hostname.as_str()),
            self.http_realm.as_deref(),
            self.form_submit_url.as_deref(),
            Some(self.username_field.as_str()),
            Some(self.password_field.as_str()),
            Some(self.encrypted_username.as_str()),
            Some(self.encrypted_password.as_str()),
            self.guid.as_deref(),
        ]
        .into_iter()
        .flatten()
    }

    /// Row form for the backend. The id column is never written; the
    /// store owns id assignment.
    pub fn to_record(&self) -> Record {
        use schema::logins as col;
        let mut record = Record::new();
        record.put_text(col::HOSTNAME, &self.hostname);
        record.put_opt_text(col::HTTP_REALM, self.http_realm.as_deref());
        record.put_opt_text(col::FORM_SUBMIT_URL, self.form_submit_url.as_deref());
        record.put_text(col::USERNAME_FIELD, &self.username_field);
        record.put_text(col::PASSWORD_FIELD, &self.password_field);
        record.put_text(col::ENCRYPTED_USERNAME, &self.encrypted_username);
        record.put_text(col::ENCRYPTED_PASSWORD, &self.encrypted_password);
        record.put_opt_text(col::GUID, self.guid.as_deref());
        record.put_integer(col::ENC_TYPE, self.enc_type);
        record.put_integer(col::TIME_CREATED, self.time_created);
        record.put_integer(col::TIME_LAST_USED, self.time_last_used);
        record.put_integer(col::TIME_PASSWORD_CHANGED, self.time_password_changed);
        record.put_integer(col::TIMES_USED, self.times_used);
        record
    }

    pub fn from_record(record: &Record) -> Self {
        use schema::logins as col;
        Self {
            id: record.integer(schema::ID),
            hostname: record.text(col::HOSTNAME).unwrap_or_default().to_string(),
            http_realm: record.text(col::HTTP_REALM).map(str::to_string),
            form_submit_url: record.text(col::FORM_SUBMIT_URL).map(str::to_string),
            username_field: record.text(col::USERNAME_FIELD).unwrap_or_default().to_string(),
            password_field: record.text(col::PASSWORD_FIELD).unwrap_or_default().to_string(),
            encrypted_username: record
                .text(col::ENCRYPTED_USERNAME)
                .unwrap_or_default()
                .to_string(),
            encrypted_password: record
                .text(col::ENCRYPTED_PASSWORD)
                .unwrap_or_default()
                .to_string(),
            guid: record.text(col::GUID).map(str::to_string),
            enc_type: record.integer(col::ENC_TYPE).unwrap_or_default(),
            time_created: record.integer(col::TIME_CREATED).unwrap_or_default(),
            time_last_used: record.integer(col::TIME_LAST_USED).unwrap_or_default(),
            time_password_changed: record
                .integer(col::TIME_PASSWORD_CHANGED)
                .unwrap_or_default(),
            times_used: record.integer(col::TIMES_USED).unwrap_or_default(),
        }
    }

    /// Merge a partial update over this login. The result keeps this
    /// login's id.
    pub fn apply(&self, update: &LoginUpdate) -> Login {
        let mut record = self.to_record();
        record.merge(update.as_record());
        let mut merged = Login::from_record(&record);
        merged.id = self.id;
        merged
    }

    /// Strict field equality ignoring metadata (id, guid, timestamps, use
    /// counts). Used to locate a stored row for a caller-supplied login.
    pub fn same_login(&self, other: &Login) -> bool {
        self.hostname == other.hostname
            && self.http_realm == other.http_realm
            && self.form_submit_url == other.form_submit_url
            && self.username_field == other.username_field
            && self.password_field == other.password_field
            && self.encrypted_username == other.encrypted_username
            && self.encrypted_password == other.encrypted_password
    }

    /// Loose match on the key fields. An empty `form_submit_url` on either
    /// side acts as a wildcard, so a form login saved without a submit URL
    /// still matches a concrete one.
    pub fn matches(&self, other: &Login, ignore_password: bool) -> bool {
        if self.hostname != other.hostname
            || self.http_realm != other.http_realm
            || self.encrypted_username != other.encrypted_username
        {
            return false;
        }
        if !ignore_password && self.encrypted_password != other.encrypted_password {
            return false;
        }
        match (self.form_submit_url.as_deref(), other.form_submit_url.as_deref()) {
            (Some(""), _) | (_, Some("")) => true,
            (mine, theirs) => mine == theirs,
        }
    }
}

/// Partial overwrite for `modify_login`; only supplied fields reach the
/// store.
#[derive(Debug, Clone, Default)]
pub struct LoginUpdate(Record);

impl LoginUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full-field update from a merged login (everything except the id).
    pub fn from_login(login: &Login) -> Self {
        Self(login.to_record())
    }

    pub fn hostname(mut self, value: &str) -> Self {
        self.0.put_text(schema::logins::HOSTNAME, value);
        self
    }

    pub fn http_realm(mut self, value: Option<&str>) -> Self {
        self.0.put_opt_text(schema::logins::HTTP_REALM, value);
        self
    }

    pub fn form_submit_url(mut self, value: Option<&str>) -> Self {
        self.0.put_opt_text(schema::logins::FORM_SUBMIT_URL, value);
        self
    }

    pub fn username_field(mut self, value: &str) -> Self {
        self.0.put_text(schema::logins::USERNAME_FIELD, value);
        self
    }

    pub fn password_field(mut self, value: &str) -> Self {
        self.0.put_text(schema::logins::PASSWORD_FIELD, value);
        self
    }

    pub fn encrypted_username(mut self, value: &str) -> Self {
        self.0.put_text(schema::logins::ENCRYPTED_USERNAME, value);
        self
    }

    pub fn encrypted_password(mut self, value: &str) -> Self {
        self.0.put_text(schema::logins::ENCRYPTED_PASSWORD, value);
        self
    }

    pub fn guid(mut self, value: &str) -> Self {
        self.0.put_text(schema::logins::GUID, value);
        self
    }

    pub fn enc_type(mut self, value: i64) -> Self {
        self.0.put_integer(schema::logins::ENC_TYPE, value);
        self
    }

    pub fn time_last_used(mut self, value: i64) -> Self {
        self.0.put_integer(schema::logins::TIME_LAST_USED, value);
        self
    }

    pub fn time_password_changed(mut self, value: i64) -> Self {
        self.0.put_integer(schema::logins::TIME_PASSWORD_CHANGED, value);
        self
    }

    pub fn times_used(mut self, value: i64) -> Self {
        self.0.put_integer(schema::logins::TIMES_USED, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_record(&self) -> &Record {
        &self.0
    }
}

/// Hostname check shared by the disabled-hosts operations.
pub fn validate_hostname(hostname: &str) -> Result<(), StoreError> {
    if hostname.is_empty() {
        return Err(StoreError::InvalidHostname("hostname must not be empty".into()));
    }
    if hostname.contains('\0') {
        return Err(StoreError::InvalidHostname("hostname contains a NUL byte".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_hostname, Login, LoginUpdate};
    use crate::error::StoreError;

    fn form_login() -> Login {
        Login::new(
            "https://example.com",
            Some("https://example.com"),
            None,
            "enc-user",
            "enc-pass",
            "username",
            "password",
        )
    }

    #[test]
    fn valid_form_login_passes() {
        form_login().validate().expect("valid login");
    }

    #[test]
    fn hostname_is_required() {
        let mut login = form_login();
        login.hostname.clear();
        assert!(matches!(login.validate(), Err(StoreError::InvalidLogin(_))));
    }

    #[test]
    fn realm_and_submit_url_are_mutually_exclusive() {
        let mut login = form_login();
        login.http_realm = Some("realm".into());
        assert!(matches!(login.validate(), Err(StoreError::InvalidLogin(_))));

        login.http_realm = None;
        login.form_submit_url = None;
        assert!(matches!(login.validate(), Err(StoreError::InvalidLogin(_))));
    }

    #[test]
    fn nul_bytes_are_rejected() {
        let mut login = form_login();
        login.encrypted_username.push('\0');
        assert!(matches!(login.validate(), Err(StoreError::InvalidLogin(_))));

        assert!(validate_hostname("bad\0host").is_err());
        assert!(validate_hostname("").is_err());
        validate_hostname("example.com").expect("valid hostname");
    }

    #[test]
    fn apply_overwrites_supplied_fields_only() {
        let mut stored = form_login();
        stored.id = Some(7);
        stored.guid = Some("guid-1".into());
        stored.times_used = 3;

        let update = LoginUpdate::new()
            .encrypted_password("enc-pass-2")
            .times_used(4);
        let merged = stored.apply(&update);

        assert_eq!(merged.id, Some(7));
        assert_eq!(merged.guid.as_deref(), Some("guid-1"));
        assert_eq!(merged.encrypted_password, "enc-pass-2");
        assert_eq!(merged.times_used, 4);
        assert_eq!(merged.hostname, stored.hostname);
    }

    #[test]
    fn empty_submit_url_matches_any_form_login() {
        let concrete = form_login();
        let mut wildcard = form_login();
        wildcard.form_submit_url = Some(String::new());

        assert!(wildcard.matches(&concrete, false));
        assert!(concrete.matches(&wildcard, false));
        assert!(!concrete.same_login(&wildcard));
    }

    #[test]
    fn matches_can_ignore_password() {
        let stored = form_login();
        let mut rotated = form_login();
        rotated.encrypted_password = "enc-pass-2".into();

        assert!(rotated.matches(&stored, true));
        assert!(!rotated.matches(&stored, false));
    }
}
