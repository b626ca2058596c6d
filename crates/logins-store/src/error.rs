use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record store unavailable")]
    Unavailable,

    #[error("Unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("Invalid login: {0}")]
    InvalidLogin(String),

    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    #[error("Specified GUID already exists: {0}")]
    GuidConflict(String),

    #[error("This login already exists")]
    DuplicateLogin,

    #[error("No matching logins")]
    NoMatchingLogin,

    #[error("Record store backend error: {0}")]
    Backend(String),
}
