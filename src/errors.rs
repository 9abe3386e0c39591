//! Typed error hierarchy for Shoplist.
//!
//! Three top-level enums cover the three layers:
//! - `StoreError`: database access
//! - `AuthError`: password hashing and token handling
//! - `ClientError`: the HTTP client talking to a running backend

use thiserror::Error;

/// Errors from the SQLite store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("User {id} not found")]
    UserNotFound { id: String },

    #[error("List {id} not found")]
    ListNotFound { id: String },

    #[error("Item {id} not found")]
    ItemNotFound { id: String },

    #[error("Email {email} is already registered")]
    EmailTaken { email: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Database task failed: {0}")]
    TaskFailed(String),
}

/// Errors from password hashing and token verification.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Malformed token")]
    MalformedToken,

    #[error("Unsupported token algorithm '{0}'")]
    UnsupportedAlgorithm(String),

    #[error("Token signature mismatch")]
    BadSignature,

    #[error("Token expired at {expired_at}")]
    Expired { expired_at: i64 },

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

/// Errors surfaced by the HTTP client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend answered with a non-success status.
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Not logged in. Run `shoplist auth login` first.")]
    NotLoggedIn,

    #[error("Token file {path}: {source}")]
    TokenFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// The server-provided message, if this error came from the backend.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ClientError::Api { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
