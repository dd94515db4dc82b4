//! Error taxonomies for the store and the authentication core.

use thiserror::Error;

/// Failures surfaced by [`crate::store::RecordStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint (username, device name) was violated.
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored JSON column (role menus) failed to parse.
    #[error("malformed stored record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Failures surfaced by [`crate::auth::Authenticator`].
///
/// `InvalidCredentials` carries one message for both unknown usernames and
/// wrong passwords; callers cannot tell the two apart. The trailing
/// full-width stop in that message is part of the wire contract.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("login failed, username or password is wrong。")]
    InvalidCredentials,
    #[error("clientId is wrong!")]
    ClientRejected,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl AuthError {
    /// True for failures the client caused (HTTP 400), false for failures
    /// the service caused (HTTP 500).
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::InvalidCredentials | Self::ClientRejected)
    }
}
