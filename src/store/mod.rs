//! Record storage: accounts, refresh tokens, roles, and the device registry.
//!
//! Handlers and the authenticator talk to [`RecordStore`]; the shipped
//! implementation is [`SqliteStore`]. Credential resolution matches on
//! `(username, digest)` in one query, so an unknown username and a wrong
//! password are the same observable outcome.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StoreError;

/// A stored user account. `digest` never leaves the service.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub digest: String,
    pub client_id: String,
    pub role_id: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub create_time: String,
}

/// Fields for account creation. The id and `create_time` are assigned by
/// the store.
#[derive(Debug, Clone, Copy)]
pub struct NewAccount<'a> {
    pub username: &'a str,
    pub digest: &'a str,
    pub client_id: &'a str,
    pub role_id: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub email: Option<&'a str>,
}

/// Partial account update; `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountChanges<'a> {
    pub username: Option<&'a str>,
    pub digest: Option<&'a str>,
    pub client_id: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub email: Option<&'a str>,
}

/// One issued refresh token. Several live records per account are expected;
/// expired ones are swept opportunistically.
#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub token: String,
    pub client: String,
    pub username: String,
    pub expires_at: i64,
    pub create_time: String,
}

/// A role: an ordered set of opaque menu identifiers.
#[derive(Debug, Clone)]
pub struct Role {
    pub id: String,
    pub menus: Vec<String>,
}

/// A registered device. `device_name` is unique across the registry.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: String,
    pub device_name: String,
    pub model: String,
    pub device_type: Option<String>,
    pub platform: Option<String>,
    pub create_user: String,
    pub update_user: Option<String>,
    pub create_time: String,
    pub update_time: Option<String>,
}

/// Fields for device registration.
#[derive(Debug, Clone, Copy)]
pub struct NewDevice<'a> {
    pub device_name: &'a str,
    pub model: &'a str,
    pub device_type: Option<&'a str>,
    pub platform: Option<&'a str>,
    pub create_user: &'a str,
}

/// Partial device update; `None` fields are left untouched. `update_user`
/// and `update_time` are stamped on every successful update.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceChanges<'a> {
    pub model: Option<&'a str>,
    pub device_type: Option<&'a str>,
    pub platform: Option<&'a str>,
    pub update_user: Option<&'a str>,
}

/// Storage seam consumed by the issuer and the HTTP handlers.
pub trait RecordStore: Send + Sync {
    // ── Accounts ────────────────────────────────────────────────────

    /// Combined-credential lookup: a single equality match on both
    /// username and digest. Never split this into fetch-then-compare.
    fn find_account_by_credentials(
        &self,
        username: &str,
        digest: &str,
    ) -> Result<Option<Account>, StoreError>;

    fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    fn find_account_by_id(&self, id: &str) -> Result<Option<Account>, StoreError>;

    /// First account carrying the given client id, if any.
    fn find_account_by_client(&self, client_id: &str) -> Result<Option<Account>, StoreError>;

    /// Insert a new account. A taken username yields [`StoreError::Duplicate`].
    fn create_account(&self, account: NewAccount<'_>) -> Result<Account, StoreError>;

    /// Apply `changes` to the account with the given id and return the
    /// updated record, or `None` if no such account exists.
    fn update_account(
        &self,
        id: &str,
        changes: AccountChanges<'_>,
    ) -> Result<Option<Account>, StoreError>;

    /// Rewrite only the password digest (legacy scheme migration).
    fn update_account_digest(&self, id: &str, digest: &str) -> Result<(), StoreError>;

    /// Delete by id. Returns whether a record was removed; deleting a
    /// missing account is not an error.
    fn delete_account_by_id(&self, id: &str) -> Result<bool, StoreError>;

    /// All accounts except the one with the given username.
    fn list_accounts_except(&self, username: &str) -> Result<Vec<Account>, StoreError>;

    // ── Refresh tokens ──────────────────────────────────────────────

    /// Record an issued refresh token. Sweeps expired records first.
    fn insert_refresh_token(
        &self,
        token: &str,
        client: &str,
        username: &str,
        expires_at: i64,
    ) -> Result<(), StoreError>;

    fn refresh_tokens_for_username(
        &self,
        username: &str,
    ) -> Result<Vec<RefreshTokenRecord>, StoreError>;

    /// Drop records whose `expires_at` is at or before `now`. Returns the
    /// number removed.
    fn purge_expired_refresh_tokens(&self, now: i64) -> Result<u64, StoreError>;

    // ── Roles ───────────────────────────────────────────────────────

    fn create_role(&self, id: &str, menus: &[String]) -> Result<(), StoreError>;

    fn find_role(&self, id: &str) -> Result<Option<Role>, StoreError>;

    // ── Device registry ─────────────────────────────────────────────

    /// Register a device. A taken device name yields [`StoreError::Duplicate`].
    fn create_device(&self, device: NewDevice<'_>) -> Result<Device, StoreError>;

    /// Update the device with the given name and return the updated record,
    /// or `None` if no such device exists.
    fn update_device_by_name(
        &self,
        device_name: &str,
        changes: DeviceChanges<'_>,
    ) -> Result<Option<Device>, StoreError>;

    fn find_device_by_id(&self, id: &str) -> Result<Option<Device>, StoreError>;

    /// Delete by id. Deleting a missing device is not an error.
    fn delete_device_by_id(&self, id: &str) -> Result<bool, StoreError>;

    // ── Liveness ────────────────────────────────────────────────────

    /// Cheap reachability probe for the health endpoint.
    fn health_check(&self) -> bool;
}
