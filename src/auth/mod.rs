//! Account authentication and session issuance.
//!
//! Provides:
//! - Credential checks as a single `(username, digest)` store lookup
//! - JWT session pairs (short-lived access + persisted refresh token)
//! - Default admin provisioning at startup, with a legacy login-time mode
//! - In-place upgrade of legacy unsalted-MD5 digests
//!
//! ## Design Decisions
//! - Password digests are PBKDF2-HMAC-SHA256 with a deployment-wide pepper
//!   instead of per-account salts, so the credential check stays a single
//!   keyed lookup.
//! - Tokens are HS256 JWTs; refresh tokens are also recorded server-side
//!   with their expiry so stale records can be swept.
//! - The client-consistency gate is a policy trait. The shipped
//!   [`AllowAllClients`] accepts every account; a real tenant registry
//!   can slot in behind the same seam.

pub mod digest;
pub mod token;

pub use digest::PasswordDigester;
pub use token::{Claims, SignedToken, TokenSigner};

use crate::config::{AuthConfig, BootstrapMode};
use crate::error::AuthError;
use crate::store::{Account, NewAccount, RecordStore};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A successful login: the account's username plus a fresh token pair.
#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub access_token: String,
    pub refresh_token: String,
}

/// Input to [`Authenticator::register`]. The password is digested before
/// anything is stored.
#[derive(Debug, Clone, Copy)]
pub struct Registration<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub client_id: &'a str,
    pub role_id: Option<&'a str>,
    pub phone: Option<&'a str>,
    pub email: Option<&'a str>,
}

/// A newly registered account plus its first access token.
#[derive(Debug, Clone)]
pub struct Registered {
    pub account: Account,
    pub access_token: String,
}

/// Client-consistency check run after credential resolution. Rejection
/// maps to [`AuthError::ClientRejected`].
pub trait ClientPolicy: Send + Sync {
    fn validate(&self, account: &Account) -> bool;
}

/// Accepts every account. The client registry this check would consult
/// is not wired in.
pub struct AllowAllClients;

impl ClientPolicy for AllowAllClients {
    fn validate(&self, _account: &Account) -> bool {
        true
    }
}

/// Authentication facade over the record store: logins, registrations,
/// and default-account provisioning.
pub struct Authenticator {
    store: Arc<dyn RecordStore>,
    digester: PasswordDigester,
    signer: TokenSigner,
    client_policy: Box<dyn ClientPolicy>,
    accept_legacy_md5: bool,
    bootstrap: BootstrapMode,
    admin_username: String,
    admin_password: String,
    admin_client_id: String,
}

impl Authenticator {
    pub fn new(store: Arc<dyn RecordStore>, config: &AuthConfig) -> Self {
        Self {
            store,
            digester: PasswordDigester::new(config.digest_iterations, &config.digest_pepper),
            signer: TokenSigner::new(
                &config.secret,
                config.access_ttl_secs,
                config.refresh_ttl_secs,
            ),
            client_policy: Box::new(AllowAllClients),
            accept_legacy_md5: config.accept_legacy_md5,
            bootstrap: config.bootstrap,
            admin_username: config.admin_username.clone(),
            admin_password: config.admin_password.clone(),
            admin_client_id: config.admin_client_id.clone(),
        }
    }

    /// Replace the client-consistency policy (for testing or a real
    /// tenant registry).
    pub fn with_client_policy(mut self, policy: Box<dyn ClientPolicy>) -> Self {
        self.client_policy = policy;
        self
    }

    /// Username excluded from listings and provisioned at bootstrap.
    pub fn admin_username(&self) -> &str {
        &self.admin_username
    }

    // ── Provisioning ────────────────────────────────────────────────

    /// Run the configured bootstrap step. Called once at startup, before
    /// the listener is up.
    pub fn bootstrap(&self) -> Result<(), AuthError> {
        match self.bootstrap {
            BootstrapMode::Startup => {
                if self.ensure_default_account()? {
                    info!(username = %self.admin_username, "created default admin account");
                } else {
                    debug!(username = %self.admin_username, "default admin account present");
                }
            }
            BootstrapMode::FirstLogin => {
                debug!("admin account will be provisioned on first login");
            }
            BootstrapMode::Disabled => {}
        }
        Ok(())
    }

    /// Create the admin account if no account holds that username yet.
    /// Returns whether a row was created. Losing a creation race to a
    /// concurrent worker counts as "already present".
    fn ensure_default_account(&self) -> Result<bool, AuthError> {
        if self
            .store
            .find_account_by_username(&self.admin_username)?
            .is_some()
        {
            return Ok(false);
        }

        let digest = self.digester.digest(&self.admin_password);
        match self.store.create_account(NewAccount {
            username: &self.admin_username,
            digest: &digest,
            client_id: &self.admin_client_id,
            role_id: None,
            phone: None,
            email: None,
        }) {
            Ok(_) => Ok(true),
            Err(crate::error::StoreError::Duplicate(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // ── Login ───────────────────────────────────────────────────────

    /// Authenticate and issue a session token pair.
    pub fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let digest = self.digester.digest(password);
        let mut account = self.store.find_account_by_credentials(username, &digest)?;

        if account.is_none() && self.accept_legacy_md5 {
            account = self.migrate_legacy_digest(username, password, &digest)?;
        }
        if account.is_none() && self.bootstrap == BootstrapMode::FirstLogin {
            account = self.bootstrap_on_login(username)?;
        }

        let account = account.ok_or(AuthError::InvalidCredentials)?;

        if !self.client_policy.validate(&account) {
            return Err(AuthError::ClientRejected);
        }

        if let Some(role_id) = &account.role_id {
            match self.store.find_role(role_id)? {
                Some(role) => {
                    debug!(username, menus = role.menus.len(), "resolved role menus")
                }
                None => warn!(username, role_id, "account references unknown role"),
            }
        }

        let access = self.signer.issue_access(&account.id)?;
        let refresh = self.signer.issue_refresh(&account.id)?;
        self.store.insert_refresh_token(
            &refresh.token,
            &account.client_id,
            &account.username,
            refresh.expires_at,
        )?;

        Ok(Session {
            username: account.username,
            access_token: access.token,
            refresh_token: refresh.token,
        })
    }

    /// Retry the credential check against the legacy unsalted-MD5 digest
    /// and, on a hit, rewrite the stored digest to the current scheme.
    fn migrate_legacy_digest(
        &self,
        username: &str,
        password: &str,
        new_digest: &str,
    ) -> Result<Option<Account>, AuthError> {
        let legacy = digest::legacy_md5(password);
        let Some(account) = self.store.find_account_by_credentials(username, &legacy)? else {
            return Ok(None);
        };

        self.store.update_account_digest(&account.id, new_digest)?;
        info!(username, "upgraded legacy MD5 password digest");

        Ok(Some(Account {
            digest: new_digest.to_string(),
            ..account
        }))
    }

    /// Legacy provisioning path: a failed login naming the admin username
    /// creates the account with the configured default password, whatever
    /// password the request supplied, and authenticates against that.
    /// An admin account whose password was changed stays untouched: the
    /// unique username constraint turns the create into a no-op and the
    /// default-credential recheck misses.
    fn bootstrap_on_login(&self, username: &str) -> Result<Option<Account>, AuthError> {
        if username != self.admin_username {
            return Ok(None);
        }

        let digest = self.digester.digest(&self.admin_password);
        match self.store.create_account(NewAccount {
            username,
            digest: &digest,
            client_id: &self.admin_client_id,
            role_id: None,
            phone: None,
            email: None,
        }) {
            Ok(account) => {
                info!(username, "created default admin account on first login");
                Ok(Some(account))
            }
            Err(crate::error::StoreError::Duplicate(_)) => {
                Ok(self.store.find_account_by_credentials(username, &digest)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    // ── Registration ────────────────────────────────────────────────

    /// Create an account and issue its first access token. The token's
    /// subject is the username; login tokens use the account id instead.
    pub fn register(&self, registration: Registration<'_>) -> Result<Registered, AuthError> {
        let digest = self.digester.digest(registration.password);
        let account = self.store.create_account(NewAccount {
            username: registration.username,
            digest: &digest,
            client_id: registration.client_id,
            role_id: registration.role_id,
            phone: registration.phone,
            email: registration.email,
        })?;

        let access = self.signer.issue_access(&account.username)?;
        Ok(Registered {
            account,
            access_token: access.token,
        })
    }

    // ── Helpers for the gateway ─────────────────────────────────────

    /// Digest a password with the configured scheme.
    pub fn digest_password(&self, password: &str) -> String {
        self.digester.digest(password)
    }

    /// Decode and validate a session token.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        Ok(self.signer.verify(token)?)
    }
}
