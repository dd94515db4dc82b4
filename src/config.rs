//! TOML configuration with serde defaults and environment overrides.
//!
//! Every section tolerates being absent from the file; a missing file falls
//! back to defaults entirely. The one hard requirement is the token signing
//! secret: the service refuses to start without it, because a guessable
//! default secret would make every issued token forgeable.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides `[auth] secret`.
pub const JWT_SECRET_ENV: &str = "USERHUB_JWT_SECRET";

/// Top-level configuration, usually loaded from `userhub.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
}

/// Listen address for the `[server]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8180,
        }
    }
}

/// Location of the SQLite file, from the `[database]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("userhub.db"),
        }
    }
}

/// Token signing, password digests, and admin bootstrap, from the `[auth]`
/// table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret. May be supplied via `USERHUB_JWT_SECRET` instead
    /// of the file; must be non-empty either way.
    pub secret: String,
    /// Access token lifetime in seconds.
    pub access_ttl_secs: u64,
    /// Refresh token lifetime in seconds.
    pub refresh_ttl_secs: u64,
    /// PBKDF2 iteration count for password digests.
    pub digest_iterations: u32,
    /// Process-wide value mixed into every password digest. Changing it
    /// invalidates all stored digests, so set it once at deployment time.
    pub digest_pepper: String,
    /// Accept legacy unsalted-MD5 digests on login and upgrade them in place.
    pub accept_legacy_md5: bool,
    /// When the default admin account gets created, if ever.
    pub bootstrap: BootstrapMode,
    /// Username of the bootstrap account.
    pub admin_username: String,
    /// Initial password of the bootstrap account.
    pub admin_password: String,
    /// Client identifier stamped on the bootstrap account.
    pub admin_client_id: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_ttl_secs: 600,
            refresh_ttl_secs: 24 * 3600,
            digest_iterations: 100_000,
            digest_pepper: String::new(),
            accept_legacy_md5: false,
            bootstrap: BootstrapMode::Startup,
            admin_username: "admin".to_string(),
            admin_password: "Admin1@".to_string(),
            admin_client_id: "9999".to_string(),
        }
    }
}

/// Controls when the default admin account is provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BootstrapMode {
    /// Create the admin account once at service startup. The login path
    /// never writes accounts.
    #[default]
    Startup,
    /// Legacy behavior: a failed login naming the admin username
    /// provisions the account mid-request with the configured default
    /// password and succeeds, whatever password was supplied.
    FirstLogin,
    /// Never self-provision.
    Disabled,
}

impl Config {
    /// Load configuration from `path`, apply environment overrides, and
    /// validate. A missing file is not an error; a malformed one is.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            Self::from_toml(&contents)
                .with_context(|| format!("failed to parse config file {}", path.display()))?
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
            if !secret.trim().is_empty() {
                config.auth.secret = secret;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document without touching the filesystem or environment.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Reject configurations the service cannot safely run with.
    pub fn validate(&self) -> Result<()> {
        if self.auth.secret.trim().is_empty() {
            bail!(
                "no token signing secret configured: set [auth] secret in the config file \
                 or export {JWT_SECRET_ENV}"
            );
        }
        if self.auth.digest_iterations == 0 {
            bail!("[auth] digest_iterations must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8180);
        assert_eq!(config.auth.access_ttl_secs, 600);
        assert_eq!(config.auth.refresh_ttl_secs, 86_400);
        assert_eq!(config.auth.digest_iterations, 100_000);
        assert_eq!(config.auth.bootstrap, BootstrapMode::Startup);
        assert_eq!(config.auth.admin_username, "admin");
        assert!(!config.auth.accept_legacy_md5);
    }

    #[test]
    fn partial_file_fills_missing_sections() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 9000
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.database.path, PathBuf::from("userhub.db"));
        assert_eq!(config.auth.admin_client_id, "9999");
    }

    #[test]
    fn bootstrap_mode_parses_kebab_case() {
        let config = Config::from_toml(
            r#"
            [auth]
            secret = "s3cret"
            bootstrap = "first-login"
            "#,
        )
        .unwrap();
        assert_eq!(config.auth.bootstrap, BootstrapMode::FirstLogin);

        let config = Config::from_toml(
            r#"
            [auth]
            bootstrap = "disabled"
            "#,
        )
        .unwrap();
        assert_eq!(config.auth.bootstrap, BootstrapMode::Disabled);
    }

    #[test]
    fn validate_rejects_empty_secret() {
        let config = Config::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("signing secret"));
    }

    #[test]
    fn validate_rejects_zero_iterations() {
        let mut config = Config::default();
        config.auth.secret = "s3cret".into();
        config.auth.digest_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_secret_from_file() {
        let config = Config::from_toml(
            r#"
            [auth]
            secret = "s3cret"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_bootstrap_value_is_rejected() {
        let result = Config::from_toml(
            r#"
            [auth]
            bootstrap = "sometimes"
            "#,
        );
        assert!(result.is_err());
    }
}
