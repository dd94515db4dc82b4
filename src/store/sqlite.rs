//! SQLite-backed [`RecordStore`].
//!
//! Tables:
//! - `accounts`: id, username (unique), digest, client_id, role_id, phone, email
//! - `refresh_tokens`: token, client, username, expires_at
//! - `roles`: id, menus (JSON array)
//! - `devices`: id, device_name (unique), model, type, platform, audit columns

use super::{
    Account, AccountChanges, Device, DeviceChanges, NewAccount, NewDevice, RecordStore,
    RefreshTokenRecord, Role,
};
use crate::error::StoreError;
use crate::util::now_stamp;
use chrono::Utc;
use parking_lot::Mutex;
use std::path::Path;

/// SQLite-backed record store. All access goes through a single connection
/// behind a mutex; WAL mode keeps concurrent readers cheap.
pub struct SqliteStore {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        let conn = rusqlite::Connection::open(db_path)?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        init_schema(&conn)?;

        // Retention sweep at startup; the insert path sweeps the rest.
        let now = Utc::now().timestamp();
        conn.execute(
            "DELETE FROM refresh_tokens WHERE expires_at <= ?1",
            rusqlite::params![now],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (for tests).
    pub fn in_memory() -> Self {
        let conn = rusqlite::Connection::open_in_memory()
            .expect("failed to open in-memory SQLite store");
        init_schema(&conn).expect("failed to initialize in-memory schema");
        Self {
            conn: Mutex::new(conn),
        }
    }
}

fn init_schema(conn: &rusqlite::Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL UNIQUE,
            digest TEXT NOT NULL,
            client_id TEXT NOT NULL,
            role_id TEXT,
            phone TEXT,
            email TEXT,
            create_time TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_accounts_client ON accounts(client_id);

        CREATE TABLE IF NOT EXISTS refresh_tokens (
            token TEXT NOT NULL,
            client TEXT NOT NULL,
            username TEXT NOT NULL,
            expires_at INTEGER NOT NULL,
            create_time TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_refresh_tokens_username ON refresh_tokens(username);
        CREATE INDEX IF NOT EXISTS idx_refresh_tokens_expires ON refresh_tokens(expires_at);

        CREATE TABLE IF NOT EXISTS roles (
            id TEXT PRIMARY KEY,
            menus TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS devices (
            id TEXT PRIMARY KEY,
            device_name TEXT NOT NULL UNIQUE,
            model TEXT NOT NULL,
            device_type TEXT,
            platform TEXT,
            create_user TEXT NOT NULL,
            update_user TEXT,
            create_time TEXT NOT NULL,
            update_time TEXT
        );",
    )?;
    Ok(())
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        username: row.get(1)?,
        digest: row.get(2)?,
        client_id: row.get(3)?,
        role_id: row.get(4)?,
        phone: row.get(5)?,
        email: row.get(6)?,
        create_time: row.get(7)?,
    })
}

fn row_to_device(row: &rusqlite::Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        id: row.get(0)?,
        device_name: row.get(1)?,
        model: row.get(2)?,
        device_type: row.get(3)?,
        platform: row.get(4)?,
        create_user: row.get(5)?,
        update_user: row.get(6)?,
        create_time: row.get(7)?,
        update_time: row.get(8)?,
    })
}

/// Collapse `QueryReturnedNoRows` into `Ok(None)`.
fn optional<T>(row: Result<T, rusqlite::Error>) -> Result<Option<T>, StoreError> {
    match row {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// True for the SQLite error raised on UNIQUE constraint violations.
fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl RecordStore for SqliteStore {
    // ── Accounts ────────────────────────────────────────────────────

    fn find_account_by_credentials(
        &self,
        username: &str,
        digest: &str,
    ) -> Result<Option<Account>, StoreError> {
        let conn = self.conn.lock();
        optional(conn.query_row(
            "SELECT id, username, digest, client_id, role_id, phone, email, create_time
             FROM accounts WHERE username = ?1 AND digest = ?2",
            rusqlite::params![username, digest],
            row_to_account,
        ))
    }

    fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let conn = self.conn.lock();
        optional(conn.query_row(
            "SELECT id, username, digest, client_id, role_id, phone, email, create_time
             FROM accounts WHERE username = ?1",
            rusqlite::params![username],
            row_to_account,
        ))
    }

    fn find_account_by_id(&self, id: &str) -> Result<Option<Account>, StoreError> {
        let conn = self.conn.lock();
        optional(conn.query_row(
            "SELECT id, username, digest, client_id, role_id, phone, email, create_time
             FROM accounts WHERE id = ?1",
            rusqlite::params![id],
            row_to_account,
        ))
    }

    fn find_account_by_client(&self, client_id: &str) -> Result<Option<Account>, StoreError> {
        let conn = self.conn.lock();
        optional(conn.query_row(
            "SELECT id, username, digest, client_id, role_id, phone, email, create_time
             FROM accounts WHERE client_id = ?1 ORDER BY rowid ASC LIMIT 1",
            rusqlite::params![client_id],
            row_to_account,
        ))
    }

    fn create_account(&self, account: NewAccount<'_>) -> Result<Account, StoreError> {
        let record = Account {
            id: uuid::Uuid::new_v4().to_string(),
            username: account.username.to_string(),
            digest: account.digest.to_string(),
            client_id: account.client_id.to_string(),
            role_id: account.role_id.map(str::to_string),
            phone: account.phone.map(str::to_string),
            email: account.email.map(str::to_string),
            create_time: now_stamp(),
        };

        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO accounts (id, username, digest, client_id, role_id, phone, email, create_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                record.id,
                record.username,
                record.digest,
                record.client_id,
                record.role_id,
                record.phone,
                record.email,
                record.create_time,
            ],
        );

        match result {
            Ok(_) => Ok(record),
            Err(e) if is_constraint_violation(&e) => Err(StoreError::Duplicate(format!(
                "username '{}'",
                record.username
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn update_account(
        &self,
        id: &str,
        changes: AccountChanges<'_>,
    ) -> Result<Option<Account>, StoreError> {
        let mut sets: Vec<String> = Vec::new();
        let mut bind_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut param_idx = 1;

        if let Some(username) = changes.username {
            sets.push(format!("username = ?{param_idx}"));
            bind_values.push(Box::new(username.to_string()));
            param_idx += 1;
        }
        if let Some(digest) = changes.digest {
            sets.push(format!("digest = ?{param_idx}"));
            bind_values.push(Box::new(digest.to_string()));
            param_idx += 1;
        }
        if let Some(client_id) = changes.client_id {
            sets.push(format!("client_id = ?{param_idx}"));
            bind_values.push(Box::new(client_id.to_string()));
            param_idx += 1;
        }
        if let Some(phone) = changes.phone {
            sets.push(format!("phone = ?{param_idx}"));
            bind_values.push(Box::new(phone.to_string()));
            param_idx += 1;
        }
        if let Some(email) = changes.email {
            sets.push(format!("email = ?{param_idx}"));
            bind_values.push(Box::new(email.to_string()));
            param_idx += 1;
        }

        if sets.is_empty() {
            return self.find_account_by_id(id);
        }

        let sql = format!(
            "UPDATE accounts SET {} WHERE id = ?{param_idx}",
            sets.join(", ")
        );
        bind_values.push(Box::new(id.to_string()));

        let changed = {
            let conn = self.conn.lock();
            let params_refs: Vec<&dyn rusqlite::types::ToSql> =
                bind_values.iter().map(|b| b.as_ref()).collect();
            match conn.execute(&sql, params_refs.as_slice()) {
                Ok(n) => n,
                Err(e) if is_constraint_violation(&e) => {
                    return Err(StoreError::Duplicate(format!(
                        "username '{}'",
                        changes.username.unwrap_or_default()
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        };

        if changed == 0 {
            return Ok(None);
        }
        self.find_account_by_id(id)
    }

    fn update_account_digest(&self, id: &str, digest: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE accounts SET digest = ?1 WHERE id = ?2",
            rusqlite::params![digest, id],
        )?;
        Ok(())
    }

    fn delete_account_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM accounts WHERE id = ?1",
            rusqlite::params![id],
        )?;
        Ok(deleted > 0)
    }

    fn list_accounts_except(&self, username: &str) -> Result<Vec<Account>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, username, digest, client_id, role_id, phone, email, create_time
             FROM accounts WHERE username != ?1 ORDER BY username ASC",
        )?;
        let accounts = stmt
            .query_map(rusqlite::params![username], row_to_account)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(accounts)
    }

    // ── Refresh tokens ──────────────────────────────────────────────

    fn insert_refresh_token(
        &self,
        token: &str,
        client: &str,
        username: &str,
        expires_at: i64,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock();

        // Opportunistic retention sweep keeps the table from growing
        // without bound.
        let now = Utc::now().timestamp();
        conn.execute(
            "DELETE FROM refresh_tokens WHERE expires_at <= ?1",
            rusqlite::params![now],
        )?;

        conn.execute(
            "INSERT INTO refresh_tokens (token, client, username, expires_at, create_time)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![token, client, username, expires_at, now_stamp()],
        )?;
        Ok(())
    }

    fn refresh_tokens_for_username(
        &self,
        username: &str,
    ) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT token, client, username, expires_at, create_time
             FROM refresh_tokens WHERE username = ?1 ORDER BY rowid ASC",
        )?;
        let records = stmt
            .query_map(rusqlite::params![username], |row| {
                Ok(RefreshTokenRecord {
                    token: row.get(0)?,
                    client: row.get(1)?,
                    username: row.get(2)?,
                    expires_at: row.get(3)?,
                    create_time: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    fn purge_expired_refresh_tokens(&self, now: i64) -> Result<u64, StoreError> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM refresh_tokens WHERE expires_at <= ?1",
            rusqlite::params![now],
        )?;
        Ok(deleted as u64)
    }

    // ── Roles ───────────────────────────────────────────────────────

    fn create_role(&self, id: &str, menus: &[String]) -> Result<(), StoreError> {
        let menus_json = serde_json::to_string(menus)?;
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO roles (id, menus) VALUES (?1, ?2)",
            rusqlite::params![id, menus_json],
        )?;
        Ok(())
    }

    fn find_role(&self, id: &str) -> Result<Option<Role>, StoreError> {
        let conn = self.conn.lock();
        let row: Result<(String, String), _> = conn.query_row(
            "SELECT id, menus FROM roles WHERE id = ?1",
            rusqlite::params![id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        );

        match optional(row)? {
            Some((id, menus_json)) => {
                let menus: Vec<String> = serde_json::from_str(&menus_json)?;
                Ok(Some(Role { id, menus }))
            }
            None => Ok(None),
        }
    }

    // ── Device registry ─────────────────────────────────────────────

    fn create_device(&self, device: NewDevice<'_>) -> Result<Device, StoreError> {
        let record = Device {
            id: uuid::Uuid::new_v4().to_string(),
            device_name: device.device_name.to_string(),
            model: device.model.to_string(),
            device_type: device.device_type.map(str::to_string),
            platform: device.platform.map(str::to_string),
            create_user: device.create_user.to_string(),
            update_user: None,
            create_time: now_stamp(),
            update_time: None,
        };

        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO devices (id, device_name, model, device_type, platform, create_user, create_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                record.id,
                record.device_name,
                record.model,
                record.device_type,
                record.platform,
                record.create_user,
                record.create_time,
            ],
        );

        match result {
            Ok(_) => Ok(record),
            Err(e) if is_constraint_violation(&e) => Err(StoreError::Duplicate(format!(
                "device '{}'",
                record.device_name
            ))),
            Err(e) => Err(e.into()),
        }
    }

    fn update_device_by_name(
        &self,
        device_name: &str,
        changes: DeviceChanges<'_>,
    ) -> Result<Option<Device>, StoreError> {
        let mut sets: Vec<String> = Vec::new();
        let mut bind_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        let mut param_idx = 1;

        if let Some(model) = changes.model {
            sets.push(format!("model = ?{param_idx}"));
            bind_values.push(Box::new(model.to_string()));
            param_idx += 1;
        }
        if let Some(device_type) = changes.device_type {
            sets.push(format!("device_type = ?{param_idx}"));
            bind_values.push(Box::new(device_type.to_string()));
            param_idx += 1;
        }
        if let Some(platform) = changes.platform {
            sets.push(format!("platform = ?{param_idx}"));
            bind_values.push(Box::new(platform.to_string()));
            param_idx += 1;
        }
        if let Some(update_user) = changes.update_user {
            sets.push(format!("update_user = ?{param_idx}"));
            bind_values.push(Box::new(update_user.to_string()));
            param_idx += 1;
        }

        // Every successful update stamps update_time.
        sets.push(format!("update_time = ?{param_idx}"));
        bind_values.push(Box::new(now_stamp()));
        param_idx += 1;

        let sql = format!(
            "UPDATE devices SET {} WHERE device_name = ?{param_idx}",
            sets.join(", ")
        );
        bind_values.push(Box::new(device_name.to_string()));

        let changed = {
            let conn = self.conn.lock();
            let params_refs: Vec<&dyn rusqlite::types::ToSql> =
                bind_values.iter().map(|b| b.as_ref()).collect();
            conn.execute(&sql, params_refs.as_slice())?
        };

        if changed == 0 {
            return Ok(None);
        }

        let conn = self.conn.lock();
        optional(conn.query_row(
            "SELECT id, device_name, model, device_type, platform, create_user, update_user,
                    create_time, update_time
             FROM devices WHERE device_name = ?1",
            rusqlite::params![device_name],
            row_to_device,
        ))
    }

    fn find_device_by_id(&self, id: &str) -> Result<Option<Device>, StoreError> {
        let conn = self.conn.lock();
        optional(conn.query_row(
            "SELECT id, device_name, model, device_type, platform, create_user, update_user,
                    create_time, update_time
             FROM devices WHERE id = ?1",
            rusqlite::params![id],
            row_to_device,
        ))
    }

    fn delete_device_by_id(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM devices WHERE id = ?1",
            rusqlite::params![id],
        )?;
        Ok(deleted > 0)
    }

    // ── Liveness ────────────────────────────────────────────────────

    fn health_check(&self) -> bool {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }
}

// ── Tests ───────────────────────────────────────────────────────────
