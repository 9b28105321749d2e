//! SQLite storage backend.
//!
//! One plain SQLite database; confidentiality comes from the field-level
//! key hierarchy (`key` and `pass` columns hold ciphertext), not from
//! encrypting the file. The connection sits behind a mutex, so rotation's
//! transaction also serialises against every other store operation.

mod row;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use crate::acl::preset::DefaultPermissionPreset;
use crate::crypto::MasterKeyState;
use crate::error::{Result, VaultError};
use crate::search::query::ACCOUNT_COLUMNS;
use crate::search::AccountQuery;
use crate::storage::traits::VaultStore;
use crate::storage::types::{
    Account, AccountFile, AccountGrants, AccountHistoryEntry, Category, Client, GroupGrant,
    RotationBatch, Tag, User, UserGrant, UserGroup,
};

use row::{parse_uuid, AccountRow, HistoryRow, MasterKeyStateRow, PresetRow, UserRow};

/// History columns in `AccountHistoryEntry` order.
const HISTORY_COLUMNS: &str = "h.id, h.account_id, h.name, h.login, h.url, h.notes, \
     h.category_id, h.client_id, h.user_id, h.user_group_id, h.user_edit_id, \
     h.key, h.pass, h.key_hash, h.is_private, h.is_private_group, \
     h.other_user_group_edit, h.other_user_edit, h.pass_date, h.pass_date_change, \
     h.parent_id, h.count_view, h.count_decrypt, h.date_add, h.date_edit, \
     h.is_modify, h.is_deleted, h.date";

/// User columns in `User` field order.
const USER_COLUMNS: &str = "id, login, name, user_group_id, profile_id, profile_json, \
     is_admin_app, is_admin_acc, is_disabled, last_key_update";

const SCHEMA: &str = r#"
CREATE TABLE master_key_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    kdf_salt BLOB NOT NULL,
    verifier TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE user_groups (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE users (
    id TEXT PRIMARY KEY,
    login TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    user_group_id TEXT NOT NULL,
    profile_id TEXT,
    profile_json TEXT NOT NULL,
    is_admin_app INTEGER NOT NULL DEFAULT 0,
    is_admin_acc INTEGER NOT NULL DEFAULT 0,
    is_disabled INTEGER NOT NULL DEFAULT 0,
    last_key_update INTEGER NOT NULL DEFAULT 0,

    FOREIGN KEY (user_group_id) REFERENCES user_groups(id)
);

CREATE TABLE categories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE clients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE tags (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE accounts (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    login TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',
    category_id TEXT,
    client_id TEXT,
    user_id TEXT NOT NULL,
    user_group_id TEXT NOT NULL,
    user_edit_id TEXT,
    key BLOB NOT NULL,
    pass BLOB NOT NULL,
    key_hash TEXT NOT NULL,
    is_private INTEGER NOT NULL DEFAULT 0,
    is_private_group INTEGER NOT NULL DEFAULT 0,
    other_user_group_edit INTEGER NOT NULL DEFAULT 0,
    other_user_edit INTEGER NOT NULL DEFAULT 0,
    pass_date TEXT NOT NULL,
    pass_date_change TEXT,
    parent_id TEXT,
    count_view INTEGER NOT NULL DEFAULT 0,
    count_decrypt INTEGER NOT NULL DEFAULT 0,
    date_add TEXT NOT NULL,
    date_edit TEXT NOT NULL,

    -- a sealed secret always travels with its wrapped key
    CHECK (length(pass) = 0 OR length(key) > 0),
    -- an account is private to a user or to a group, not both
    CHECK (is_private = 0 OR is_private_group = 0),

    FOREIGN KEY (category_id) REFERENCES categories(id),
    FOREIGN KEY (client_id) REFERENCES clients(id),
    FOREIGN KEY (user_id) REFERENCES users(id),
    FOREIGN KEY (user_group_id) REFERENCES user_groups(id)
);

CREATE INDEX idx_accounts_user ON accounts(user_id);
CREATE INDEX idx_accounts_user_group ON accounts(user_group_id);
CREATE INDEX idx_accounts_category ON accounts(category_id);
CREATE INDEX idx_accounts_client ON accounts(client_id);

CREATE TABLE account_users (
    account_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    is_edit INTEGER NOT NULL DEFAULT 0,

    PRIMARY KEY (account_id, user_id),
    FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE account_user_groups (
    account_id TEXT NOT NULL,
    user_group_id TEXT NOT NULL,
    is_edit INTEGER NOT NULL DEFAULT 0,

    PRIMARY KEY (account_id, user_group_id),
    FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE,
    FOREIGN KEY (user_group_id) REFERENCES user_groups(id)
);

CREATE TABLE account_tags (
    account_id TEXT NOT NULL,
    tag_id TEXT NOT NULL,

    PRIMARY KEY (account_id, tag_id),
    FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id)
);

CREATE TABLE account_favorites (
    account_id TEXT NOT NULL,
    user_id TEXT NOT NULL,

    PRIMARY KEY (account_id, user_id),
    FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

CREATE TABLE account_files (
    id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL,
    name TEXT NOT NULL,
    size INTEGER NOT NULL,
    content BLOB NOT NULL,

    FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
);

-- History is an archive: rows outlive their account, so no foreign key.
CREATE TABLE account_history (
    id TEXT PRIMARY KEY,
    account_id TEXT NOT NULL,
    name TEXT NOT NULL,
    login TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',
    category_id TEXT,
    client_id TEXT,
    user_id TEXT NOT NULL,
    user_group_id TEXT NOT NULL,
    user_edit_id TEXT,
    key BLOB NOT NULL,
    pass BLOB NOT NULL,
    key_hash TEXT NOT NULL,
    is_private INTEGER NOT NULL DEFAULT 0,
    is_private_group INTEGER NOT NULL DEFAULT 0,
    other_user_group_edit INTEGER NOT NULL DEFAULT 0,
    other_user_edit INTEGER NOT NULL DEFAULT 0,
    pass_date TEXT NOT NULL,
    pass_date_change TEXT,
    parent_id TEXT,
    count_view INTEGER NOT NULL DEFAULT 0,
    count_decrypt INTEGER NOT NULL DEFAULT 0,
    date_add TEXT NOT NULL,
    date_edit TEXT NOT NULL,
    is_modify INTEGER NOT NULL DEFAULT 0,
    is_deleted INTEGER NOT NULL DEFAULT 0,
    date TEXT NOT NULL
);

CREATE INDEX idx_account_history_account ON account_history(account_id);

CREATE TABLE permission_presets (
    id TEXT PRIMARY KEY,
    priority INTEGER NOT NULL,
    fixed INTEGER NOT NULL DEFAULT 0,
    target_kind TEXT NOT NULL,
    target_id TEXT NOT NULL,
    bundle_json TEXT NOT NULL
);
"#;

/// SQLite-backed vault store.
pub struct SqliteVaultStore {
    conn: Mutex<Connection>,
}

impl SqliteVaultStore {
    /// Lock the database connection, returning an error if the mutex is
    /// poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| VaultError::QueryError("SQLite connection poisoned".to_string()))
    }

    fn prepare_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        register_regexp(conn)?;
        Ok(())
    }
}

/// Register a `regexp(pattern, text)` scalar so `REGEXP` works in account
/// queries. The compiled pattern is cached per statement.
fn register_regexp(conn: &Connection) -> Result<()> {
    type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            let pattern: Arc<Regex> = ctx.get_or_create_aux(0, |vr| -> std::result::Result<_, BoxError> {
                Ok(Regex::new(vr.as_str()?)?)
            })?;
            let text = ctx
                .get_raw(1)
                .as_str()
                .map_err(|e| rusqlite::Error::UserFunctionError(e.into()))?;
            Ok(pattern.is_match(text))
        },
    )?;
    Ok(())
}

fn insert_history_row(conn: &Connection, entry: &AccountHistoryEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO account_history (id, account_id, name, login, url, notes, \
         category_id, client_id, user_id, user_group_id, user_edit_id, \
         key, pass, key_hash, is_private, is_private_group, \
         other_user_group_edit, other_user_edit, pass_date, pass_date_change, \
         parent_id, count_view, count_decrypt, date_add, date_edit, \
         is_modify, is_deleted, date) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, \
         ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28)",
        rusqlite::params![
            entry.id.to_string(),
            entry.account_id.to_string(),
            entry.name,
            entry.login,
            entry.url,
            entry.notes,
            entry.category_id.map(|id| id.to_string()),
            entry.client_id.map(|id| id.to_string()),
            entry.user_id.to_string(),
            entry.user_group_id.to_string(),
            entry.user_edit_id.map(|id| id.to_string()),
            entry.key,
            entry.pass,
            entry.key_hash,
            entry.is_private,
            entry.is_private_group,
            entry.other_user_group_edit,
            entry.other_user_edit,
            entry.pass_date.to_rfc3339(),
            entry.pass_date_change.map(|ts| ts.to_rfc3339()),
            entry.parent_id.map(|id| id.to_string()),
            entry.count_view,
            entry.count_decrypt,
            entry.date_add.to_rfc3339(),
            entry.date_edit.to_rfc3339(),
            entry.is_modify,
            entry.is_deleted,
            entry.date.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn update_account_row(
    conn: &Connection,
    account: &Account,
    expected_date_edit: DateTime<Utc>,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE accounts SET name = ?1, login = ?2, url = ?3, notes = ?4, \
         category_id = ?5, client_id = ?6, user_id = ?7, user_group_id = ?8, \
         user_edit_id = ?9, key = ?10, pass = ?11, key_hash = ?12, \
         is_private = ?13, is_private_group = ?14, other_user_group_edit = ?15, \
         other_user_edit = ?16, pass_date = ?17, pass_date_change = ?18, \
         parent_id = ?19, count_view = ?20, count_decrypt = ?21, date_edit = ?22 \
         WHERE id = ?23 AND date_edit = ?24",
        rusqlite::params![
            account.name,
            account.login,
            account.url,
            account.notes,
            account.category_id.map(|id| id.to_string()),
            account.client_id.map(|id| id.to_string()),
            account.user_id.to_string(),
            account.user_group_id.to_string(),
            account.user_edit_id.map(|id| id.to_string()),
            account.key,
            account.pass,
            account.key_hash,
            account.is_private,
            account.is_private_group,
            account.other_user_group_edit,
            account.other_user_edit,
            account.pass_date.to_rfc3339(),
            account.pass_date_change.map(|ts| ts.to_rfc3339()),
            account.parent_id.map(|id| id.to_string()),
            account.count_view,
            account.count_decrypt,
            account.date_edit.to_rfc3339(),
            account.id.to_string(),
            expected_date_edit.to_rfc3339(),
        ],
    )?;
    if updated == 0 {
        return Err(VaultError::ConstraintViolation(
            "account changed since it was read".to_string(),
        ));
    }
    Ok(())
}

fn save_master_key_state_row(conn: &Connection, state: &MasterKeyState) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO master_key_state (id, version, kdf_salt, verifier, updated_at) \
         VALUES (1, ?1, ?2, ?3, ?4)",
        rusqlite::params![
            state.version,
            &state.kdf_salt[..],
            state.verifier,
            state.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

impl VaultStore for SqliteVaultStore {
    fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(VaultError::InvalidInput(
                "vault database already exists".to_string(),
            ));
        }

        let conn = Connection::open(path)?;
        Self::prepare_connection(&conn)?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(VaultError::InvalidInput(
                "vault database not found".to_string(),
            ));
        }

        let conn = Connection::open(path)?;
        Self::prepare_connection(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn get_master_key_state(&self) -> Result<Option<MasterKeyState>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT version, kdf_salt, verifier, updated_at FROM master_key_state WHERE id = 1",
                [],
                MasterKeyStateRow::from_row,
            )
            .optional()?;
        row.map(MasterKeyState::try_from).transpose()
    }

    fn save_master_key_state(&mut self, state: &MasterKeyState) -> Result<()> {
        let conn = self.lock_conn()?;
        save_master_key_state_row(&conn, state)
    }

    fn insert_account(&mut self, account: &Account) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO accounts (id, name, login, url, notes, category_id, client_id, \
             user_id, user_group_id, user_edit_id, key, pass, key_hash, \
             is_private, is_private_group, other_user_group_edit, other_user_edit, \
             pass_date, pass_date_change, parent_id, count_view, count_decrypt, \
             date_add, date_edit) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, \
             ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
            rusqlite::params![
                account.id.to_string(),
                account.name,
                account.login,
                account.url,
                account.notes,
                account.category_id.map(|id| id.to_string()),
                account.client_id.map(|id| id.to_string()),
                account.user_id.to_string(),
                account.user_group_id.to_string(),
                account.user_edit_id.map(|id| id.to_string()),
                account.key,
                account.pass,
                account.key_hash,
                account.is_private,
                account.is_private_group,
                account.other_user_group_edit,
                account.other_user_edit,
                account.pass_date.to_rfc3339(),
                account.pass_date_change.map(|ts| ts.to_rfc3339()),
                account.parent_id.map(|id| id.to_string()),
                account.count_view,
                account.count_decrypt,
                account.date_add.to_rfc3339(),
                account.date_edit.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {} FROM accounts a WHERE a.id = ?1", ACCOUNT_COLUMNS);
        let row = conn
            .query_row(&sql, [id.to_string()], AccountRow::from_row)
            .optional()?;
        row.map(Account::try_from).transpose()
    }

    fn update_account(
        &mut self,
        account: &Account,
        expected_date_edit: DateTime<Utc>,
        snapshot: &AccountHistoryEntry,
    ) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        insert_history_row(&tx, snapshot)?;
        update_account_row(&tx, account, expected_date_edit)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_account(&mut self, id: Uuid, snapshot: &AccountHistoryEntry) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        insert_history_row(&tx, snapshot)?;
        let deleted = tx.execute("DELETE FROM accounts WHERE id = ?1", [id.to_string()])?;
        if deleted == 0 {
            return Err(VaultError::ConstraintViolation(
                "account no longer exists".to_string(),
            ));
        }
        tx.commit()?;
        Ok(())
    }

    fn search_accounts(&self, query: &AccountQuery) -> Result<Vec<Account>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&query.sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(query.params.iter()),
            AccountRow::from_row,
        )?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(Account::try_from(row?)?);
        }
        Ok(accounts)
    }

    fn list_all_accounts(&self) -> Result<Vec<Account>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {} FROM accounts a ORDER BY a.date_add", ACCOUNT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], AccountRow::from_row)?;

        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(Account::try_from(row?)?);
        }
        Ok(accounts)
    }

    fn bump_view_counter(&mut self, id: Uuid) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE accounts SET count_view = count_view + 1 WHERE id = ?1",
            [id.to_string()],
        )?;
        Ok(())
    }

    fn bump_decrypt_counter(&mut self, id: Uuid) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE accounts SET count_decrypt = count_decrypt + 1 WHERE id = ?1",
            [id.to_string()],
        )?;
        Ok(())
    }

    fn get_account_grants(&self, account_id: Uuid) -> Result<AccountGrants> {
        let conn = self.lock_conn()?;
        let mut grants = AccountGrants::default();

        let mut stmt =
            conn.prepare("SELECT user_id, is_edit FROM account_users WHERE account_id = ?1")?;
        let users = stmt.query_map([account_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })?;
        for user in users {
            let (user_id, is_edit) = user?;
            grants.users.push(UserGrant {
                user_id: parse_uuid(&user_id, "grant user")?,
                is_edit,
            });
        }

        let mut stmt = conn
            .prepare("SELECT user_group_id, is_edit FROM account_user_groups WHERE account_id = ?1")?;
        let groups = stmt.query_map([account_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, bool>(1)?))
        })?;
        for group in groups {
            let (group_id, is_edit) = group?;
            grants.groups.push(GroupGrant {
                user_group_id: parse_uuid(&group_id, "grant group")?,
                is_edit,
            });
        }

        Ok(grants)
    }

    fn set_account_grants(&mut self, account_id: Uuid, grants: &AccountGrants) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let id = account_id.to_string();

        tx.execute("DELETE FROM account_users WHERE account_id = ?1", [&id])?;
        tx.execute("DELETE FROM account_user_groups WHERE account_id = ?1", [&id])?;

        for grant in &grants.users {
            tx.execute(
                "INSERT INTO account_users (account_id, user_id, is_edit) VALUES (?1, ?2, ?3)",
                rusqlite::params![id, grant.user_id.to_string(), grant.is_edit],
            )?;
        }
        for grant in &grants.groups {
            tx.execute(
                "INSERT INTO account_user_groups (account_id, user_group_id, is_edit) \
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![id, grant.user_group_id.to_string(), grant.is_edit],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn set_account_tags(&mut self, account_id: Uuid, tag_ids: &[Uuid]) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let id = account_id.to_string();

        tx.execute("DELETE FROM account_tags WHERE account_id = ?1", [&id])?;
        for tag_id in tag_ids {
            tx.execute(
                "INSERT INTO account_tags (account_id, tag_id) VALUES (?1, ?2)",
                rusqlite::params![id, tag_id.to_string()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get_account_tags(&self, account_id: Uuid) -> Result<Vec<Tag>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT t.id, t.name FROM tags t \
             JOIN account_tags at ON at.tag_id = t.id \
             WHERE at.account_id = ?1 ORDER BY t.name",
        )?;
        let rows = stmt.query_map([account_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut tags = Vec::new();
        for tag in rows {
            let (id, name) = tag?;
            tags.push(Tag {
                id: parse_uuid(&id, "tag")?,
                name,
            });
        }
        Ok(tags)
    }

    fn add_favorite(&mut self, account_id: Uuid, user_id: Uuid) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO account_favorites (account_id, user_id) VALUES (?1, ?2)",
            rusqlite::params![account_id.to_string(), user_id.to_string()],
        )?;
        Ok(())
    }

    fn remove_favorite(&mut self, account_id: Uuid, user_id: Uuid) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "DELETE FROM account_favorites WHERE account_id = ?1 AND user_id = ?2",
            rusqlite::params![account_id.to_string(), user_id.to_string()],
        )?;
        Ok(())
    }

    fn insert_file(&mut self, file: &AccountFile) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO account_files (id, account_id, name, size, content) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                file.id.to_string(),
                file.account_id.to_string(),
                file.name,
                file.size,
                file.content,
            ],
        )?;
        Ok(())
    }

    fn list_files(&self, account_id: Uuid) -> Result<Vec<AccountFile>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, account_id, name, size, content FROM account_files \
             WHERE account_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map([account_id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Vec<u8>>(4)?,
            ))
        })?;

        let mut files = Vec::new();
        for file in rows {
            let (id, account_id, name, size, content) = file?;
            files.push(AccountFile {
                id: parse_uuid(&id, "file")?,
                account_id: parse_uuid(&account_id, "file account")?,
                name,
                size,
                content,
            });
        }
        Ok(files)
    }

    fn delete_file(&mut self, id: Uuid) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM account_files WHERE id = ?1", [id.to_string()])?;
        Ok(())
    }

    fn insert_history(&mut self, entry: &AccountHistoryEntry) -> Result<()> {
        let conn = self.lock_conn()?;
        insert_history_row(&conn, entry)
    }

    fn get_history(&self, id: Uuid) -> Result<Option<AccountHistoryEntry>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {} FROM account_history h WHERE h.id = ?1",
            HISTORY_COLUMNS
        );
        let row = conn
            .query_row(&sql, [id.to_string()], HistoryRow::from_row)
            .optional()?;
        row.map(AccountHistoryEntry::try_from).transpose()
    }

    fn list_history(&self, account_id: Uuid) -> Result<Vec<AccountHistoryEntry>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {} FROM account_history h WHERE h.account_id = ?1 ORDER BY h.date DESC",
            HISTORY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([account_id.to_string()], HistoryRow::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(AccountHistoryEntry::try_from(row?)?);
        }
        Ok(entries)
    }

    fn list_all_history(&self) -> Result<Vec<AccountHistoryEntry>> {
        let conn = self.lock_conn()?;
        let sql = format!(
            "SELECT {} FROM account_history h ORDER BY h.date",
            HISTORY_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], HistoryRow::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(AccountHistoryEntry::try_from(row?)?);
        }
        Ok(entries)
    }

    fn delete_history_by_ids(&mut self, ids: &[Uuid]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.lock_conn()?;
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!("DELETE FROM account_history WHERE id IN ({})", placeholders);
        let deleted = conn.execute(
            &sql,
            rusqlite::params_from_iter(ids.iter().map(|id| id.to_string())),
        )?;
        Ok(deleted)
    }

    fn delete_history_for_account(&mut self, account_id: Uuid) -> Result<usize> {
        let conn = self.lock_conn()?;
        let deleted = conn.execute(
            "DELETE FROM account_history WHERE account_id = ?1",
            [account_id.to_string()],
        )?;
        Ok(deleted)
    }

    fn insert_user(&mut self, user: &User) -> Result<()> {
        let conn = self.lock_conn()?;
        let profile_json = serde_json::to_string(&user.profile)?;
        conn.execute(
            "INSERT INTO users (id, login, name, user_group_id, profile_id, profile_json, \
             is_admin_app, is_admin_acc, is_disabled, last_key_update) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            rusqlite::params![
                user.id.to_string(),
                user.login,
                user.name,
                user.user_group_id.to_string(),
                user.profile_id.map(|id| id.to_string()),
                profile_json,
                user.is_admin_app,
                user.is_admin_acc,
                user.is_disabled,
                user.last_key_update,
            ],
        )?;
        Ok(())
    }

    fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
        let row = conn
            .query_row(&sql, [id.to_string()], UserRow::from_row)
            .optional()?;
        row.map(User::try_from).transpose()
    }

    fn get_user_by_login(&self, login: &str) -> Result<Option<User>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {} FROM users WHERE login = ?1", USER_COLUMNS);
        let row = conn
            .query_row(&sql, [login], UserRow::from_row)
            .optional()?;
        row.map(User::try_from).transpose()
    }

    fn update_user(&mut self, user: &User) -> Result<()> {
        let conn = self.lock_conn()?;
        let profile_json = serde_json::to_string(&user.profile)?;
        let updated = conn.execute(
            "UPDATE users SET login = ?1, name = ?2, user_group_id = ?3, profile_id = ?4, \
             profile_json = ?5, is_admin_app = ?6, is_admin_acc = ?7, is_disabled = ?8, \
             last_key_update = ?9 WHERE id = ?10",
            rusqlite::params![
                user.login,
                user.name,
                user.user_group_id.to_string(),
                user.profile_id.map(|id| id.to_string()),
                profile_json,
                user.is_admin_app,
                user.is_admin_acc,
                user.is_disabled,
                user.last_key_update,
                user.id.to_string(),
            ],
        )?;
        if updated == 0 {
            return Err(VaultError::UnknownUser(user.login.clone()));
        }
        Ok(())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.lock_conn()?;
        let sql = format!("SELECT {} FROM users ORDER BY login", USER_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], UserRow::from_row)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(User::try_from(row?)?);
        }
        Ok(users)
    }

    fn insert_group(&mut self, group: &UserGroup) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO user_groups (id, name) VALUES (?1, ?2)",
            rusqlite::params![group.id.to_string(), group.name],
        )?;
        Ok(())
    }

    fn get_group(&self, id: Uuid) -> Result<Option<UserGroup>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT id, name FROM user_groups WHERE id = ?1",
                [id.to_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        row.map(|(id, name)| {
            Ok(UserGroup {
                id: parse_uuid(&id, "group")?,
                name,
            })
        })
        .transpose()
    }

    fn list_groups(&self) -> Result<Vec<UserGroup>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM user_groups ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut groups = Vec::new();
        for row in rows {
            let (id, name) = row?;
            groups.push(UserGroup {
                id: parse_uuid(&id, "group")?,
                name,
            });
        }
        Ok(groups)
    }

    fn insert_category(&mut self, category: &Category) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO categories (id, name) VALUES (?1, ?2)",
            rusqlite::params![category.id.to_string(), category.name],
        )?;
        Ok(())
    }

    fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut categories = Vec::new();
        for row in rows {
            let (id, name) = row?;
            categories.push(Category {
                id: parse_uuid(&id, "category")?,
                name,
            });
        }
        Ok(categories)
    }

    fn insert_client(&mut self, client: &Client) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO clients (id, name) VALUES (?1, ?2)",
            rusqlite::params![client.id.to_string(), client.name],
        )?;
        Ok(())
    }

    fn list_clients(&self) -> Result<Vec<Client>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM clients ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut clients = Vec::new();
        for row in rows {
            let (id, name) = row?;
            clients.push(Client {
                id: parse_uuid(&id, "client")?,
                name,
            });
        }
        Ok(clients)
    }

    fn insert_tag(&mut self, tag: &Tag) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO tags (id, name) VALUES (?1, ?2)",
            rusqlite::params![tag.id.to_string(), tag.name],
        )?;
        Ok(())
    }

    fn list_tags(&self) -> Result<Vec<Tag>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM tags ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut tags = Vec::new();
        for row in rows {
            let (id, name) = row?;
            tags.push(Tag {
                id: parse_uuid(&id, "tag")?,
                name,
            });
        }
        Ok(tags)
    }

    fn insert_preset(&mut self, preset: &DefaultPermissionPreset) -> Result<()> {
        let conn = self.lock_conn()?;
        let (target_kind, target_id) = preset_target_parts(preset);
        let bundle_json = serde_json::to_string(&preset.bundle)?;
        conn.execute(
            "INSERT INTO permission_presets (id, priority, fixed, target_kind, target_id, \
             bundle_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                preset.id.to_string(),
                preset.priority,
                preset.fixed,
                target_kind,
                target_id,
                bundle_json,
            ],
        )?;
        Ok(())
    }

    fn list_presets(&self) -> Result<Vec<DefaultPermissionPreset>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, priority, fixed, target_kind, target_id, bundle_json \
             FROM permission_presets ORDER BY priority",
        )?;
        let rows = stmt.query_map([], PresetRow::from_row)?;

        let mut presets = Vec::new();
        for row in rows {
            presets.push(DefaultPermissionPreset::try_from(row?)?);
        }
        Ok(presets)
    }

    fn delete_preset(&mut self, id: Uuid) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            "DELETE FROM permission_presets WHERE id = ?1",
            [id.to_string()],
        )?;
        Ok(())
    }

    fn apply_rotation(&mut self, batch: &RotationBatch) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        let new_hash = batch.new_state.key_hash();

        for rewrapped in &batch.accounts {
            let updated = tx.execute(
                "UPDATE accounts SET key = ?1, key_hash = ?2 WHERE id = ?3 AND key_hash = ?4",
                rusqlite::params![
                    rewrapped.key,
                    new_hash,
                    rewrapped.id.to_string(),
                    batch.expected_key_hash,
                ],
            )?;
            if updated != 1 {
                return Err(VaultError::ConstraintViolation(format!(
                    "account {} changed during rotation",
                    rewrapped.id
                )));
            }
        }

        for rewrapped in &batch.history {
            let updated = tx.execute(
                "UPDATE account_history SET key = ?1, key_hash = ?2 \
                 WHERE id = ?3 AND key_hash = ?4",
                rusqlite::params![
                    rewrapped.key,
                    new_hash,
                    rewrapped.id.to_string(),
                    batch.expected_key_hash,
                ],
            )?;
            if updated != 1 {
                return Err(VaultError::ConstraintViolation(format!(
                    "history entry {} changed during rotation",
                    rewrapped.id
                )));
            }
        }

        save_master_key_state_row(&tx, &batch.new_state)?;

        tx.execute("UPDATE users SET last_key_update = 0", [])?;
        tx.execute(
            "UPDATE users SET last_key_update = ?1 WHERE id = ?2",
            rusqlite::params![batch.new_state.version, batch.actor_id.to_string()],
        )?;

        tx.commit()?;
        Ok(())
    }
}

fn preset_target_parts(preset: &DefaultPermissionPreset) -> (&'static str, String) {
    use crate::acl::preset::PresetTarget;
    match preset.target {
        PresetTarget::User(id) => ("user", id.to_string()),
        PresetTarget::Group(id) => ("group", id.to_string()),
        PresetTarget::Profile(id) => ("profile", id.to_string()),
    }
}
