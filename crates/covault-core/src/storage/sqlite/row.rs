//! Raw row types for database queries.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::acl::preset::{DefaultPermissionPreset, PermissionBundle, PresetTarget};
use crate::crypto::kdf::SALT_LENGTH;
use crate::crypto::MasterKeyState;
use crate::error::{Result, VaultError};
use crate::storage::types::{Account, AccountHistoryEntry, ProfilePermissions, User};

pub(super) fn parse_uuid(value: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| VaultError::QueryError(format!("invalid {} UUID: {}", what, e)))
}

fn parse_uuid_opt(value: Option<&str>, what: &str) -> Result<Option<Uuid>> {
    value.map(|v| parse_uuid(v, what)).transpose()
}

fn parse_timestamp(value: &str, what: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| VaultError::QueryError(format!("invalid {} timestamp: {}", what, e)))
}

fn parse_timestamp_opt(value: Option<&str>, what: &str) -> Result<Option<DateTime<Utc>>> {
    value.map(|v| parse_timestamp(v, what)).transpose()
}

/// Raw account row, before parsing into the domain type.
#[derive(Debug)]
pub struct AccountRow {
    pub id: String,
    pub name: String,
    pub login: String,
    pub url: String,
    pub notes: String,
    pub category_id: Option<String>,
    pub client_id: Option<String>,
    pub user_id: String,
    pub user_group_id: String,
    pub user_edit_id: Option<String>,
    pub key: Vec<u8>,
    pub pass: Vec<u8>,
    pub key_hash: String,
    pub is_private: bool,
    pub is_private_group: bool,
    pub other_user_group_edit: bool,
    pub other_user_edit: bool,
    pub pass_date: String,
    pub pass_date_change: Option<String>,
    pub parent_id: Option<String>,
    pub count_view: i64,
    pub count_decrypt: i64,
    pub date_add: String,
    pub date_edit: String,
}

impl AccountRow {
    /// Read a row in `ACCOUNT_COLUMNS` order.
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            login: row.get(2)?,
            url: row.get(3)?,
            notes: row.get(4)?,
            category_id: row.get(5)?,
            client_id: row.get(6)?,
            user_id: row.get(7)?,
            user_group_id: row.get(8)?,
            user_edit_id: row.get(9)?,
            key: row.get(10)?,
            pass: row.get(11)?,
            key_hash: row.get(12)?,
            is_private: row.get(13)?,
            is_private_group: row.get(14)?,
            other_user_group_edit: row.get(15)?,
            other_user_edit: row.get(16)?,
            pass_date: row.get(17)?,
            pass_date_change: row.get(18)?,
            parent_id: row.get(19)?,
            count_view: row.get(20)?,
            count_decrypt: row.get(21)?,
            date_add: row.get(22)?,
            date_edit: row.get(23)?,
        })
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = VaultError;

    fn try_from(row: AccountRow) -> Result<Self> {
        Ok(Account {
            id: parse_uuid(&row.id, "account")?,
            name: row.name,
            login: row.login,
            url: row.url,
            notes: row.notes,
            category_id: parse_uuid_opt(row.category_id.as_deref(), "category")?,
            client_id: parse_uuid_opt(row.client_id.as_deref(), "client")?,
            user_id: parse_uuid(&row.user_id, "owner")?,
            user_group_id: parse_uuid(&row.user_group_id, "owner group")?,
            user_edit_id: parse_uuid_opt(row.user_edit_id.as_deref(), "editor")?,
            key: row.key,
            pass: row.pass,
            key_hash: row.key_hash,
            is_private: row.is_private,
            is_private_group: row.is_private_group,
            other_user_group_edit: row.other_user_group_edit,
            other_user_edit: row.other_user_edit,
            pass_date: parse_timestamp(&row.pass_date, "pass_date")?,
            pass_date_change: parse_timestamp_opt(row.pass_date_change.as_deref(), "pass_date_change")?,
            parent_id: parse_uuid_opt(row.parent_id.as_deref(), "parent")?,
            count_view: row.count_view,
            count_decrypt: row.count_decrypt,
            date_add: parse_timestamp(&row.date_add, "date_add")?,
            date_edit: parse_timestamp(&row.date_edit, "date_edit")?,
        })
    }
}

/// Raw history row, before parsing into the domain type.
#[derive(Debug)]
pub struct HistoryRow {
    pub id: String,
    pub account_id: String,
    pub account: AccountRow,
    pub is_modify: bool,
    pub is_deleted: bool,
    pub date: String,
}

impl HistoryRow {
    /// Read a row in `HISTORY_COLUMNS` order: id, account_id, then the
    /// snapshot fields in account order, then the history fields.
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            account_id: row.get(1)?,
            account: AccountRow {
                id: row.get(1)?,
                name: row.get(2)?,
                login: row.get(3)?,
                url: row.get(4)?,
                notes: row.get(5)?,
                category_id: row.get(6)?,
                client_id: row.get(7)?,
                user_id: row.get(8)?,
                user_group_id: row.get(9)?,
                user_edit_id: row.get(10)?,
                key: row.get(11)?,
                pass: row.get(12)?,
                key_hash: row.get(13)?,
                is_private: row.get(14)?,
                is_private_group: row.get(15)?,
                other_user_group_edit: row.get(16)?,
                other_user_edit: row.get(17)?,
                pass_date: row.get(18)?,
                pass_date_change: row.get(19)?,
                parent_id: row.get(20)?,
                count_view: row.get(21)?,
                count_decrypt: row.get(22)?,
                date_add: row.get(23)?,
                date_edit: row.get(24)?,
            },
            is_modify: row.get(25)?,
            is_deleted: row.get(26)?,
            date: row.get(27)?,
        })
    }
}

impl TryFrom<HistoryRow> for AccountHistoryEntry {
    type Error = VaultError;

    fn try_from(row: HistoryRow) -> Result<Self> {
        let snapshot = Account::try_from(row.account)?;
        Ok(AccountHistoryEntry {
            id: parse_uuid(&row.id, "history")?,
            account_id: snapshot.id,
            name: snapshot.name,
            login: snapshot.login,
            url: snapshot.url,
            notes: snapshot.notes,
            category_id: snapshot.category_id,
            client_id: snapshot.client_id,
            user_id: snapshot.user_id,
            user_group_id: snapshot.user_group_id,
            user_edit_id: snapshot.user_edit_id,
            key: snapshot.key,
            pass: snapshot.pass,
            key_hash: snapshot.key_hash,
            is_private: snapshot.is_private,
            is_private_group: snapshot.is_private_group,
            other_user_edit: snapshot.other_user_edit,
            other_user_group_edit: snapshot.other_user_group_edit,
            pass_date: snapshot.pass_date,
            pass_date_change: snapshot.pass_date_change,
            parent_id: snapshot.parent_id,
            count_view: snapshot.count_view,
            count_decrypt: snapshot.count_decrypt,
            date_add: snapshot.date_add,
            date_edit: snapshot.date_edit,
            is_modify: row.is_modify,
            is_deleted: row.is_deleted,
            date: parse_timestamp(&row.date, "snapshot")?,
        })
    }
}

/// Raw user row.
#[derive(Debug)]
pub struct UserRow {
    pub id: String,
    pub login: String,
    pub name: String,
    pub user_group_id: String,
    pub profile_id: Option<String>,
    pub profile_json: String,
    pub is_admin_app: bool,
    pub is_admin_acc: bool,
    pub is_disabled: bool,
    pub last_key_update: i64,
}

impl UserRow {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            login: row.get(1)?,
            name: row.get(2)?,
            user_group_id: row.get(3)?,
            profile_id: row.get(4)?,
            profile_json: row.get(5)?,
            is_admin_app: row.get(6)?,
            is_admin_acc: row.get(7)?,
            is_disabled: row.get(8)?,
            last_key_update: row.get(9)?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = VaultError;

    fn try_from(row: UserRow) -> Result<Self> {
        let profile: ProfilePermissions = serde_json::from_str(&row.profile_json)
            .map_err(|e| VaultError::QueryError(format!("invalid profile JSON: {}", e)))?;
        let last_key_update = u32::try_from(row.last_key_update)
            .map_err(|_| VaultError::QueryError("invalid last_key_update".to_string()))?;
        Ok(User {
            id: parse_uuid(&row.id, "user")?,
            login: row.login,
            name: row.name,
            user_group_id: parse_uuid(&row.user_group_id, "user group")?,
            profile_id: parse_uuid_opt(row.profile_id.as_deref(), "profile")?,
            profile,
            is_admin_app: row.is_admin_app,
            is_admin_acc: row.is_admin_acc,
            is_disabled: row.is_disabled,
            last_key_update,
        })
    }
}

/// Raw permission preset row.
#[derive(Debug)]
pub struct PresetRow {
    pub id: String,
    pub priority: i64,
    pub fixed: bool,
    pub target_kind: String,
    pub target_id: String,
    pub bundle_json: String,
}

impl PresetRow {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            priority: row.get(1)?,
            fixed: row.get(2)?,
            target_kind: row.get(3)?,
            target_id: row.get(4)?,
            bundle_json: row.get(5)?,
        })
    }
}

impl TryFrom<PresetRow> for DefaultPermissionPreset {
    type Error = VaultError;

    fn try_from(row: PresetRow) -> Result<Self> {
        let target_id = parse_uuid(&row.target_id, "preset target")?;
        let target = match row.target_kind.as_str() {
            "user" => PresetTarget::User(target_id),
            "group" => PresetTarget::Group(target_id),
            "profile" => PresetTarget::Profile(target_id),
            other => {
                return Err(VaultError::QueryError(format!(
                    "unknown preset target kind: {}",
                    other
                )))
            }
        };
        let bundle: PermissionBundle = serde_json::from_str(&row.bundle_json)
            .map_err(|e| VaultError::QueryError(format!("invalid preset bundle JSON: {}", e)))?;
        let priority = i32::try_from(row.priority)
            .map_err(|_| VaultError::QueryError("preset priority out of range".to_string()))?;
        Ok(DefaultPermissionPreset {
            id: parse_uuid(&row.id, "preset")?,
            priority,
            fixed: row.fixed,
            target,
            bundle,
        })
    }
}

/// Raw master key state row.
#[derive(Debug)]
pub struct MasterKeyStateRow {
    pub version: i64,
    pub kdf_salt: Vec<u8>,
    pub verifier: String,
    pub updated_at: String,
}

impl MasterKeyStateRow {
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            version: row.get(0)?,
            kdf_salt: row.get(1)?,
            verifier: row.get(2)?,
            updated_at: row.get(3)?,
        })
    }
}

impl TryFrom<MasterKeyStateRow> for MasterKeyState {
    type Error = VaultError;

    fn try_from(row: MasterKeyStateRow) -> Result<Self> {
        let kdf_salt: [u8; SALT_LENGTH] = row
            .kdf_salt
            .as_slice()
            .try_into()
            .map_err(|_| VaultError::QueryError("stored KDF salt has wrong length".to_string()))?;
        let version = u32::try_from(row.version)
            .map_err(|_| VaultError::QueryError("invalid master key version".to_string()))?;
        Ok(MasterKeyState {
            version,
            kdf_salt,
            verifier: row.verifier,
            updated_at: parse_timestamp(&row.updated_at, "master key state")?,
        })
    }
}
