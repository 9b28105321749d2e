//! Core data types for the storage layer.
//!
//! These mirror the persisted relations one to one. Secret material only
//! ever appears here in ciphertext form (`key`, `pass`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A credential account row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Login / username stored with the credential
    pub login: String,

    /// Associated URL
    pub url: String,

    /// Free-form notes
    pub notes: String,

    /// Category, if assigned
    pub category_id: Option<Uuid>,

    /// Client the credential belongs to, if assigned
    pub client_id: Option<Uuid>,

    /// Owning user
    pub user_id: Uuid,

    /// Owning group
    pub user_group_id: Uuid,

    /// Last editor, if ever edited
    pub user_edit_id: Option<Uuid>,

    /// Wrapped per-account content key (envelope bytes)
    pub key: Vec<u8>,

    /// Sealed secret ciphertext
    pub pass: Vec<u8>,

    /// Fingerprint of the master key state `key` was wrapped under
    pub key_hash: String,

    /// Visible only to the owning user
    pub is_private: bool,

    /// Visible only to members of the owning group
    pub is_private_group: bool,

    /// Members of the owning group may edit
    pub other_user_group_edit: bool,

    /// Explicitly granted users may edit regardless of grant `is_edit`
    pub other_user_edit: bool,

    /// When the secret was last set
    pub pass_date: DateTime<Utc>,

    /// When the secret is due for a change, if scheduled
    pub pass_date_change: Option<DateTime<Utc>>,

    /// Account this one was copied from, if any
    pub parent_id: Option<Uuid>,

    /// Times the account detail was viewed
    pub count_view: i64,

    /// Times the secret was decrypted
    pub count_decrypt: i64,

    /// Creation timestamp
    pub date_add: DateTime<Utc>,

    /// Last edit timestamp (equals `date_add` until first edit)
    pub date_edit: DateTime<Utc>,
}

/// Builder for creating accounts. The secret itself is passed separately
/// so plaintext never sits in a plain struct field.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Display name
    pub name: String,

    /// Login / username
    pub login: String,

    /// Associated URL
    pub url: String,

    /// Free-form notes
    pub notes: String,

    /// Category, if assigned
    pub category_id: Option<Uuid>,

    /// Client, if assigned
    pub client_id: Option<Uuid>,

    /// Owning group; defaults to the creator's group
    pub user_group_id: Option<Uuid>,

    /// Restrict visibility to the owning user
    pub is_private: bool,

    /// Restrict visibility to the owning group
    pub is_private_group: bool,

    /// Allow granted users to edit
    pub other_user_edit: bool,

    /// Allow owning-group members to edit
    pub other_user_group_edit: bool,

    /// Scheduled secret change, if any
    pub pass_date_change: Option<DateTime<Utc>>,

    /// Source account when copying
    pub parent_id: Option<Uuid>,

    /// Tags to attach on creation
    pub tags: Vec<Uuid>,
}

impl NewAccount {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            login: String::new(),
            url: String::new(),
            notes: String::new(),
            category_id: None,
            client_id: None,
            user_group_id: None,
            is_private: false,
            is_private_group: false,
            other_user_edit: false,
            other_user_group_edit: false,
            pass_date_change: None,
            parent_id: None,
            tags: Vec::new(),
        }
    }

    pub fn with_login(mut self, login: impl Into<String>) -> Self {
        self.login = login.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn with_client(mut self, client_id: Uuid) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn with_group(mut self, user_group_id: Uuid) -> Self {
        self.user_group_id = Some(user_group_id);
        self
    }

    pub fn with_tags(mut self, tags: Vec<Uuid>) -> Self {
        self.tags = tags;
        self
    }

    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }

    pub fn private_group(mut self) -> Self {
        self.is_private_group = true;
        self
    }

    pub fn with_other_user_edit(mut self, allowed: bool) -> Self {
        self.other_user_edit = allowed;
        self
    }

    pub fn with_other_user_group_edit(mut self, allowed: bool) -> Self {
        self.other_user_group_edit = allowed;
        self
    }

    pub fn with_pass_date_change(mut self, due: DateTime<Utc>) -> Self {
        self.pass_date_change = Some(due);
        self
    }
}

/// Business-field replacement for an account edit.
///
/// Carries the caller's last-seen `date_edit` so concurrent edits are
/// rejected instead of silently overwriting each other.
#[derive(Debug, Clone)]
pub struct AccountUpdate {
    pub name: String,
    pub login: String,
    pub url: String,
    pub notes: String,
    pub category_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub user_group_id: Uuid,
    pub is_private: bool,
    pub is_private_group: bool,
    pub other_user_edit: bool,
    pub other_user_group_edit: bool,
    pub pass_date_change: Option<DateTime<Utc>>,

    /// The `date_edit` the caller read before editing
    pub expected_date_edit: DateTime<Utc>,
}

impl AccountUpdate {
    /// Start from the account's current fields; callers change what they
    /// mean to change.
    pub fn from_account(account: &Account) -> Self {
        Self {
            name: account.name.clone(),
            login: account.login.clone(),
            url: account.url.clone(),
            notes: account.notes.clone(),
            category_id: account.category_id,
            client_id: account.client_id,
            user_group_id: account.user_group_id,
            is_private: account.is_private,
            is_private_group: account.is_private_group,
            other_user_edit: account.other_user_edit,
            other_user_group_edit: account.other_user_group_edit,
            pass_date_change: account.pass_date_change,
            expected_date_edit: account.date_edit,
        }
    }
}

/// An immutable snapshot of an account taken before a mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountHistoryEntry {
    /// Unique identifier of the snapshot itself
    pub id: Uuid,

    /// Account this snapshot belongs to
    pub account_id: Uuid,

    pub name: String,
    pub login: String,
    pub url: String,
    pub notes: String,
    pub category_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub user_id: Uuid,
    pub user_group_id: Uuid,
    pub user_edit_id: Option<Uuid>,

    /// Wrapped content key as it stood at snapshot time
    pub key: Vec<u8>,

    /// Sealed secret as it stood at snapshot time
    pub pass: Vec<u8>,

    /// Master key state fingerprint describing `key`
    pub key_hash: String,

    pub is_private: bool,
    pub is_private_group: bool,
    pub other_user_edit: bool,
    pub other_user_group_edit: bool,
    pub pass_date: DateTime<Utc>,
    pub pass_date_change: Option<DateTime<Utc>>,
    pub parent_id: Option<Uuid>,
    pub count_view: i64,
    pub count_decrypt: i64,
    pub date_add: DateTime<Utc>,
    pub date_edit: DateTime<Utc>,

    /// Snapshot taken ahead of an edit or restore
    pub is_modify: bool,

    /// Snapshot taken ahead of a deletion
    pub is_deleted: bool,

    /// When the snapshot was taken
    pub date: DateTime<Utc>,
}

/// Per-user grant on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGrant {
    pub user_id: Uuid,
    pub is_edit: bool,
}

/// Per-group grant on an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupGrant {
    pub user_group_id: Uuid,
    pub is_edit: bool,
}

/// The explicit grant rows attached to one account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountGrants {
    pub users: Vec<UserGrant>,
    pub groups: Vec<GroupGrant>,
}

impl AccountGrants {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.groups.is_empty()
    }
}

/// Capability flags from a user's profile. Item-level access is always
/// intersected with these.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePermissions {
    #[serde(default)]
    pub acc_view: bool,
    #[serde(default)]
    pub acc_view_pass: bool,
    #[serde(default)]
    pub acc_view_history: bool,
    #[serde(default)]
    pub acc_add: bool,
    #[serde(default)]
    pub acc_edit: bool,
    #[serde(default)]
    pub acc_edit_pass: bool,
    #[serde(default)]
    pub acc_delete: bool,
    #[serde(default)]
    pub acc_permission: bool,
}

impl ProfilePermissions {
    /// Every capability enabled. Typical profile for vault operators.
    pub fn all() -> Self {
        Self {
            acc_view: true,
            acc_view_pass: true,
            acc_view_history: true,
            acc_add: true,
            acc_edit: true,
            acc_edit_pass: true,
            acc_delete: true,
            acc_permission: true,
        }
    }

    /// Read-only subset: view and reveal, nothing else.
    pub fn read_only() -> Self {
        Self {
            acc_view: true,
            acc_view_pass: true,
            acc_view_history: true,
            ..Self::default()
        }
    }
}

/// A vault user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier
    pub id: Uuid,

    /// Login name, unique
    pub login: String,

    /// Display name
    pub name: String,

    /// Primary group
    pub user_group_id: Uuid,

    /// Profile template reference, used by permission presets
    pub profile_id: Option<Uuid>,

    /// Capability flags (denormalized from the profile template)
    pub profile: ProfilePermissions,

    /// Application administrator: bypasses item-level rules
    pub is_admin_app: bool,

    /// Accounts administrator: ownership-strength access to accounts
    pub is_admin_acc: bool,

    /// Disabled users cannot open sessions
    pub is_disabled: bool,

    /// Master key state version this user last unlocked under
    pub last_key_update: u32,
}

/// Builder for creating users.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub login: String,
    pub name: String,
    pub user_group_id: Uuid,
    pub profile_id: Option<Uuid>,
    pub profile: ProfilePermissions,
    pub is_admin_app: bool,
    pub is_admin_acc: bool,
}

impl NewUser {
    pub fn new(login: impl Into<String>, user_group_id: Uuid) -> Self {
        let login = login.into();
        Self {
            name: login.clone(),
            login,
            user_group_id,
            profile_id: None,
            profile: ProfilePermissions::default(),
            is_admin_app: false,
            is_admin_acc: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_profile(mut self, profile: ProfilePermissions) -> Self {
        self.profile = profile;
        self
    }

    pub fn admin_app(mut self) -> Self {
        self.is_admin_app = true;
        self
    }

    pub fn admin_acc(mut self) -> Self {
        self.is_admin_acc = true;
        self
    }
}

/// A user group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserGroup {
    pub id: Uuid,
    pub name: String,
}

/// An account category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

/// A client accounts belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
}

/// A free-form tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

/// One row's replacement key material during a rotation.
#[derive(Debug, Clone)]
pub struct RewrappedKey {
    /// Account or history row id
    pub id: Uuid,

    /// Fresh envelope bytes wrapped under the new unlock key
    pub key: Vec<u8>,
}

/// Everything a master passphrase rotation writes, applied atomically.
#[derive(Debug, Clone)]
pub struct RotationBatch {
    /// The successor master key state
    pub new_state: crate::crypto::MasterKeyState,

    /// Pre-rotation fingerprint; every guarded update checks it
    pub expected_key_hash: String,

    /// Account rows to re-wrap
    pub accounts: Vec<RewrappedKey>,

    /// History rows to re-wrap
    pub history: Vec<RewrappedKey>,

    /// The rotating user; everyone else must re-validate their session
    pub actor_id: Uuid,
}

/// A file attached to an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountFile {
    /// Unique identifier
    pub id: Uuid,

    /// Owning account
    pub account_id: Uuid,

    /// Original file name
    pub name: String,

    /// Size in bytes
    pub size: i64,

    /// Raw content
    pub content: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_account_builder() {
        let category = Uuid::new_v4();
        let tag = Uuid::new_v4();

        let new = NewAccount::new("mail relay")
            .with_login("postmaster")
            .with_url("https://mail.example.com")
            .with_category(category)
            .with_tags(vec![tag])
            .private();

        assert_eq!(new.name, "mail relay");
        assert_eq!(new.login, "postmaster");
        assert_eq!(new.category_id, Some(category));
        assert_eq!(new.tags, vec![tag]);
        assert!(new.is_private);
        assert!(!new.is_private_group);
    }

    #[test]
    fn test_account_update_prefills_from_account() {
        let account = Account {
            id: Uuid::new_v4(),
            name: "db".into(),
            login: "root".into(),
            url: String::new(),
            notes: String::new(),
            category_id: None,
            client_id: Some(Uuid::new_v4()),
            user_id: Uuid::new_v4(),
            user_group_id: Uuid::new_v4(),
            user_edit_id: None,
            key: vec![1],
            pass: vec![2],
            key_hash: "h".into(),
            is_private: false,
            is_private_group: true,
            other_user_group_edit: true,
            other_user_edit: false,
            pass_date: Utc::now(),
            pass_date_change: None,
            parent_id: None,
            count_view: 3,
            count_decrypt: 1,
            date_add: Utc::now(),
            date_edit: Utc::now(),
        };

        let update = AccountUpdate::from_account(&account);
        assert_eq!(update.name, "db");
        assert_eq!(update.client_id, account.client_id);
        assert!(update.is_private_group);
        assert!(update.other_user_group_edit);
        assert_eq!(update.expected_date_edit, account.date_edit);
    }

    #[test]
    fn test_profile_permissions_json_defaults_missing_flags() {
        let profile: ProfilePermissions =
            serde_json::from_str(r#"{"acc_view":true,"acc_edit":true}"#).unwrap();
        assert!(profile.acc_view);
        assert!(profile.acc_edit);
        assert!(!profile.acc_view_pass);
        assert!(!profile.acc_delete);
    }

    #[test]
    fn test_profile_all_enables_everything() {
        let all = ProfilePermissions::all();
        assert!(all.acc_view && all.acc_view_pass && all.acc_view_history);
        assert!(all.acc_add && all.acc_edit && all.acc_edit_pass);
        assert!(all.acc_delete && all.acc_permission);
    }
}
