//! High-level vault operations.
//!
//! [`Vault`] is the only path to plaintext secrets. Every operation takes a
//! [`Session`] opened with the master passphrase, evaluates access control
//! against the live rows, and only then touches key material. Decrypted
//! secrets are returned to the caller and never cached or persisted.

use std::path::Path;

use chrono::{DateTime, Utc};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::acl::preset::{merge_grants, DefaultPermissionPreset, PermissionBundle, PresetTarget};
use crate::acl::{evaluate, AccountAcl, AclPolicy, AclRequest, CallerContext};
use crate::crypto::{cipher, envelope, ContentKey, MasterKeyState, SecuredKey, UnlockKey};
use crate::error::{Result, VaultError};
use crate::history::{self, SnapshotReason};
use crate::search::{AccountQueryBuilder, AccountSearchFilter};
use crate::storage::types::{
    Account, AccountFile, AccountGrants, AccountHistoryEntry, AccountUpdate, Category, Client,
    NewAccount, NewUser, ProfilePermissions, RewrappedKey, RotationBatch, Tag, User, UserGroup,
};
use crate::storage::VaultStore;

/// Group created for the first administrator when a vault is initialized.
const INITIAL_GROUP_NAME: &str = "admins";

/// An authenticated session.
///
/// Holds the caller's identity and the unlock key derived from the master
/// passphrase at login. The key lives only as long as the session value;
/// dropping it zeroizes the key material.
#[derive(Debug)]
pub struct Session {
    user: User,
    unlock: UnlockKey,
}

impl Session {
    /// The user this session belongs to.
    pub fn user(&self) -> &User {
        &self.user
    }

    /// Master key state version the session unlocked against.
    pub fn key_version(&self) -> u32 {
        self.unlock.version()
    }
}

/// Outcome of a master passphrase rotation.
///
/// Rows already stale before the rotation are skipped, not failed: they
/// keep their old fingerprint and stay detectable.
#[derive(Debug, Clone)]
pub struct RotationReport {
    /// Version of the new master key state.
    pub new_version: u32,

    /// Account rows re-wrapped under the new unlock key.
    pub accounts_rewrapped: usize,

    /// History rows re-wrapped under the new unlock key.
    pub history_rewrapped: usize,

    /// Account rows skipped because their fingerprint was already stale.
    pub skipped_accounts: Vec<Uuid>,

    /// History rows skipped because their fingerprint was already stale.
    pub skipped_history: Vec<Uuid>,
}

/// A shared-credential vault over a storage backend.
pub struct Vault<S: VaultStore> {
    store: S,
    policy: AclPolicy,
}

impl<S: VaultStore> Vault<S> {
    // --- lifecycle ---

    /// Create a new vault with its first master key state and administrator.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidInput`] when the path already exists or
    /// the login is empty.
    pub fn initialize(path: &Path, passphrase: &SecretString, admin_login: &str) -> Result<Self> {
        if admin_login.trim().is_empty() {
            return Err(VaultError::InvalidInput(
                "administrator login must not be empty".to_string(),
            ));
        }

        let mut store = S::create(path)?;
        let state = MasterKeyState::initial(passphrase)?;
        store.save_master_key_state(&state)?;

        let group = UserGroup {
            id: Uuid::new_v4(),
            name: INITIAL_GROUP_NAME.to_string(),
        };
        store.insert_group(&group)?;

        let admin = User {
            id: Uuid::new_v4(),
            login: admin_login.to_string(),
            name: admin_login.to_string(),
            user_group_id: group.id,
            profile_id: None,
            profile: ProfilePermissions::all(),
            is_admin_app: true,
            is_admin_acc: false,
            is_disabled: false,
            last_key_update: state.version,
        };
        store.insert_user(&admin)?;

        tracing::info!(path = %path.display(), admin = %admin.login, "vault initialized");
        Ok(Self {
            store,
            policy: AclPolicy::default(),
        })
    }

    /// Open an existing vault.
    pub fn open(path: &Path) -> Result<Self> {
        let store = S::open(path)?;
        Ok(Self {
            store,
            policy: AclPolicy::default(),
        })
    }

    /// Replace the vault-wide access control policy.
    pub fn with_policy(mut self, policy: AclPolicy) -> Self {
        self.policy = policy;
        self
    }

    // --- sessions ---

    /// Open a session by verifying the master passphrase.
    ///
    /// A user whose last unlock predates the current master key state is
    /// brought forward on success: presenting the current passphrase is
    /// what re-validates them after a rotation.
    ///
    /// # Errors
    ///
    /// Unknown logins and wrong passphrases both surface as
    /// [`VaultError::InvalidCredentials`]; disabled users as
    /// [`VaultError::AccessDenied`].
    pub fn login(&mut self, login: &str, passphrase: &SecretString) -> Result<Session> {
        let mut user = self
            .store
            .get_user_by_login(login)?
            .ok_or(VaultError::InvalidCredentials)?;
        if user.is_disabled {
            return Err(VaultError::AccessDenied);
        }

        let state = self.require_state()?;
        let unlock = state.unlock(passphrase)?;

        if user.last_key_update != state.version {
            user.last_key_update = state.version;
            self.store.update_user(&user)?;
        }

        tracing::debug!(user = %user.login, version = state.version, "session opened");
        Ok(Session { user, unlock })
    }

    // --- accounts ---

    /// Create an account, sealing `secret` under a fresh content key.
    pub fn create_account(
        &mut self,
        session: &Session,
        new: NewAccount,
        secret: &SecretString,
    ) -> Result<Account> {
        if !session.user.profile.acc_add {
            return Err(VaultError::AccessDenied);
        }
        if new.name.trim().is_empty() {
            return Err(VaultError::InvalidInput(
                "account name must not be empty".to_string(),
            ));
        }
        if new.is_private && new.is_private_group {
            return Err(VaultError::InvalidInput(
                "account cannot be private to both a user and a group".to_string(),
            ));
        }

        let id = Uuid::new_v4();
        let content = ContentKey::generate();
        let key = envelope::wrap(&content, &session.unlock)?;
        let pass = cipher::encrypt_secret(secret.expose_secret().as_bytes(), &content, id)?;

        let now = Utc::now();
        let account = Account {
            id,
            name: new.name,
            login: new.login,
            url: new.url,
            notes: new.notes,
            category_id: new.category_id,
            client_id: new.client_id,
            user_id: session.user.id,
            user_group_id: new.user_group_id.unwrap_or(session.user.user_group_id),
            user_edit_id: None,
            key: key.into_bytes(),
            pass,
            key_hash: session.unlock.key_hash().to_string(),
            is_private: new.is_private,
            is_private_group: new.is_private_group,
            other_user_group_edit: new.other_user_group_edit,
            other_user_edit: new.other_user_edit,
            pass_date: now,
            pass_date_change: new.pass_date_change,
            parent_id: new.parent_id,
            count_view: 0,
            count_decrypt: 0,
            date_add: now,
            date_edit: now,
        };

        self.store.insert_account(&account)?;
        if !new.tags.is_empty() {
            self.store.set_account_tags(id, &new.tags)?;
        }

        tracing::debug!(account_id = %id, "account created");
        Ok(account)
    }

    /// Fetch an account the caller may view, with its capability record.
    ///
    /// The view counter is bumped on success. Accounts that do not exist
    /// are indistinguishable from forbidden ones.
    pub fn get_account(&mut self, session: &Session, id: Uuid) -> Result<(Account, AccountAcl)> {
        let account = self.load_account(id)?;
        let acl = self.acl_for(session, &account, false)?;
        if !acl.can_view {
            return Err(VaultError::AccessDenied);
        }
        self.store.bump_view_counter(id)?;
        Ok((account, acl))
    }

    /// Decrypt and return an account's secret.
    ///
    /// Access control runs strictly before any key material is touched.
    /// The decrypt counter is bumped only after a successful decryption.
    ///
    /// # Errors
    ///
    /// [`VaultError::NeedsKeyMigration`] when the account's key was
    /// wrapped under a superseded master key state.
    pub fn reveal_secret(&mut self, session: &Session, id: Uuid) -> Result<SecretString> {
        let account = self.load_account(id)?;
        let acl = self.acl_for(session, &account, false)?;
        if !acl.can_view || !acl.can_view_pass {
            return Err(VaultError::AccessDenied);
        }

        let secured = SecuredKey::from_bytes(account.key.clone())?;
        let content = envelope::unwrap(&secured, &session.unlock)?;
        let plaintext = cipher::decrypt_secret(&account.pass, &content, account.id)?;

        self.store.bump_decrypt_counter(id)?;
        secret_from_bytes(plaintext)
    }

    /// Replace an account's business fields.
    ///
    /// A pre-mutation snapshot is written in the same transaction; both
    /// roll back when another edit landed since `update.expected_date_edit`
    /// was read ([`VaultError::ConstraintViolation`]).
    pub fn update_account(
        &mut self,
        session: &Session,
        id: Uuid,
        update: AccountUpdate,
    ) -> Result<Account> {
        if update.name.trim().is_empty() {
            return Err(VaultError::InvalidInput(
                "account name must not be empty".to_string(),
            ));
        }
        if update.is_private && update.is_private_group {
            return Err(VaultError::InvalidInput(
                "account cannot be private to both a user and a group".to_string(),
            ));
        }

        let account = self.load_account(id)?;
        let acl = self.acl_for(session, &account, false)?;
        if !acl.can_edit {
            return Err(VaultError::AccessDenied);
        }

        let snapshot = history::snapshot(&account, SnapshotReason::Modify);
        let mut updated = account;
        updated.name = update.name;
        updated.login = update.login;
        updated.url = update.url;
        updated.notes = update.notes;
        updated.category_id = update.category_id;
        updated.client_id = update.client_id;
        updated.user_group_id = update.user_group_id;
        updated.is_private = update.is_private;
        updated.is_private_group = update.is_private_group;
        updated.other_user_edit = update.other_user_edit;
        updated.other_user_group_edit = update.other_user_group_edit;
        updated.pass_date_change = update.pass_date_change;
        updated.user_edit_id = Some(session.user.id);
        updated.date_edit = Utc::now();

        self.store
            .update_account(&updated, update.expected_date_edit, &snapshot)?;
        Ok(updated)
    }

    /// Replace an account's secret, sealing it under a fresh content key.
    ///
    /// Also refreshes the account's master key fingerprint, so rewriting
    /// the secret is how a stale account is brought forward.
    pub fn update_secret(
        &mut self,
        session: &Session,
        id: Uuid,
        secret: &SecretString,
        expected_date_edit: DateTime<Utc>,
    ) -> Result<Account> {
        let account = self.load_account(id)?;
        let acl = self.acl_for(session, &account, false)?;
        if !acl.can_edit_pass {
            return Err(VaultError::AccessDenied);
        }

        let snapshot = history::snapshot(&account, SnapshotReason::Modify);
        let content = ContentKey::generate();
        let key = envelope::wrap(&content, &session.unlock)?;
        let pass = cipher::encrypt_secret(secret.expose_secret().as_bytes(), &content, id)?;

        let now = Utc::now();
        let mut updated = account;
        updated.key = key.into_bytes();
        updated.pass = pass;
        updated.key_hash = session.unlock.key_hash().to_string();
        updated.pass_date = now;
        updated.user_edit_id = Some(session.user.id);
        updated.date_edit = now;

        self.store
            .update_account(&updated, expected_date_edit, &snapshot)?;
        Ok(updated)
    }

    /// Delete an account, archiving a final snapshot.
    pub fn delete_account(&mut self, session: &Session, id: Uuid) -> Result<()> {
        let account = self.load_account(id)?;
        let acl = self.acl_for(session, &account, false)?;
        if !acl.can_delete {
            return Err(VaultError::AccessDenied);
        }

        let snapshot = history::snapshot(&account, SnapshotReason::Delete);
        self.store.delete_account(id, &snapshot)?;
        tracing::debug!(account_id = %id, "account deleted");
        Ok(())
    }

    /// Copy an account into a new one owned by the caller.
    ///
    /// The secret is re-sealed under a fresh content key; the copy records
    /// its source in `parent_id` and carries the source's tags.
    pub fn copy_account(
        &mut self,
        session: &Session,
        source_id: Uuid,
        new_name: impl Into<String>,
    ) -> Result<Account> {
        let source = self.load_account(source_id)?;
        let acl = self.acl_for(session, &source, false)?;
        if !acl.can_copy {
            return Err(VaultError::AccessDenied);
        }

        let secured = SecuredKey::from_bytes(source.key.clone())?;
        let content = envelope::unwrap(&secured, &session.unlock)?;
        let mut plaintext = cipher::decrypt_secret(&source.pass, &content, source.id)?;

        let id = Uuid::new_v4();
        let fresh = ContentKey::generate();
        let key = envelope::wrap(&fresh, &session.unlock)?;
        let pass = cipher::encrypt_secret(&plaintext, &fresh, id)?;
        plaintext.zeroize();

        let tags: Vec<Uuid> = self
            .store
            .get_account_tags(source.id)?
            .into_iter()
            .map(|tag| tag.id)
            .collect();

        let now = Utc::now();
        let account = Account {
            id,
            name: new_name.into(),
            login: source.login.clone(),
            url: source.url.clone(),
            notes: source.notes.clone(),
            category_id: source.category_id,
            client_id: source.client_id,
            user_id: session.user.id,
            user_group_id: session.user.user_group_id,
            user_edit_id: None,
            key: key.into_bytes(),
            pass,
            key_hash: session.unlock.key_hash().to_string(),
            is_private: source.is_private,
            is_private_group: source.is_private_group,
            other_user_group_edit: source.other_user_group_edit,
            other_user_edit: source.other_user_edit,
            pass_date: now,
            pass_date_change: source.pass_date_change,
            parent_id: Some(source.id),
            count_view: 0,
            count_decrypt: 0,
            date_add: now,
            date_edit: now,
        };

        self.store.insert_account(&account)?;
        if !tags.is_empty() {
            self.store.set_account_tags(id, &tags)?;
        }
        Ok(account)
    }

    /// Run a filtered search scoped to what the caller may see.
    ///
    /// Authorization is enforced inside the query itself; rows a caller
    /// may not view are never fetched.
    pub fn search_accounts(
        &self,
        session: &Session,
        filter: &AccountSearchFilter,
    ) -> Result<Vec<Account>> {
        if let Some(pattern) = &filter.name_regex {
            Regex::new(pattern)
                .map_err(|e| VaultError::QueryError(format!("invalid name pattern: {}", e)))?;
        }

        let caller = CallerContext::for_user(&session.user);
        let presets = self.store.list_presets()?;
        let query = AccountQueryBuilder::for_caller(&caller, &presets)
            .with_filter(filter)
            .build();
        self.store.search_accounts(&query)
    }

    // --- history ---

    /// List an account's snapshots, newest first.
    pub fn list_history(
        &self,
        session: &Session,
        account_id: Uuid,
    ) -> Result<Vec<AccountHistoryEntry>> {
        let account = self.load_account(account_id)?;
        let acl = self.acl_for(session, &account, true)?;
        if !acl.can_view {
            return Err(VaultError::AccessDenied);
        }
        self.store.list_history(account_id)
    }

    /// Fetch one snapshot the caller may view.
    pub fn get_history_entry(
        &self,
        session: &Session,
        history_id: Uuid,
    ) -> Result<AccountHistoryEntry> {
        let entry = self
            .store
            .get_history(history_id)?
            .ok_or(VaultError::UnknownHistoryEntry(history_id))?;
        let account = self.load_account(entry.account_id)?;
        let acl = self.acl_for(session, &account, true)?;
        if !acl.can_view {
            return Err(VaultError::AccessDenied);
        }
        Ok(entry)
    }

    /// Decrypt the secret captured in a snapshot.
    ///
    /// # Errors
    ///
    /// [`VaultError::NeedsKeyMigration`] when the snapshot predates the
    /// current master key state; its ciphertext cannot be opened by the
    /// session's unlock key.
    pub fn reveal_history_secret(
        &self,
        session: &Session,
        history_id: Uuid,
    ) -> Result<SecretString> {
        let entry = self
            .store
            .get_history(history_id)?
            .ok_or(VaultError::UnknownHistoryEntry(history_id))?;
        let account = self.load_account(entry.account_id)?;
        let acl = self.acl_for(session, &account, true)?;
        if !acl.can_view || !acl.can_view_pass {
            return Err(VaultError::AccessDenied);
        }

        history::check_key_current(&entry, session.unlock.key_hash())?;
        let secured = SecuredKey::from_bytes(entry.key.clone())?;
        let content = envelope::unwrap(&secured, &session.unlock)?;
        let plaintext = cipher::decrypt_secret(&entry.pass, &content, entry.account_id)?;
        secret_from_bytes(plaintext)
    }

    /// Restore a snapshot onto its live account.
    ///
    /// The live state is snapshotted first, so the restore itself can be
    /// undone. Restoring a snapshot whose key material predates the
    /// current master key state is refused.
    pub fn restore_from_history(&mut self, session: &Session, history_id: Uuid) -> Result<Account> {
        let entry = self
            .store
            .get_history(history_id)?
            .ok_or(VaultError::UnknownHistoryEntry(history_id))?;
        let mut live = self.load_account(entry.account_id)?;
        let acl = self.acl_for(session, &live, true)?;
        if !acl.can_restore {
            return Err(VaultError::AccessDenied);
        }

        history::check_key_current(&entry, session.unlock.key_hash())?;

        let expected = live.date_edit;
        let snapshot = history::snapshot(&live, SnapshotReason::Modify);
        history::apply_restore(&mut live, &entry, session.user.id);
        self.store.update_account(&live, expected, &snapshot)?;

        tracing::debug!(account_id = %live.id, history_id = %history_id, "account restored");
        Ok(live)
    }

    /// Delete specific snapshots. Administrators only.
    pub fn delete_history_entries(&mut self, session: &Session, ids: &[Uuid]) -> Result<usize> {
        if !session.user.is_admin_app {
            return Err(VaultError::AccessDenied);
        }
        self.store.delete_history_by_ids(ids)
    }

    /// Drop every snapshot an account has accumulated. Administrators only.
    pub fn purge_account_history(&mut self, session: &Session, account_id: Uuid) -> Result<usize> {
        if !session.user.is_admin_app {
            return Err(VaultError::AccessDenied);
        }
        self.store.delete_history_for_account(account_id)
    }

    // --- rotation ---

    /// Rotate the master passphrase.
    ///
    /// Verifies the current passphrase, derives the successor state, and
    /// re-wraps every current account and history content key under the
    /// new unlock key. Sealed secrets are not touched. The whole write is
    /// atomic; a concurrent mutation fails the rotation instead of
    /// splitting the vault across two states. Every other user must
    /// present the new passphrase at their next login.
    pub fn rotate_master_passphrase(
        &mut self,
        session: &mut Session,
        current: &SecretString,
        new: &SecretString,
    ) -> Result<RotationReport> {
        if !session.user.is_admin_app {
            return Err(VaultError::AccessDenied);
        }

        let state = self.require_state()?;
        let old_unlock = state.unlock(current)?;
        let new_state = state.next(new)?;
        let new_unlock = new_state.unlock(new)?;
        let expected = state.key_hash();

        let mut accounts = Vec::new();
        let mut skipped_accounts = Vec::new();
        for account in self.store.list_all_accounts()? {
            if account.key_hash != expected {
                skipped_accounts.push(account.id);
                continue;
            }
            let secured = SecuredKey::from_bytes(account.key.clone())?;
            let content = envelope::unwrap(&secured, &old_unlock)?;
            let rewrapped = envelope::wrap(&content, &new_unlock)?;
            accounts.push(RewrappedKey {
                id: account.id,
                key: rewrapped.into_bytes(),
            });
        }

        let mut history = Vec::new();
        let mut skipped_history = Vec::new();
        for entry in self.store.list_all_history()? {
            if entry.key_hash != expected {
                skipped_history.push(entry.id);
                continue;
            }
            let secured = SecuredKey::from_bytes(entry.key.clone())?;
            let content = envelope::unwrap(&secured, &old_unlock)?;
            let rewrapped = envelope::wrap(&content, &new_unlock)?;
            history.push(RewrappedKey {
                id: entry.id,
                key: rewrapped.into_bytes(),
            });
        }

        let report = RotationReport {
            new_version: new_state.version,
            accounts_rewrapped: accounts.len(),
            history_rewrapped: history.len(),
            skipped_accounts,
            skipped_history,
        };

        let batch = RotationBatch {
            new_state,
            expected_key_hash: expected,
            accounts,
            history,
            actor_id: session.user.id,
        };
        self.store.apply_rotation(&batch)?;

        session.user.last_key_update = batch.new_state.version;
        session.unlock = new_unlock;

        tracing::info!(
            version = report.new_version,
            accounts = report.accounts_rewrapped,
            history = report.history_rewrapped,
            skipped = report.skipped_accounts.len() + report.skipped_history.len(),
            "master passphrase rotated"
        );
        Ok(report)
    }

    // --- grants, tags, favorites ---

    /// The explicit grant rows on an account.
    pub fn account_grants(&self, session: &Session, account_id: Uuid) -> Result<AccountGrants> {
        let account = self.load_account(account_id)?;
        let acl = self.acl_for(session, &account, false)?;
        if !acl.can_view {
            return Err(VaultError::AccessDenied);
        }
        self.store.get_account_grants(account_id)
    }

    /// Replace an account's explicit grants.
    ///
    /// Requires item edit access, plus the permission-management profile
    /// flag for anyone other than the owner.
    pub fn set_account_grants(
        &mut self,
        session: &Session,
        account_id: Uuid,
        grants: &AccountGrants,
    ) -> Result<()> {
        let account = self.load_account(account_id)?;
        let acl = self.acl_for(session, &account, false)?;
        let is_owner = account.user_id == session.user.id;
        if !acl.can_edit || !(is_owner || session.user.profile.acc_permission) {
            return Err(VaultError::AccessDenied);
        }
        self.store.set_account_grants(account_id, grants)
    }

    /// Replace an account's tag set.
    pub fn set_account_tags(
        &mut self,
        session: &Session,
        account_id: Uuid,
        tag_ids: &[Uuid],
    ) -> Result<()> {
        let account = self.load_account(account_id)?;
        let acl = self.acl_for(session, &account, false)?;
        if !acl.can_edit {
            return Err(VaultError::AccessDenied);
        }
        self.store.set_account_tags(account_id, tag_ids)
    }

    /// The tags attached to an account.
    pub fn account_tags(&self, session: &Session, account_id: Uuid) -> Result<Vec<Tag>> {
        let account = self.load_account(account_id)?;
        let acl = self.acl_for(session, &account, false)?;
        if !acl.can_view {
            return Err(VaultError::AccessDenied);
        }
        self.store.get_account_tags(account_id)
    }

    /// Mark an account as one of the caller's favorites.
    pub fn add_favorite(&mut self, session: &Session, account_id: Uuid) -> Result<()> {
        let account = self.load_account(account_id)?;
        let acl = self.acl_for(session, &account, false)?;
        if !acl.can_view {
            return Err(VaultError::AccessDenied);
        }
        self.store.add_favorite(account_id, session.user.id)
    }

    /// Remove an account from the caller's favorites.
    ///
    /// Not access checked: losing view access must not strand a stale
    /// favorite.
    pub fn remove_favorite(&mut self, session: &Session, account_id: Uuid) -> Result<()> {
        self.store.remove_favorite(account_id, session.user.id)
    }

    // --- files ---

    /// Attach a file to an account.
    pub fn attach_file(
        &mut self,
        session: &Session,
        account_id: Uuid,
        name: impl Into<String>,
        content: Vec<u8>,
    ) -> Result<AccountFile> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(VaultError::InvalidInput(
                "file name must not be empty".to_string(),
            ));
        }

        let account = self.load_account(account_id)?;
        let acl = self.acl_for(session, &account, false)?;
        if !acl.can_edit {
            return Err(VaultError::AccessDenied);
        }

        let file = AccountFile {
            id: Uuid::new_v4(),
            account_id,
            name,
            size: content.len() as i64,
            content,
        };
        self.store.insert_file(&file)?;
        Ok(file)
    }

    /// List the files attached to an account.
    pub fn list_files(&self, session: &Session, account_id: Uuid) -> Result<Vec<AccountFile>> {
        let account = self.load_account(account_id)?;
        let acl = self.acl_for(session, &account, false)?;
        if !acl.can_view {
            return Err(VaultError::AccessDenied);
        }
        self.store.list_files(account_id)
    }

    /// Detach a file from an account.
    pub fn remove_file(&mut self, session: &Session, account_id: Uuid, file_id: Uuid) -> Result<()> {
        let account = self.load_account(account_id)?;
        let acl = self.acl_for(session, &account, false)?;
        if !acl.can_edit {
            return Err(VaultError::AccessDenied);
        }

        let files = self.store.list_files(account_id)?;
        if !files.iter().any(|file| file.id == file_id) {
            return Err(VaultError::InvalidInput(
                "file does not belong to this account".to_string(),
            ));
        }
        self.store.delete_file(file_id)
    }

    // --- directory ---

    /// Create a user. Administrators only.
    pub fn create_user(&mut self, session: &Session, new: NewUser) -> Result<User> {
        if !session.user.is_admin_app {
            return Err(VaultError::AccessDenied);
        }
        if new.login.trim().is_empty() {
            return Err(VaultError::InvalidInput(
                "login must not be empty".to_string(),
            ));
        }
        if self.store.get_user_by_login(&new.login)?.is_some() {
            return Err(VaultError::ConstraintViolation(format!(
                "login '{}' already in use",
                new.login
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            login: new.login,
            name: new.name,
            user_group_id: new.user_group_id,
            profile_id: new.profile_id,
            profile: new.profile,
            is_admin_app: new.is_admin_app,
            is_admin_acc: new.is_admin_acc,
            is_disabled: false,
            last_key_update: 0,
        };
        self.store.insert_user(&user)?;
        Ok(user)
    }

    /// Enable or disable a user. Administrators only.
    pub fn set_user_disabled(
        &mut self,
        session: &Session,
        user_id: Uuid,
        disabled: bool,
    ) -> Result<User> {
        if !session.user.is_admin_app {
            return Err(VaultError::AccessDenied);
        }
        let mut user = self
            .store
            .get_user(user_id)?
            .ok_or_else(|| VaultError::UnknownUser(user_id.to_string()))?;
        user.is_disabled = disabled;
        self.store.update_user(&user)?;
        Ok(user)
    }

    /// List every user. Administrators only.
    pub fn list_users(&self, session: &Session) -> Result<Vec<User>> {
        if !session.user.is_admin_app {
            return Err(VaultError::AccessDenied);
        }
        self.store.list_users()
    }

    /// Resolve a login to its user record, for grant management.
    pub fn find_user(&self, _session: &Session, login: &str) -> Result<User> {
        self.store
            .get_user_by_login(login)?
            .ok_or_else(|| VaultError::UnknownUser(login.to_string()))
    }

    /// Create a user group. Administrators only.
    pub fn create_group(&mut self, session: &Session, name: impl Into<String>) -> Result<UserGroup> {
        if !session.user.is_admin_app {
            return Err(VaultError::AccessDenied);
        }
        let group = UserGroup {
            id: Uuid::new_v4(),
            name: name.into(),
        };
        self.store.insert_group(&group)?;
        Ok(group)
    }

    /// List every user group.
    pub fn list_groups(&self, _session: &Session) -> Result<Vec<UserGroup>> {
        self.store.list_groups()
    }

    /// Create a category.
    pub fn create_category(
        &mut self,
        session: &Session,
        name: impl Into<String>,
    ) -> Result<Category> {
        if !session.user.profile.acc_add {
            return Err(VaultError::AccessDenied);
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: name.into(),
        };
        self.store.insert_category(&category)?;
        Ok(category)
    }

    /// List every category.
    pub fn list_categories(&self, _session: &Session) -> Result<Vec<Category>> {
        self.store.list_categories()
    }

    /// Create a client.
    pub fn create_client(&mut self, session: &Session, name: impl Into<String>) -> Result<Client> {
        if !session.user.profile.acc_add {
            return Err(VaultError::AccessDenied);
        }
        let client = Client {
            id: Uuid::new_v4(),
            name: name.into(),
        };
        self.store.insert_client(&client)?;
        Ok(client)
    }

    /// List every client.
    pub fn list_clients(&self, _session: &Session) -> Result<Vec<Client>> {
        self.store.list_clients()
    }

    /// Create a tag.
    pub fn create_tag(&mut self, session: &Session, name: impl Into<String>) -> Result<Tag> {
        if !session.user.profile.acc_add {
            return Err(VaultError::AccessDenied);
        }
        let tag = Tag {
            id: Uuid::new_v4(),
            name: name.into(),
        };
        self.store.insert_tag(&tag)?;
        Ok(tag)
    }

    /// List every tag.
    pub fn list_tags(&self, _session: &Session) -> Result<Vec<Tag>> {
        self.store.list_tags()
    }

    /// Create a permission preset. Administrators only.
    pub fn create_preset(
        &mut self,
        session: &Session,
        priority: i32,
        fixed: bool,
        target: PresetTarget,
        bundle: PermissionBundle,
    ) -> Result<DefaultPermissionPreset> {
        if !session.user.is_admin_app {
            return Err(VaultError::AccessDenied);
        }
        let preset = DefaultPermissionPreset {
            id: Uuid::new_v4(),
            priority,
            fixed,
            target,
            bundle,
        };
        self.store.insert_preset(&preset)?;
        Ok(preset)
    }

    /// List every permission preset. Administrators only.
    pub fn list_presets(&self, session: &Session) -> Result<Vec<DefaultPermissionPreset>> {
        if !session.user.is_admin_app {
            return Err(VaultError::AccessDenied);
        }
        self.store.list_presets()
    }

    /// Delete a permission preset. Administrators only.
    pub fn delete_preset(&mut self, session: &Session, id: Uuid) -> Result<()> {
        if !session.user.is_admin_app {
            return Err(VaultError::AccessDenied);
        }
        self.store.delete_preset(id)
    }

    // --- helpers ---

    fn require_state(&self) -> Result<MasterKeyState> {
        self.store
            .get_master_key_state()?
            .ok_or_else(|| VaultError::InvalidInput("vault is not initialized".to_string()))
    }

    fn load_account(&self, id: Uuid) -> Result<Account> {
        self.store.get_account(id)?.ok_or(VaultError::AccessDenied)
    }

    /// Evaluate the caller's capabilities on one account.
    ///
    /// Preset fallback is resolved here, against the account owner's
    /// context.
    fn acl_for(&self, session: &Session, account: &Account, history: bool) -> Result<AccountAcl> {
        let explicit = self.store.get_account_grants(account.id)?;
        let presets = self.store.list_presets()?;
        let owner_profile_id = self
            .store
            .get_user(account.user_id)?
            .and_then(|owner| owner.profile_id);

        let grants = merge_grants(
            &explicit,
            &presets,
            account.user_id,
            account.user_group_id,
            owner_profile_id,
        );
        let request = AclRequest::from_account(account, grants);

        let mut caller = CallerContext::for_user(&session.user);
        if history {
            caller = caller.history_view();
        }
        Ok(evaluate(&request, &caller, &self.policy))
    }
}

/// Turn decrypted bytes into a guarded string, zeroizing on failure.
fn secret_from_bytes(bytes: Vec<u8>) -> Result<SecretString> {
    match String::from_utf8(bytes) {
        Ok(text) => Ok(SecretString::from(text)),
        Err(err) => {
            let mut bytes = err.into_bytes();
            bytes.zeroize();
            Err(VaultError::CryptoFailure(
                "decrypted secret is not valid UTF-8".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteVaultStore;
    use tempfile::tempdir;

    fn passphrase(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn scratch_vault() -> (tempfile::TempDir, Vault<SqliteVaultStore>, Session) {
        let dir = tempdir().unwrap();
        let mut vault = Vault::<SqliteVaultStore>::initialize(
            &dir.path().join("vault.db"),
            &passphrase("open sesame"),
            "root",
        )
        .unwrap();
        let session = vault.login("root", &passphrase("open sesame")).unwrap();
        (dir, vault, session)
    }

    #[test]
    fn test_initialize_then_login() {
        let (_dir, _vault, session) = scratch_vault();
        assert_eq!(session.user().login, "root");
        assert!(session.user().is_admin_app);
        assert_eq!(session.key_version(), 1);
    }

    #[test]
    fn test_login_wrong_passphrase_rejected() {
        let (_dir, mut vault, _session) = scratch_vault();
        let err = vault.login("root", &passphrase("wrong")).unwrap_err();
        assert!(matches!(err, VaultError::InvalidCredentials));
    }

    #[test]
    fn test_login_unknown_user_masked() {
        let (_dir, mut vault, _session) = scratch_vault();
        let err = vault.login("ghost", &passphrase("open sesame")).unwrap_err();
        assert!(matches!(err, VaultError::InvalidCredentials));
    }

    #[test]
    fn test_create_and_reveal_round_trip() {
        let (_dir, mut vault, session) = scratch_vault();
        let account = vault
            .create_account(
                &session,
                NewAccount::new("mail relay").with_login("postmaster"),
                &passphrase("hunter2"),
            )
            .unwrap();

        let revealed = vault.reveal_secret(&session, account.id).unwrap();
        assert_eq!(revealed.expose_secret(), "hunter2");

        let (fetched, acl) = vault.get_account(&session, account.id).unwrap();
        assert_eq!(fetched.name, "mail relay");
        assert!(acl.can_edit);
    }

    #[test]
    fn test_missing_account_masked_as_denied() {
        let (_dir, mut vault, session) = scratch_vault();
        let err = vault.get_account(&session, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, VaultError::AccessDenied));
    }

    #[test]
    fn test_both_private_flags_rejected() {
        let (_dir, mut vault, session) = scratch_vault();
        let mut new = NewAccount::new("broken");
        new.is_private = true;
        new.is_private_group = true;
        let err = vault
            .create_account(&session, new, &passphrase("x"))
            .unwrap_err();
        assert!(matches!(err, VaultError::InvalidInput(_)));
    }

    #[test]
    fn test_malformed_name_pattern_is_a_query_error() {
        let (_dir, vault, session) = scratch_vault();
        let filter = AccountSearchFilter::new().name_regex("db-[");
        let err = vault.search_accounts(&session, &filter).unwrap_err();
        assert!(matches!(err, VaultError::QueryError(_)));
    }

    #[test]
    fn test_show_link_follows_vault_policy() {
        let (_dir, vault, session) = scratch_vault();
        let mut vault = vault.with_policy(AclPolicy {
            public_links_enabled: true,
        });
        let account = vault
            .create_account(&session, NewAccount::new("team wiki"), &passphrase("pw"))
            .unwrap();

        let (_, acl) = vault.get_account(&session, account.id).unwrap();
        assert!(acl.can_show_link);
    }
}
