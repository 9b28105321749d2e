//! Storage trait definition.
//!
//! The `VaultStore` trait is the single persistence port for the vault.
//! Higher layers never build SQL themselves except through the account
//! query builder, whose output is executed here.

use std::path::Path;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{
    Account, AccountFile, AccountGrants, AccountHistoryEntry, Category, Client, RotationBatch,
    Tag, User, UserGroup,
};
use crate::acl::preset::DefaultPermissionPreset;
use crate::crypto::MasterKeyState;
use crate::error::Result;
use crate::search::AccountQuery;

/// Persistence interface for the vault.
///
/// All implementations must ensure:
/// - Multi-row updates (rotation, snapshot-then-write) are atomic
/// - UUIDs are used for all identifiers
/// - History rows are never updated in place
pub trait VaultStore: Send + Sync {
    /// Create a new vault database at the specified path.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::Sqlite` if the file cannot be created or the
    /// schema cannot be applied.
    fn create(path: &Path) -> Result<Self>
    where
        Self: Sized;

    /// Open an existing vault database.
    fn open(path: &Path) -> Result<Self>
    where
        Self: Sized;

    // --- Master key state ---

    /// The current master key state, if the vault has been initialised.
    fn get_master_key_state(&self) -> Result<Option<MasterKeyState>>;

    /// Persist the master key state (insert or replace the singleton).
    fn save_master_key_state(&mut self, state: &MasterKeyState) -> Result<()>;

    // --- Account operations ---

    fn insert_account(&mut self, account: &Account) -> Result<()>;

    /// Get an account by id. `Ok(None)` when it does not exist.
    fn get_account(&self, id: Uuid) -> Result<Option<Account>>;

    /// Update an account, writing its pre-mutation snapshot in the same
    /// transaction. Guarded by the last-seen edit time.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::ConstraintViolation` when the stored
    /// `date_edit` no longer matches `expected_date_edit`, meaning the row
    /// changed underneath the caller. The snapshot is rolled back with it.
    fn update_account(
        &mut self,
        account: &Account,
        expected_date_edit: DateTime<Utc>,
        snapshot: &AccountHistoryEntry,
    ) -> Result<()>;

    /// Delete an account, writing its pre-deletion snapshot in the same
    /// transaction. Grant, tag, favorite and file rows go with the
    /// account; history rows stay.
    fn delete_account(&mut self, id: Uuid, snapshot: &AccountHistoryEntry) -> Result<()>;

    /// Execute a built account query.
    fn search_accounts(&self, query: &AccountQuery) -> Result<Vec<Account>>;

    /// Every account row. Used by rotation.
    fn list_all_accounts(&self) -> Result<Vec<Account>>;

    fn bump_view_counter(&mut self, id: Uuid) -> Result<()>;

    fn bump_decrypt_counter(&mut self, id: Uuid) -> Result<()>;

    // --- Grants ---

    fn get_account_grants(&self, account_id: Uuid) -> Result<AccountGrants>;

    /// Replace the account's grant rows with the given set.
    fn set_account_grants(&mut self, account_id: Uuid, grants: &AccountGrants) -> Result<()>;

    // --- Tags and favorites ---

    fn set_account_tags(&mut self, account_id: Uuid, tag_ids: &[Uuid]) -> Result<()>;

    fn get_account_tags(&self, account_id: Uuid) -> Result<Vec<Tag>>;

    fn add_favorite(&mut self, account_id: Uuid, user_id: Uuid) -> Result<()>;

    fn remove_favorite(&mut self, account_id: Uuid, user_id: Uuid) -> Result<()>;

    // --- Files ---

    fn insert_file(&mut self, file: &AccountFile) -> Result<()>;

    fn list_files(&self, account_id: Uuid) -> Result<Vec<AccountFile>>;

    fn delete_file(&mut self, id: Uuid) -> Result<()>;

    // --- History ---

    /// Append a snapshot. History rows are immutable once written.
    fn insert_history(&mut self, entry: &AccountHistoryEntry) -> Result<()>;

    fn get_history(&self, id: Uuid) -> Result<Option<AccountHistoryEntry>>;

    /// Snapshots for one account, newest first.
    fn list_history(&self, account_id: Uuid) -> Result<Vec<AccountHistoryEntry>>;

    /// Every history row. Used by rotation.
    fn list_all_history(&self) -> Result<Vec<AccountHistoryEntry>>;

    /// Delete the given snapshots. Returns how many rows went away.
    fn delete_history_by_ids(&mut self, ids: &[Uuid]) -> Result<usize>;

    /// Delete every snapshot belonging to an account.
    fn delete_history_for_account(&mut self, account_id: Uuid) -> Result<usize>;

    // --- Users and groups ---

    fn insert_user(&mut self, user: &User) -> Result<()>;

    fn get_user(&self, id: Uuid) -> Result<Option<User>>;

    fn get_user_by_login(&self, login: &str) -> Result<Option<User>>;

    fn update_user(&mut self, user: &User) -> Result<()>;

    fn list_users(&self) -> Result<Vec<User>>;

    fn insert_group(&mut self, group: &UserGroup) -> Result<()>;

    fn get_group(&self, id: Uuid) -> Result<Option<UserGroup>>;

    fn list_groups(&self) -> Result<Vec<UserGroup>>;

    // --- Categories, clients, tags ---

    fn insert_category(&mut self, category: &Category) -> Result<()>;

    fn list_categories(&self) -> Result<Vec<Category>>;

    fn insert_client(&mut self, client: &Client) -> Result<()>;

    fn list_clients(&self) -> Result<Vec<Client>>;

    fn insert_tag(&mut self, tag: &Tag) -> Result<()>;

    fn list_tags(&self) -> Result<Vec<Tag>>;

    // --- Permission presets ---

    fn insert_preset(&mut self, preset: &DefaultPermissionPreset) -> Result<()>;

    fn list_presets(&self) -> Result<Vec<DefaultPermissionPreset>>;

    fn delete_preset(&mut self, id: Uuid) -> Result<()>;

    // --- Rotation ---

    /// Apply a master passphrase rotation in one transaction.
    ///
    /// Each re-wrapped row is guarded by the pre-rotation fingerprint
    /// (`WHERE id = ? AND key_hash = ?`); a row that changed underneath
    /// the rotation aborts the whole batch.
    ///
    /// # Errors
    ///
    /// Returns `VaultError::ConstraintViolation` if any guarded update
    /// misses; nothing is committed in that case.
    fn apply_rotation(&mut self, batch: &RotationBatch) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // The trait contract itself; implementations are tested in their own
    // modules.

    #[test]
    fn test_trait_definition_compiles() {
        fn _accepts_store<T: VaultStore>(_store: T) {}
    }
}
