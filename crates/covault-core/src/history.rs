//! Account history snapshots and restore.
//!
//! Every mutation of an account is preceded by a verbatim snapshot of the
//! row, so any previous state can be inspected or restored. Snapshots are
//! immutable once written; the only lifecycle operations are batch
//! deletion and restore onto the live row.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{Result, VaultError};
use crate::storage::types::{Account, AccountHistoryEntry};

/// Why a snapshot is being taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotReason {
    /// The account is about to be edited or restored.
    Modify,
    /// The account is about to be deleted.
    Delete,
}

/// Capture `account` exactly as it stands.
///
/// The snapshot carries the account's own key fingerprint: it describes
/// the `key`/`pass` bytes being copied, which is what the stale-key check
/// compares against later.
pub fn snapshot(account: &Account, reason: SnapshotReason) -> AccountHistoryEntry {
    AccountHistoryEntry {
        id: Uuid::new_v4(),
        account_id: account.id,
        name: account.name.clone(),
        login: account.login.clone(),
        url: account.url.clone(),
        notes: account.notes.clone(),
        category_id: account.category_id,
        client_id: account.client_id,
        user_id: account.user_id,
        user_group_id: account.user_group_id,
        user_edit_id: account.user_edit_id,
        key: account.key.clone(),
        pass: account.pass.clone(),
        key_hash: account.key_hash.clone(),
        is_private: account.is_private,
        is_private_group: account.is_private_group,
        other_user_edit: account.other_user_edit,
        other_user_group_edit: account.other_user_group_edit,
        pass_date: account.pass_date,
        pass_date_change: account.pass_date_change,
        parent_id: account.parent_id,
        count_view: account.count_view,
        count_decrypt: account.count_decrypt,
        date_add: account.date_add,
        date_edit: account.date_edit,
        is_modify: matches!(reason, SnapshotReason::Modify),
        is_deleted: matches!(reason, SnapshotReason::Delete),
        date: Utc::now(),
    }
}

/// Copy a snapshot's restorable fields onto the live row.
///
/// Identity, counters and `date_add` stay as they are; the restoring
/// actor and the edit time are stamped fresh so the restore itself reads
/// as an edit.
pub fn apply_restore(live: &mut Account, entry: &AccountHistoryEntry, actor: Uuid) {
    live.name = entry.name.clone();
    live.login = entry.login.clone();
    live.url = entry.url.clone();
    live.notes = entry.notes.clone();
    live.category_id = entry.category_id;
    live.client_id = entry.client_id;
    live.user_id = entry.user_id;
    live.user_group_id = entry.user_group_id;
    live.key = entry.key.clone();
    live.pass = entry.pass.clone();
    live.key_hash = entry.key_hash.clone();
    live.is_private = entry.is_private;
    live.is_private_group = entry.is_private_group;
    live.other_user_edit = entry.other_user_edit;
    live.other_user_group_edit = entry.other_user_group_edit;
    live.pass_date = entry.pass_date;
    live.pass_date_change = entry.pass_date_change;
    live.parent_id = entry.parent_id;

    live.user_edit_id = Some(actor);
    live.date_edit = Utc::now();
}

/// Refuse to decrypt a snapshot wrapped under a superseded master key.
pub fn check_key_current(entry: &AccountHistoryEntry, active_key_hash: &str) -> Result<()> {
    if entry.key_hash != active_key_hash {
        return Err(VaultError::NeedsKeyMigration);
    }
    Ok(())
}
