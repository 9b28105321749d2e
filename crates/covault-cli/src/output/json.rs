//! JSON output formatting for vault records.
//!
//! Encrypted fields (`key`, `pass`) are never serialized here; secrets only
//! reach stdout through the explicit `pass` commands.

use covault_core::acl::AccountAcl;
use covault_core::storage::types::{
    Account, AccountFile, AccountGrants, AccountHistoryEntry, User,
};
use covault_core::RotationReport;

/// Convert an account to JSON for output.
pub fn account_json(account: &Account) -> serde_json::Value {
    serde_json::json!({
        "id": account.id,
        "name": account.name,
        "login": account.login,
        "url": account.url,
        "notes": account.notes,
        "category_id": account.category_id,
        "client_id": account.client_id,
        "owner_id": account.user_id,
        "owner_group_id": account.user_group_id,
        "last_editor_id": account.user_edit_id,
        "is_private": account.is_private,
        "is_private_group": account.is_private_group,
        "other_user_edit": account.other_user_edit,
        "other_user_group_edit": account.other_user_group_edit,
        "pass_date": account.pass_date,
        "pass_date_change": account.pass_date_change,
        "parent_id": account.parent_id,
        "count_view": account.count_view,
        "count_decrypt": account.count_decrypt,
        "date_add": account.date_add,
        "date_edit": account.date_edit,
    })
}

/// Convert multiple accounts to JSON array for output.
pub fn accounts_json(accounts: &[Account]) -> Vec<serde_json::Value> {
    accounts.iter().map(account_json).collect()
}

/// Convert a capability record to JSON for output.
pub fn acl_json(acl: &AccountAcl) -> serde_json::Value {
    serde_json::json!({
        "can_view": acl.can_view,
        "can_view_pass": acl.can_view_pass,
        "can_edit": acl.can_edit,
        "can_edit_pass": acl.can_edit_pass,
        "can_delete": acl.can_delete,
        "can_restore": acl.can_restore,
        "can_copy": acl.can_copy,
        "can_show_link": acl.can_show_link,
        "can_request_change": acl.can_request_change,
    })
}

/// Convert a history snapshot to JSON for output.
pub fn history_json(entry: &AccountHistoryEntry) -> serde_json::Value {
    serde_json::json!({
        "id": entry.id,
        "account_id": entry.account_id,
        "name": entry.name,
        "login": entry.login,
        "url": entry.url,
        "reason": snapshot_reason(entry),
        "date": entry.date,
        "date_edit": entry.date_edit,
        "pass_date": entry.pass_date,
    })
}

/// Convert multiple history snapshots to JSON array for output.
pub fn history_entries_json(entries: &[AccountHistoryEntry]) -> Vec<serde_json::Value> {
    entries.iter().map(history_json).collect()
}

/// Human label for why a snapshot was taken.
pub fn snapshot_reason(entry: &AccountHistoryEntry) -> &'static str {
    if entry.is_deleted {
        "delete"
    } else {
        "modify"
    }
}

/// Convert a user to JSON for output.
pub fn user_json(user: &User) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "login": user.login,
        "name": user.name,
        "user_group_id": user.user_group_id,
        "profile_id": user.profile_id,
        "is_admin_app": user.is_admin_app,
        "is_admin_acc": user.is_admin_acc,
        "is_disabled": user.is_disabled,
        "last_key_update": user.last_key_update,
    })
}

/// Convert per-account grants to JSON for output.
pub fn grants_json(grants: &AccountGrants) -> serde_json::Value {
    serde_json::json!({
        "users": grants
            .users
            .iter()
            .map(|g| serde_json::json!({ "user_id": g.user_id, "edit": g.is_edit }))
            .collect::<Vec<_>>(),
        "groups": grants
            .groups
            .iter()
            .map(|g| serde_json::json!({ "group_id": g.user_group_id, "edit": g.is_edit }))
            .collect::<Vec<_>>(),
    })
}

/// Convert an attached file's metadata to JSON (content stays out).
pub fn file_json(file: &AccountFile) -> serde_json::Value {
    serde_json::json!({
        "id": file.id,
        "account_id": file.account_id,
        "name": file.name,
        "size": file.size,
    })
}

/// Convert a rotation report to JSON for output.
pub fn rotation_json(report: &RotationReport) -> serde_json::Value {
    serde_json::json!({
        "new_version": report.new_version,
        "accounts_rewrapped": report.accounts_rewrapped,
        "history_rewrapped": report.history_rewrapped,
        "skipped_accounts": report.skipped_accounts,
        "skipped_history": report.skipped_history,
    })
}
