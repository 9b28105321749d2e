//! Output formatting for commands: JSON payloads and table row builders.

mod json;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use covault_core::storage::types::Account;

pub use json::{
    account_json, accounts_json, acl_json, file_json, grants_json, history_entries_json,
    history_json, rotation_json, snapshot_reason, user_json,
};

/// Print a JSON value to stdout, pretty-printed.
pub fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| anyhow::anyhow!("Failed to serialize output: {}", e))?;
    println!("{}", rendered);
    Ok(())
}

/// First 8 hex characters of a UUID, enough to paste back into `show`.
pub fn short_id(id: Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

/// Render a timestamp for table cells.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Build the standard listing row for an account.
pub fn account_row(account: &Account) -> Vec<String> {
    vec![
        short_id(account.id),
        account.name.clone(),
        account.login.clone(),
        account.url.clone(),
        format_ts(account.date_edit),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_is_prefix() {
        let id = Uuid::new_v4();
        let short = short_id(id);
        assert_eq!(short.len(), 8);
        assert!(id.to_string().starts_with(&short));
    }

    #[test]
    fn test_format_ts_is_minute_precision() {
        let ts = DateTime::parse_from_rfc3339("2026-02-03T04:05:06Z")
            .expect("parse")
            .with_timezone(&Utc);
        assert_eq!(format_ts(ts), "2026-02-03 04:05");
    }
}
