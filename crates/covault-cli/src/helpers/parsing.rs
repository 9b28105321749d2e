//! Parsing helpers for identifiers, datetimes, and name lookups.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use covault_core::storage::types::{Category, Client, Tag, UserGroup};

/// Parse a UUID argument, labelling the error with what it identifies.
pub fn parse_id(value: &str, what: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        anyhow::anyhow!(
            "Invalid {} ID: {} (expected a UUID like 7a2e3c0b-1234-5678-9abc-def012345678)",
            what,
            value
        )
    })
}

/// Parse a datetime string (ISO-8601 or YYYY-MM-DD).
pub fn parse_datetime(value: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let naive = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow::anyhow!("Invalid date value: {}", value))?;
        return Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
    }

    Err(anyhow::anyhow!(
        "Invalid date/time (expected ISO-8601 or YYYY-MM-DD): {}",
        value
    ))
}

/// Resolve a group name to its record.
pub fn resolve_group<'a>(groups: &'a [UserGroup], name: &str) -> anyhow::Result<&'a UserGroup> {
    groups
        .iter()
        .find(|g| g.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Group \"{}\" not found.\nHint: Run `covault group list` to see groups.",
                name
            )
        })
}

/// Resolve a category name to its record.
pub fn resolve_category<'a>(
    categories: &'a [Category],
    name: &str,
) -> anyhow::Result<&'a Category> {
    categories
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Category \"{}\" not found.\nHint: Run `covault category list` to see categories.",
                name
            )
        })
}

/// Resolve a client name to its record.
pub fn resolve_client<'a>(clients: &'a [Client], name: &str) -> anyhow::Result<&'a Client> {
    clients
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Client \"{}\" not found.\nHint: Run `covault client list` to see clients.",
                name
            )
        })
}

/// Resolve a list of tag names to their ids.
pub fn resolve_tags(tags: &[Tag], names: &[String]) -> anyhow::Result<Vec<Uuid>> {
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let tag = tags
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Tag \"{}\" not found.\nHint: Run `covault tag list` to see tags, or `covault tag add {}` to create it.",
                    name,
                    name
                )
            })?;
        ids.push(tag.id);
    }
    Ok(ids)
}
