//! Account query assembly.
//!
//! [`AccountQueryBuilder`] turns a caller identity plus an
//! [`AccountSearchFilter`] into one SELECT over the account relation:
//! condition strings joined with AND, values bound positionally. The
//! authorization scope is part of the query itself, so a bulk listing
//! makes the same decision as the per-item access check.
//!
//! Parameters are an owned [`QueryParam`] enum rather than boxed `ToSql`
//! trait objects so tests can assert on exactly what gets bound.

use chrono::{DateTime, Utc};
use rusqlite::types::ToSqlOutput;
use rusqlite::ToSql;
use uuid::Uuid;

use crate::acl::preset::{DefaultPermissionPreset, PermissionBundle, PresetTarget};
use crate::acl::CallerContext;

use super::filter::{AccountSearchFilter, SortKey, SortOrder, TagsOperator};

/// Account columns selected by every account query, in `Account` field
/// order. Row mapping relies on this order.
pub(crate) const ACCOUNT_COLUMNS: &str = "a.id, a.name, a.login, a.url, a.notes, \
     a.category_id, a.client_id, a.user_id, a.user_group_id, a.user_edit_id, \
     a.key, a.pass, a.key_hash, a.is_private, a.is_private_group, \
     a.other_user_group_edit, a.other_user_edit, a.pass_date, a.pass_date_change, \
     a.parent_id, a.count_view, a.count_decrypt, a.date_add, a.date_edit";

/// An owned SQL parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Text(String),
    Integer(i64),
}

impl ToSql for QueryParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            QueryParam::Text(value) => value.to_sql(),
            QueryParam::Integer(value) => value.to_sql(),
        }
    }
}

impl From<Uuid> for QueryParam {
    fn from(id: Uuid) -> Self {
        QueryParam::Text(id.to_string())
    }
}

impl From<DateTime<Utc>> for QueryParam {
    fn from(ts: DateTime<Utc>) -> Self {
        QueryParam::Text(ts.to_rfc3339())
    }
}

impl From<&str> for QueryParam {
    fn from(value: &str) -> Self {
        QueryParam::Text(value.to_string())
    }
}

impl From<i64> for QueryParam {
    fn from(value: i64) -> Self {
        QueryParam::Integer(value)
    }
}

/// A ready-to-execute account query.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountQuery {
    pub sql: String,
    pub params: Vec<QueryParam>,
}

/// Builds account listing queries.
#[derive(Debug, Clone)]
pub struct AccountQueryBuilder {
    conditions: Vec<String>,
    params: Vec<QueryParam>,
    caller_id: Uuid,
    sort_key: Option<SortKey>,
    sort_order: SortOrder,
    prefer_most_viewed: bool,
    limit: Option<usize>,
    offset: Option<usize>,
}

impl AccountQueryBuilder {
    /// Start a query scoped to what the caller may see.
    ///
    /// Application admins get the unscoped relation. Accounts admins skip
    /// the ownership/grant scope but keep the private clause. Everyone
    /// else gets ownership, explicit grants and the preset fallback, plus
    /// the private clause. A profile without account viewing gets an
    /// empty listing outright; the per-item evaluation answers false on
    /// every row for such a caller, admins included.
    pub fn for_caller(caller: &CallerContext, presets: &[DefaultPermissionPreset]) -> Self {
        let mut builder = Self {
            conditions: Vec::new(),
            params: Vec::new(),
            caller_id: caller.user_id,
            sort_key: None,
            sort_order: SortOrder::Asc,
            prefer_most_viewed: false,
            limit: None,
            offset: None,
        };

        if !caller.profile.acc_view {
            builder.conditions.push("1 = 0".to_string());
            return builder;
        }

        if !caller.is_admin_app {
            if !caller.is_admin_acc {
                builder.push_user_scope(caller, presets);
            }
            builder.push_private_clause(caller);
        }

        builder
    }

    fn push_user_scope(&mut self, caller: &CallerContext, presets: &[DefaultPermissionPreset]) {
        let mut arms = vec![
            "a.user_id = ?".to_string(),
            "a.user_group_id = ?".to_string(),
            "EXISTS (SELECT 1 FROM account_users au \
             WHERE au.account_id = a.id AND au.user_id = ?)"
                .to_string(),
            "EXISTS (SELECT 1 FROM account_user_groups ag \
             WHERE ag.account_id = a.id AND ag.user_group_id = ?)"
                .to_string(),
        ];
        self.params.push(caller.user_id.into());
        self.params.push(caller.user_group_id.into());
        self.params.push(caller.user_id.into());
        self.params.push(caller.user_group_id.into());

        self.push_preset_arms(caller, presets, &mut arms);

        self.conditions.push(format!("({})", arms.join(" OR ")));
    }

    /// One scope arm per preset whose bundle names the caller, mirroring
    /// the fallback selection in [`crate::acl::preset::merge_grants`]:
    /// with no explicit grant rows the best-placed matching preset
    /// applies; with explicit rows only the best-placed fixed one does.
    fn push_preset_arms(
        &mut self,
        caller: &CallerContext,
        presets: &[DefaultPermissionPreset],
        arms: &mut Vec<String>,
    ) {
        const NO_EXPLICIT: &str = "NOT EXISTS (SELECT 1 FROM account_users xu \
             WHERE xu.account_id = a.id) \
             AND NOT EXISTS (SELECT 1 FROM account_user_groups xg \
             WHERE xg.account_id = a.id)";

        for (index, preset) in presets.iter().enumerate() {
            if !bundle_names_caller(&preset.bundle, caller) {
                continue;
            }

            let mut arm = format!("({} AND {}", NO_EXPLICIT, self.preset_match(&preset.target));
            for other in beaten_by(presets, index, false) {
                let clause = self.preset_match(&other.target);
                arm.push_str(&format!(" AND NOT ({})", clause));
            }
            arm.push(')');
            arms.push(arm);

            if preset.fixed {
                let mut arm = format!(
                    "(NOT ({}) AND {}",
                    NO_EXPLICIT,
                    self.preset_match(&preset.target)
                );
                for other in beaten_by(presets, index, true) {
                    let clause = self.preset_match(&other.target);
                    arm.push_str(&format!(" AND NOT ({})", clause));
                }
                arm.push(')');
                arms.push(arm);
            }
        }
    }

    /// Condition matching a preset's target against the account's owner
    /// context; binds the target id.
    fn preset_match(&mut self, target: &PresetTarget) -> &'static str {
        match target {
            PresetTarget::User(id) => {
                self.params.push((*id).into());
                "a.user_id = ?"
            }
            PresetTarget::Group(id) => {
                self.params.push((*id).into());
                "a.user_group_id = ?"
            }
            PresetTarget::Profile(id) => {
                self.params.push((*id).into());
                "EXISTS (SELECT 1 FROM users ou \
                 WHERE ou.id = a.user_id AND ou.profile_id = ?)"
            }
        }
    }

    fn push_private_clause(&mut self, caller: &CallerContext) {
        self.conditions.push(
            "((a.is_private = 0 AND a.is_private_group = 0) \
             OR (a.is_private = 1 AND a.user_id = ?) \
             OR (a.is_private_group = 1 AND a.user_group_id = ?))"
                .to_string(),
        );
        self.params.push(caller.user_id.into());
        self.params.push(caller.user_group_id.into());
    }

    /// Add the descriptive filters on top of the authorization scope.
    pub fn with_filter(mut self, filter: &AccountSearchFilter) -> Self {
        if let Some(ref text) = filter.text {
            let needle = like_pattern(text);
            self.conditions.push(
                "(LOWER(a.name) LIKE ? OR LOWER(a.login) LIKE ? \
                 OR LOWER(a.url) LIKE ? OR LOWER(a.notes) LIKE ?)"
                    .to_string(),
            );
            for _ in 0..4 {
                self.params.push(QueryParam::Text(needle.clone()));
            }
        }

        if let Some(category_id) = filter.category_id {
            self.conditions.push("a.category_id = ?".to_string());
            self.params.push(category_id.into());
        }

        if let Some(client_id) = filter.client_id {
            self.conditions.push("a.client_id = ?".to_string());
            self.params.push(client_id.into());
        }

        if !filter.tag_ids.is_empty() {
            self.push_tag_conditions(&filter.tag_ids, filter.tags_operator);
        }

        if filter.favorites_only {
            self.conditions.push(
                "EXISTS (SELECT 1 FROM account_favorites fav \
                 WHERE fav.account_id = a.id AND fav.user_id = ?)"
                    .to_string(),
            );
            self.params.push(self.caller_id.into());
        }

        if let Some(due) = filter.expired_as_of {
            self.conditions
                .push("(a.pass_date_change IS NOT NULL AND a.pass_date_change <= ?)".to_string());
            self.params.push(due.into());
        }

        if let Some(now) = filter.not_expired_as_of {
            self.conditions
                .push("(a.pass_date_change IS NULL OR a.pass_date_change > ?)".to_string());
            self.params.push(now.into());
        }

        if let Some(ref owner) = filter.owner {
            let needle = like_pattern(owner);
            self.conditions.push(
                "EXISTS (SELECT 1 FROM users u WHERE u.id = a.user_id \
                 AND (LOWER(u.login) LIKE ? OR LOWER(u.name) LIKE ?))"
                    .to_string(),
            );
            self.params.push(QueryParam::Text(needle.clone()));
            self.params.push(QueryParam::Text(needle));
        }

        if let Some(ref name) = filter.group_name {
            self.conditions.push(
                "EXISTS (SELECT 1 FROM user_groups g \
                 WHERE g.id = a.user_group_id AND LOWER(g.name) LIKE ?)"
                    .to_string(),
            );
            self.params.push(QueryParam::Text(like_pattern(name)));
        }

        if let Some(ref name) = filter.category_name {
            self.conditions.push("LOWER(c.name) LIKE ?".to_string());
            self.params.push(QueryParam::Text(like_pattern(name)));
        }

        if let Some(ref name) = filter.client_name {
            self.conditions.push("LOWER(cl.name) LIKE ?".to_string());
            self.params.push(QueryParam::Text(like_pattern(name)));
        }

        if let Some(ref name) = filter.file_name {
            self.conditions.push(
                "EXISTS (SELECT 1 FROM account_files f \
                 WHERE f.account_id = a.id AND LOWER(f.name) LIKE ?)"
                    .to_string(),
            );
            self.params.push(QueryParam::Text(like_pattern(name)));
        }

        if let Some(ref pattern) = filter.name_regex {
            self.conditions.push("a.name REGEXP ?".to_string());
            self.params.push(QueryParam::Text(pattern.clone()));
        }

        self.sort_key = filter.sort_key;
        self.sort_order = filter.sort_order;
        self.prefer_most_viewed = filter.prefer_most_viewed;
        self.limit = filter.limit;
        self.offset = filter.offset;
        self
    }

    fn push_tag_conditions(&mut self, tag_ids: &[Uuid], operator: TagsOperator) {
        let placeholders = vec!["?"; tag_ids.len()].join(", ");
        match operator {
            TagsOperator::Or => {
                self.conditions.push(format!(
                    "a.id IN (SELECT account_id FROM account_tags WHERE tag_id IN ({}))",
                    placeholders
                ));
                self.params.extend(tag_ids.iter().copied().map(QueryParam::from));
            }
            TagsOperator::And => {
                self.conditions.push(format!(
                    "a.id IN (SELECT account_id FROM account_tags WHERE tag_id IN ({}) \
                     GROUP BY account_id HAVING COUNT(DISTINCT tag_id) = ?)",
                    placeholders
                ));
                self.params.extend(tag_ids.iter().copied().map(QueryParam::from));
                self.params.push(QueryParam::Integer(tag_ids.len() as i64));
            }
        }
    }

    fn order_clause(&self) -> String {
        let direction = match self.sort_order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        match self.sort_key {
            Some(SortKey::Name) => format!("a.name COLLATE NOCASE {}", direction),
            Some(SortKey::Category) => format!("c.name COLLATE NOCASE {}", direction),
            Some(SortKey::Login) => format!("a.login COLLATE NOCASE {}", direction),
            Some(SortKey::Url) => format!("a.url COLLATE NOCASE {}", direction),
            Some(SortKey::Client) => format!("cl.name COLLATE NOCASE {}", direction),
            None if self.prefer_most_viewed => "a.count_view DESC".to_string(),
            None => "cl.name COLLATE NOCASE ASC, a.name COLLATE NOCASE ASC".to_string(),
        }
    }

    /// Assemble the final SELECT.
    pub fn build(self) -> AccountQuery {
        let mut sql = format!(
            "SELECT {} FROM accounts a \
             LEFT JOIN categories c ON c.id = a.category_id \
             LEFT JOIN clients cl ON cl.id = a.client_id",
            ACCOUNT_COLUMNS
        );

        let order = self.order_clause();
        let mut params = self.params;

        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }

        sql.push_str(" ORDER BY ");
        sql.push_str(&order);

        match (self.limit, self.offset) {
            (Some(limit), Some(offset)) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                params.push(QueryParam::Integer(limit as i64));
                params.push(QueryParam::Integer(offset as i64));
            }
            (Some(limit), None) => {
                sql.push_str(" LIMIT ?");
                params.push(QueryParam::Integer(limit as i64));
            }
            // SQLite needs a LIMIT for OFFSET; -1 means unbounded.
            (None, Some(offset)) => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                params.push(QueryParam::Integer(offset as i64));
            }
            (None, None) => {}
        }

        AccountQuery { sql, params }
    }
}

fn like_pattern(needle: &str) -> String {
    format!("%{}%", needle.to_lowercase())
}

/// Whether a preset's bundle grants the caller anything at all. Edit
/// membership implies view, so every list counts.
fn bundle_names_caller(bundle: &PermissionBundle, caller: &CallerContext) -> bool {
    bundle.view_users.contains(&caller.user_id)
        || bundle.edit_users.contains(&caller.user_id)
        || bundle.view_groups.contains(&caller.user_group_id)
        || bundle.edit_groups.contains(&caller.user_group_id)
}

/// Presets selected ahead of `presets[index]` by the fallback ordering:
/// lower priority first, list position breaking ties.
fn beaten_by(
    presets: &[DefaultPermissionPreset],
    index: usize,
    fixed_only: bool,
) -> impl Iterator<Item = &DefaultPermissionPreset> {
    let own = presets[index].priority;
    presets
        .iter()
        .enumerate()
        .filter(move |(i, p)| {
            (!fixed_only || p.fixed) && (p.priority < own || (p.priority == own && *i < index))
        })
        .map(|(_, p)| p)
}
