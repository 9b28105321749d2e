//! Account search filters.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// How multiple tag ids combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagsOperator {
    /// Match accounts carrying any of the tags.
    #[default]
    Or,
    /// Match accounts carrying every tag.
    And,
}

/// Explicit sort column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Category,
    Login,
    Url,
    Client,
}

/// Sort direction for an explicit sort key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Filter for listing and searching accounts.
///
/// Purely descriptive; authorization is added by the query builder from
/// the caller's identity, never from this struct.
#[derive(Debug, Clone, Default)]
pub struct AccountSearchFilter {
    /// Free-text needle matched against name, login, url and notes
    pub text: Option<String>,

    /// Restrict to one category
    pub category_id: Option<Uuid>,

    /// Restrict to one client
    pub client_id: Option<Uuid>,

    /// Tag ids, combined per `tags_operator`
    pub tag_ids: Vec<Uuid>,

    /// How `tag_ids` combine
    pub tags_operator: TagsOperator,

    /// Only the caller's favorites
    pub favorites_only: bool,

    /// Only accounts whose scheduled secret change is due by this instant
    pub expired_as_of: Option<DateTime<Utc>>,

    /// Only accounts with no secret change due by this instant
    pub not_expired_as_of: Option<DateTime<Utc>>,

    /// Owner login or display name, substring (admin filter)
    pub owner: Option<String>,

    /// Owning group name, substring (admin filter)
    pub group_name: Option<String>,

    /// Category name, substring (admin filter)
    pub category_name: Option<String>,

    /// Client name, substring (admin filter)
    pub client_name: Option<String>,

    /// Attached file name, substring (admin filter)
    pub file_name: Option<String>,

    /// Regular expression over the account name (admin filter)
    pub name_regex: Option<String>,

    /// With no explicit sort key, order by view count descending
    pub prefer_most_viewed: bool,

    /// Explicit sort column
    pub sort_key: Option<SortKey>,

    /// Direction for the explicit sort column
    pub sort_order: SortOrder,

    /// Maximum number of rows
    pub limit: Option<usize>,

    /// Rows to skip
    pub offset: Option<usize>,
}

impl AccountSearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, needle: impl Into<String>) -> Self {
        self.text = Some(needle.into());
        self
    }

    pub fn category(mut self, id: Uuid) -> Self {
        self.category_id = Some(id);
        self
    }

    pub fn client(mut self, id: Uuid) -> Self {
        self.client_id = Some(id);
        self
    }

    pub fn tags(mut self, ids: Vec<Uuid>) -> Self {
        self.tag_ids = ids;
        self
    }

    pub fn tags_all(mut self) -> Self {
        self.tags_operator = TagsOperator::And;
        self
    }

    pub fn favorites(mut self) -> Self {
        self.favorites_only = true;
        self
    }

    pub fn expired_as_of(mut self, now: DateTime<Utc>) -> Self {
        self.expired_as_of = Some(now);
        self
    }

    pub fn not_expired_as_of(mut self, now: DateTime<Utc>) -> Self {
        self.not_expired_as_of = Some(now);
        self
    }

    pub fn owner(mut self, needle: impl Into<String>) -> Self {
        self.owner = Some(needle.into());
        self
    }

    pub fn group_name(mut self, needle: impl Into<String>) -> Self {
        self.group_name = Some(needle.into());
        self
    }

    pub fn category_name(mut self, needle: impl Into<String>) -> Self {
        self.category_name = Some(needle.into());
        self
    }

    pub fn client_name(mut self, needle: impl Into<String>) -> Self {
        self.client_name = Some(needle.into());
        self
    }

    pub fn file_name(mut self, needle: impl Into<String>) -> Self {
        self.file_name = Some(needle.into());
        self
    }

    pub fn name_regex(mut self, pattern: impl Into<String>) -> Self {
        self.name_regex = Some(pattern.into());
        self
    }

    pub fn most_viewed_first(mut self) -> Self {
        self.prefer_most_viewed = true;
        self
    }

    pub fn sort(mut self, key: SortKey, order: SortOrder) -> Self {
        self.sort_key = Some(key);
        self.sort_order = order;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_builder() {
        let category = Uuid::new_v4();
        let tag = Uuid::new_v4();

        let filter = AccountSearchFilter::new()
            .text("mail")
            .category(category)
            .tags(vec![tag])
            .tags_all()
            .favorites()
            .sort(SortKey::Name, SortOrder::Desc)
            .limit(25)
            .offset(50);

        assert_eq!(filter.text.as_deref(), Some("mail"));
        assert_eq!(filter.category_id, Some(category));
        assert_eq!(filter.tag_ids, vec![tag]);
        assert_eq!(filter.tags_operator, TagsOperator::And);
        assert!(filter.favorites_only);
        assert_eq!(filter.sort_key, Some(SortKey::Name));
        assert_eq!(filter.sort_order, SortOrder::Desc);
        assert_eq!(filter.limit, Some(25));
        assert_eq!(filter.offset, Some(50));
    }

    #[test]
    fn test_defaults() {
        let filter = AccountSearchFilter::new();
        assert_eq!(filter.tags_operator, TagsOperator::Or);
        assert_eq!(filter.sort_order, SortOrder::Asc);
        assert!(!filter.favorites_only);
        assert!(!filter.prefer_most_viewed);
    }
}
