//! Account listing and search.
//!
//! The same authorization decision the per-item access check makes is
//! folded into the listing SQL here, so bulk queries can never return a
//! row the caller could not open individually.

pub mod filter;
pub mod query;

pub use filter::{AccountSearchFilter, SortKey, SortOrder, TagsOperator};
pub use query::{AccountQuery, AccountQueryBuilder, QueryParam};
