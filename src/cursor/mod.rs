//! Resumable, filterable iteration over feed entries.
//!
//! A [`FeedCursor`] walks one feed's entries newest first. A [`MergeCursor`]
//! k-way merges many feed cursors into one recency-ordered stream. Both are
//! suspended between HTTP requests in the [`CursorRegistry`] under an opaque
//! token, and can always be rebuilt from the `entry_after` position carried
//! in the page URL when the registry has dropped them.

pub mod feed_cursor;
pub mod merge_cursor;
pub mod pager;
pub mod position;
pub mod registry;

use chrono::{DateTime, Utc};

use crate::domain::{CategoryPath, Entry, Feed};

pub use feed_cursor::FeedCursor;
pub use merge_cursor::MergeCursor;
pub use pager::{next_page, NextPage, Page, PageRequest};
pub use position::PageBoundary;
pub use registry::{CursorKind, CursorRegistry, SharedCursor, SuspendedCursor};

/// Optional read/starred constraints from the query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryFilter {
    pub read: Option<bool>,
    pub starred: Option<bool>,
}

impl EntryFilter {
    /// A present parameter sets the filter; only `true` (any case, surrounding
    /// whitespace ignored) means true, every other value means false.
    pub fn from_params(read: Option<&str>, starred: Option<&str>) -> Self {
        Self {
            read: read.map(parse_flag),
            starred: starred.map(parse_flag),
        }
    }

    pub fn matches(&self, entry: &Entry) -> bool {
        self.read.is_none_or(|read| entry.read == read)
            && self.starred.is_none_or(|starred| entry.starred == starred)
    }
}

fn parse_flag(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Feed-level context attached to every entry a cursor emits.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedContext {
    pub feed_id: String,
    pub category: CategoryPath,
    pub title: String,
    pub permalink: Option<String>,
}

impl FeedContext {
    pub fn new(feed: &Feed, category: &CategoryPath) -> Self {
        Self {
            feed_id: feed.id.clone(),
            category: category.clone(),
            title: feed.display_title().to_string(),
            permalink: feed.permalink.clone(),
        }
    }
}

/// Projection of one entry as delivered in a page.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryView {
    pub title: String,
    pub entry_id: String,
    pub permalink: String,
    pub updated: String,
    pub updated_at: DateTime<Utc>,
    pub read: bool,
    pub starred: bool,
    pub feed: FeedContext,
}

impl EntryView {
    pub fn new(entry: &Entry, feed: &FeedContext) -> Self {
        Self {
            title: entry.title.clone(),
            entry_id: entry.hash.clone(),
            permalink: entry.permalink_or_id().to_string(),
            updated: entry.updated_rfc3339(),
            updated_at: entry.updated_at,
            read: entry.read,
            starred: entry.starred,
            feed: feed.clone(),
        }
    }
}
