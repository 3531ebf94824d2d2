//! Relative URLs advertised in API responses.

use url::form_urlencoded;

use crate::cursor::EntryFilter;
use crate::domain::CategoryPath;

/// `/-A/-B` for nested categories, empty for the root.
pub fn category_prefix(category: &CategoryPath) -> String {
    category
        .labels()
        .iter()
        .map(|label| format!("/-{}", urlencoding::encode(label)))
        .collect()
}

pub fn category_url(category: &CategoryPath) -> String {
    format!("{}/", category_prefix(category))
}

pub fn feeds_url(category: &CategoryPath) -> String {
    format!("{}/feeds/", category_prefix(category))
}

pub fn entries_url(category: &CategoryPath) -> String {
    format!("{}/entries/", category_prefix(category))
}

pub fn feed_url(category: &CategoryPath, feed_id: &str) -> String {
    format!("{}{}/", feeds_url(category), feed_id)
}

pub fn feed_entries_url(category: &CategoryPath, feed_id: &str) -> String {
    format!("{}entries/", feed_url(category, feed_id))
}

pub fn entry_url(category: &CategoryPath, feed_id: &str, entry_id: &str) -> String {
    format!("{}{}/", feed_entries_url(category, feed_id), entry_id)
}

pub fn entry_action_url(category: &CategoryPath, feed_id: &str, entry_id: &str, action: &str) -> String {
    format!("{}{}/", entry_url(category, feed_id, entry_id), action)
}

/// Mark-all-read URL for a listing at `base` (a feed or category entries URL).
pub fn read_all_url(base: &str, last_updated: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("last_updated", last_updated)
        .finish();
    format!("{base}read/?{query}")
}

/// Continuation URL carrying the token, the resume position and the filters
/// the current page was requested with.
pub fn next_url(base: &str, token: &str, entry_after: &str, filter: &EntryFilter) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair("url_token", token);
    query.append_pair("entry_after", entry_after);
    if let Some(read) = filter.read {
        query.append_pair("read", if read { "True" } else { "False" });
    }
    if let Some(starred) = filter.starred {
        query.append_pair("starred", if starred { "True" } else { "False" });
    }
    format!("{base}?{}", query.finish())
}

/// Outline path used as the `from` parameter of a move: `-A/feeds/<id>`.
pub fn subscription_path(category: &CategoryPath, feed_id: &str) -> String {
    if category.is_root() {
        format!("feeds/{feed_id}")
    } else {
        format!("{}/feeds/{feed_id}", category.to_id())
    }
}
