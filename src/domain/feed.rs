use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::Entry;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub url: String,
    pub title: String,
    pub permalink: Option<String>,
    pub entries: Vec<Entry>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Time of the last write to this feed, including read/starred toggles.
    pub revised_at: Option<DateTime<Utc>>,
}

impl Feed {
    pub fn new(url: &str, title: &str) -> Self {
        Self {
            id: Self::id_for_url(url),
            url: url.to_string(),
            title: title.to_string(),
            permalink: None,
            entries: Vec::new(),
            etag: None,
            last_modified: None,
            revised_at: None,
        }
    }

    /// Feed ids are derived from the feed URL so that re-subscribing the same
    /// URL lands on the same stored document.
    pub fn id_for_url(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }

    pub fn entry(&self, hash: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.hash == hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_id_for_url_deterministic() {
        let a = Feed::new("https://example.com/feed.xml", "A");
        let b = Feed::new("https://example.com/feed.xml", "B");
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, Feed::id_for_url("https://other.com/feed.xml"));
    }

    #[test]
    fn test_display_title_falls_back_to_url() {
        let feed = Feed::new("https://example.com/feed.xml", "");
        assert_eq!(feed.display_title(), "https://example.com/feed.xml");
    }

    #[test]
    fn test_entry_lookup_by_hash() {
        let mut feed = Feed::new("https://example.com/feed.xml", "Example");
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        feed.entries.push(Entry::new("e1", "One", at));
        let hash = Entry::hash_id("e1");
        assert_eq!(feed.entry(&hash).map(|e| e.title.as_str()), Some("One"));
        assert!(feed.entry("missing").is_none());
    }
}
