use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Raw identifier as published by the feed (Atom `id`, RSS `guid`).
    pub id: String,
    /// Content hash of `id`; this is the `entry_id` clients see.
    pub hash: String,
    pub title: String,
    pub permalink: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub read: bool,
    pub starred: bool,
}

impl Entry {
    pub fn new(id: &str, title: &str, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            hash: Self::hash_id(id),
            title: title.to_string(),
            permalink: None,
            content: None,
            summary: None,
            author: None,
            published_at: None,
            updated_at,
            read: false,
            starred: false,
        }
    }

    /// Generate the deterministic public id of an entry from its raw identifier
    pub fn hash_id(id: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(id.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The alternate link if the feed gave one, otherwise the raw identifier
    /// (which is frequently a URL itself).
    pub fn permalink_or_id(&self) -> &str {
        self.permalink.as_deref().unwrap_or(&self.id)
    }

    /// Get the best available content for display
    pub fn display_content(&self) -> Option<&str> {
        self.content.as_deref().or(self.summary.as_deref())
    }

    /// RFC 3339 in UTC with a `Z` suffix, the form used on the wire and in
    /// page boundaries.
    pub fn updated_rfc3339(&self) -> String {
        format_timestamp(&self.updated_at)
    }
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn test_hash_deterministic() {
        let id1 = Entry::hash_id("tag:example.com,2024:1");
        let id2 = Entry::hash_id("tag:example.com,2024:1");
        assert_eq!(id1, id2);
        assert_ne!(id1, Entry::hash_id("tag:example.com,2024:2"));
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let id = Entry::hash_id("entry-123");
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_new_sets_hash_and_defaults() {
        let entry = Entry::new("e1", "Title", at(1));
        assert_eq!(entry.hash, Entry::hash_id("e1"));
        assert!(!entry.read);
        assert!(!entry.starred);
    }

    #[test]
    fn test_permalink_falls_back_to_id() {
        let mut entry = Entry::new("https://example.com/1", "Title", at(1));
        assert_eq!(entry.permalink_or_id(), "https://example.com/1");
        entry.permalink = Some("https://example.com/posts/1.html".into());
        assert_eq!(entry.permalink_or_id(), "https://example.com/posts/1.html");
    }

    #[test]
    fn test_display_content_prefers_content() {
        let mut entry = Entry::new("e1", "Title", at(1));
        assert_eq!(entry.display_content(), None);
        entry.summary = Some("Short summary".into());
        assert_eq!(entry.display_content(), Some("Short summary"));
        entry.content = Some("Full content".into());
        assert_eq!(entry.display_content(), Some("Full content"));
    }

    #[test]
    fn test_timestamp_round_trip_in_utc() {
        let entry = Entry::new("e1", "Title", at(5));
        assert_eq!(entry.updated_rfc3339(), "2024-01-01T05:00:00Z");
        assert_eq!(parse_timestamp(&entry.updated_rfc3339()), Some(at(5)));
    }

    #[test]
    fn test_parse_timestamp_normalizes_offsets() {
        let parsed = parse_timestamp("2024-01-01T09:00:00+09:00").unwrap();
        assert_eq!(parsed, at(0));
        assert!(parse_timestamp("yesterday").is_none());
    }
}
