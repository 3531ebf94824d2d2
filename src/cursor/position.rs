use chrono::{DateTime, Utc};

use crate::cursor::EntryView;
use crate::domain::{format_timestamp, parse_timestamp, Entry};

/// Last entry delivered on a merged page, encoded as `<hash>@<RFC 3339>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBoundary {
    pub entry_id: String,
    pub updated_at: DateTime<Utc>,
}

impl PageBoundary {
    pub fn new(entry_id: &str, updated_at: DateTime<Utc>) -> Self {
        Self {
            entry_id: entry_id.to_string(),
            updated_at,
        }
    }

    pub fn from_view(view: &EntryView) -> Self {
        Self::new(&view.entry_id, view.updated_at)
    }

    pub fn encode(&self) -> String {
        format!("{}@{}", self.entry_id, format_timestamp(&self.updated_at))
    }

    /// `None` for anything malformed; callers then start from the newest entry.
    pub fn decode(value: &str) -> Option<Self> {
        let (entry_id, timestamp) = value.split_once('@')?;
        if entry_id.is_empty() {
            return None;
        }
        let updated_at = parse_timestamp(timestamp)?;
        Some(Self::new(entry_id, updated_at))
    }

    /// Newer than the boundary, or the boundary entry itself. Entries sharing
    /// the boundary time count only when `ties_delivered` is set.
    pub fn already_delivered(&self, entry: &Entry, ties_delivered: bool) -> bool {
        entry.updated_at > self.updated_at
            || (ties_delivered && entry.updated_at == self.updated_at)
            || entry.hash == self.entry_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::test_support::at;
    use chrono::Duration;

    #[test]
    fn test_encode_format() {
        let boundary = PageBoundary::new("abc123", at(61));
        assert_eq!(boundary.encode(), "abc123@2024-01-01T01:01:00Z");
    }

    #[test]
    fn test_decode_keeps_subsecond_precision() {
        let precise = at(0) + Duration::microseconds(1_500);
        let boundary = PageBoundary::new("abc", precise);
        assert_eq!(PageBoundary::decode(&boundary.encode()), Some(boundary));
    }

    #[test]
    fn test_decode_accepts_offsets() {
        let boundary = PageBoundary::decode("abc@2024-01-01T09:00:00+09:00").unwrap();
        assert_eq!(boundary.updated_at, at(0));
    }

    #[test]
    fn test_decode_malformed() {
        for value in ["", "abc", "@2024-01-01T00:00:00Z", "abc@yesterday", "abc@"] {
            assert_eq!(PageBoundary::decode(value), None, "{value:?}");
        }
    }

    #[test]
    fn test_already_delivered() {
        let boundary = PageBoundary::new(&Entry::hash_id("b"), at(10));
        assert!(boundary.already_delivered(&Entry::new("a", "newer", at(11)), false));
        assert!(boundary.already_delivered(&Entry::new("b", "itself", at(10)), false));
        assert!(!boundary.already_delivered(&Entry::new("c", "same time", at(10)), false));
        assert!(!boundary.already_delivered(&Entry::new("d", "older", at(9)), false));
    }

    #[test]
    fn test_already_delivered_with_ties() {
        let boundary = PageBoundary::new(&Entry::hash_id("b"), at(10));
        assert!(boundary.already_delivered(&Entry::new("c", "same time", at(10)), true));
        assert!(!boundary.already_delivered(&Entry::new("d", "older", at(9)), true));
    }
}
