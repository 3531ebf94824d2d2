//! Path parsing for the JSON API.
//!
//! Every resource may be prefixed with a category path (`/-Tech/-Rust/...`),
//! which axum's router cannot express, so requests are matched here instead.

use crate::domain::CategoryPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryFlag {
    Read,
    Unread,
    Star,
    Unstar,
}

impl EntryFlag {
    fn parse(segment: &str) -> Option<Self> {
        match segment {
            "read" => Some(Self::Read),
            "unread" => Some(Self::Unread),
            "star" => Some(Self::Star),
            "unstar" => Some(Self::Unstar),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    /// `/` or `/<category>/`
    Category,
    /// `.../feeds/`
    Feeds,
    /// `.../feeds/<feed_id>/`
    Feed { feed_id: String },
    /// `.../feeds/<feed_id>/entries/`
    FeedEntries { feed_id: String },
    /// `.../feeds/<feed_id>/entries/read/`
    FeedReadAll { feed_id: String },
    /// `.../feeds/<feed_id>/entries/<entry_id>/`
    Entry { feed_id: String, entry_id: String },
    /// `.../feeds/<feed_id>/entries/<entry_id>/{read,unread,star,unstar}/`
    EntryFlag {
        feed_id: String,
        entry_id: String,
        flag: EntryFlag,
    },
    /// `.../entries/`
    Entries,
    /// `.../entries/read/`
    ReadAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub category: CategoryPath,
    pub resource: Resource,
}

impl Target {
    /// `None` when the path names no resource.
    pub fn parse(path: &str) -> Option<Self> {
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| urlencoding::decode(s).ok().map(|s| s.into_owned()))
            .collect::<Option<Vec<_>>>()?;

        let split = segments
            .iter()
            .position(|s| !s.starts_with('-'))
            .unwrap_or(segments.len());
        let (labels, rest) = segments.split_at(split);

        // Labels may contain `/` once decoded; validate them one by one.
        let category = labels
            .iter()
            .try_fold(CategoryPath::root(), |path, label| {
                let label = label.strip_prefix('-')?;
                (!label.is_empty() && !label.contains('/')).then(|| path.child(label))
            })?;

        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
        let resource = match rest.as_slice() {
            [] => Resource::Category,
            ["feeds"] => Resource::Feeds,
            ["feeds", feed_id] => Resource::Feed {
                feed_id: feed_id.to_string(),
            },
            ["feeds", feed_id, "entries"] => Resource::FeedEntries {
                feed_id: feed_id.to_string(),
            },
            ["feeds", feed_id, "entries", "read"] => Resource::FeedReadAll {
                feed_id: feed_id.to_string(),
            },
            ["feeds", feed_id, "entries", entry_id] => Resource::Entry {
                feed_id: feed_id.to_string(),
                entry_id: entry_id.to_string(),
            },
            ["feeds", feed_id, "entries", entry_id, flag] => Resource::EntryFlag {
                feed_id: feed_id.to_string(),
                entry_id: entry_id.to_string(),
                flag: EntryFlag::parse(flag)?,
            },
            ["entries"] => Resource::Entries,
            ["entries", "read"] => Resource::ReadAll,
            _ => return None,
        };

        Some(Self { category, resource })
    }
}
