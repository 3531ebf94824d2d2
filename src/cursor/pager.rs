use std::sync::{Arc, Mutex, PoisonError};

use crate::app::Result;
use crate::cursor::{CursorKind, CursorRegistry, EntryFilter, EntryView, SuspendedCursor};

/// Paging parameters as received from the client.
#[derive(Debug, Clone, Default)]
pub struct PageRequest<'a> {
    pub token: Option<&'a str>,
    pub entry_after: Option<&'a str>,
    pub filter: EntryFilter,
    pub page_size: usize,
}

/// Where the following page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextPage {
    pub token: String,
    pub entry_after: String,
}

#[derive(Debug)]
pub struct Page {
    pub entries: Vec<EntryView>,
    pub next: Option<NextPage>,
}

/// Serve one page, resuming the suspended cursor for the request's token.
///
/// When the token is unknown, stale, or names a cursor of another kind,
/// `rebuild` creates a fresh one positioned from `entry_after` and the
/// client's token is reused for it. Exhausted cursors are removed.
pub fn next_page<F>(
    registry: &CursorRegistry,
    request: &PageRequest<'_>,
    kind: CursorKind,
    rebuild: F,
) -> Result<Page>
where
    F: FnOnce() -> Result<SuspendedCursor>,
{
    let token = match request.token {
        Some(token) if !token.is_empty() => token.to_string(),
        _ => registry.issue_token(),
    };

    let suspended = registry.get(&token).filter(|cursor| {
        cursor
            .lock()
            .map(|c| c.kind() == kind)
            .unwrap_or(false)
    });

    let cursor = match suspended {
        Some(cursor) => cursor,
        None => {
            tracing::debug!("Building cursor for token {}", token);
            Arc::new(Mutex::new(rebuild()?))
        }
    };

    let (entries, next_position) = {
        let mut guard = cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = guard.collect_page(request.page_size);
        let next_position = match entries.last() {
            Some(last) if guard.has_more() => Some(guard.resume_position(last)),
            _ => None,
        };
        (entries, next_position)
    };

    let next = match next_position {
        Some(entry_after) => {
            registry.save(&token, cursor);
            Some(NextPage { token, entry_after })
        }
        None => {
            registry.remove(&token);
            None
        }
    };
    registry.evict_stale();

    Ok(Page { entries, next })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::test_support::feed_with;
    use crate::cursor::{FeedCursor, MergeCursor, PageBoundary};
    use crate::domain::{CategoryPath, Feed};

    fn feed_cursor(feed: Feed, entry_after: Option<&str>) -> Result<SuspendedCursor> {
        let mut cursor = FeedCursor::from_feed(feed, &CategoryPath::root(), EntryFilter::default());
        cursor.resume_after(entry_after);
        Ok(SuspendedCursor::Feed(cursor))
    }

    fn request<'a>(token: Option<&'a str>, entry_after: Option<&'a str>) -> PageRequest<'a> {
        PageRequest {
            token,
            entry_after,
            filter: EntryFilter::default(),
            page_size: 20,
        }
    }

    #[test]
    fn test_single_page_leaves_nothing_behind() {
        let registry = CursorRegistry::default();
        let page = next_page(&registry, &request(None, None), CursorKind::Feed, || {
            feed_cursor(feed_with("three", 1, 1, 0), None)
        })
        .unwrap();
        assert_eq!(page.entries.len(), 1);
        assert!(page.next.is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_pages_through_suspended_cursor() {
        let registry = CursorRegistry::default();
        let feed = feed_with("a", 45, 1, 0);

        let first = next_page(&registry, &request(None, None), CursorKind::Feed, || {
            feed_cursor(feed.clone(), None)
        })
        .unwrap();
        let next = first.next.unwrap();
        assert_eq!(next.entry_after, first.entries[19].entry_id);
        assert_eq!(registry.len(), 1);

        let second = next_page(
            &registry,
            &request(Some(&next.token), Some(&next.entry_after)),
            CursorKind::Feed,
            || panic!("suspended cursor should be reused"),
        )
        .unwrap();
        assert_eq!(second.entries.len(), 20);
        let next = second.next.unwrap();

        let third = next_page(
            &registry,
            &request(Some(&next.token), Some(&next.entry_after)),
            CursorKind::Feed,
            || panic!("suspended cursor should be reused"),
        )
        .unwrap();
        assert_eq!(third.entries.len(), 5);
        assert!(third.next.is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_lost_token_rebuilds_from_position() {
        let registry = CursorRegistry::default();
        let feed = feed_with("a", 30, 1, 0);

        let first = next_page(&registry, &request(None, None), CursorKind::Feed, || {
            feed_cursor(feed.clone(), None)
        })
        .unwrap();
        let next = first.next.unwrap();
        registry.remove(&next.token);

        let second = next_page(
            &registry,
            &request(Some(&next.token), Some(&next.entry_after)),
            CursorKind::Feed,
            || feed_cursor(feed.clone(), Some(&next.entry_after)),
        )
        .unwrap();
        assert_eq!(second.entries.len(), 10);
        assert_eq!(second.entries[0].title, "a 9");
    }

    #[test]
    fn test_wrong_kind_is_rebuilt() {
        let registry = CursorRegistry::default();
        let feeds = vec![feed_with("a", 25, 1, 0)];
        let first = next_page(&registry, &request(None, None), CursorKind::Feed, || {
            feed_cursor(feeds[0].clone(), None)
        })
        .unwrap();
        let token = first.next.unwrap().token;

        let page = next_page(
            &registry,
            &request(Some(&token), None),
            CursorKind::Category,
            || {
                let cursors = feeds
                    .iter()
                    .cloned()
                    .map(|f| FeedCursor::from_feed(f, &CategoryPath::root(), EntryFilter::default()))
                    .collect();
                Ok(SuspendedCursor::Category(MergeCursor::new(cursors, None)))
            },
        )
        .unwrap();
        assert_eq!(page.entries[0].title, "a 24");
        let next = page.next.unwrap();
        assert_eq!(next.token, token);
        assert!(PageBoundary::decode(&next.entry_after).is_some());
    }

    #[test]
    fn test_rebuild_error_propagates() {
        let registry = CursorRegistry::default();
        let result = next_page(&registry, &request(None, None), CursorKind::Feed, || {
            Err(crate::app::TributaryError::FeedNotFound("x".into()))
        });
        assert!(result.is_err());
    }
}
