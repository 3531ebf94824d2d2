use std::vec;

use crate::cursor::{EntryFilter, EntryView, FeedContext, PageBoundary};
use crate::domain::{CategoryPath, Entry, Feed};

/// Forward-only cursor over one feed's entries, newest first.
///
/// `current` is always the next entry to emit: already filter-matched and
/// positioned. A new cursor is unpositioned until [`FeedCursor::resume_after`]
/// is called.
#[derive(Debug)]
pub struct FeedCursor {
    feed: FeedContext,
    entries: vec::IntoIter<Entry>,
    current: Option<Entry>,
    filter: EntryFilter,
}

impl FeedCursor {
    pub fn new(feed: FeedContext, mut entries: Vec<Entry>, filter: EntryFilter) -> Self {
        entries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Self {
            feed,
            entries: entries.into_iter(),
            current: None,
            filter,
        }
    }

    pub fn from_feed(feed: Feed, category: &CategoryPath, filter: EntryFilter) -> Self {
        let context = FeedContext::new(&feed, category);
        Self::new(context, feed.entries, filter)
    }

    pub fn feed(&self) -> &FeedContext {
        &self.feed
    }

    pub fn current(&self) -> Option<&Entry> {
        self.current.as_ref()
    }

    /// Move to the next entry matching the filter. `None` once exhausted.
    pub fn advance(&mut self) -> Option<&Entry> {
        let filter = self.filter;
        self.current = self.entries.find(|entry| filter.matches(entry));
        self.current.as_ref()
    }

    pub fn current_view(&self) -> Option<EntryView> {
        self.current
            .as_ref()
            .map(|entry| EntryView::new(entry, &self.feed))
    }

    /// Position the cursor. With an entry hash, everything up to and including
    /// that entry is discarded regardless of the filter; if it never shows up
    /// the cursor ends exhausted. Returns whether an entry is available.
    pub fn resume_after(&mut self, entry_after: Option<&str>) -> bool {
        if let Some(hash) = entry_after {
            if !self.entries.any(|entry| entry.hash == hash) {
                self.current = None;
                return false;
            }
        }
        self.advance().is_some()
    }

    /// Whether `hash` is still ahead of the cursor, filtered or not.
    pub fn holds(&self, hash: &str) -> bool {
        self.current
            .iter()
            .chain(self.entries.as_slice())
            .any(|entry| entry.hash == hash)
    }

    /// Position the cursor past what a merged listing delivered up to
    /// `boundary`. `owner` is the id of the feed holding the boundary entry:
    /// that feed resumes right after it, and entries tied with the boundary
    /// in feeds with a smaller id count as delivered. Returns whether an
    /// entry is available.
    pub fn skip_delivered(&mut self, boundary: &PageBoundary, owner: Option<&str>) -> bool {
        let feed_id = self.feed.feed_id.as_str();
        if owner == Some(feed_id) {
            return self.resume_after(Some(&boundary.entry_id));
        }

        let ties_delivered = owner.is_some_and(|owner| feed_id < owner);
        self.advance();
        while self
            .current
            .as_ref()
            .is_some_and(|entry| boundary.already_delivered(entry, ties_delivered))
        {
            self.advance();
        }
        self.has_more()
    }

    pub fn collect_page(&mut self, size: usize) -> Vec<EntryView> {
        let mut page = Vec::with_capacity(size);
        while page.len() < size {
            let Some(view) = self.current_view() else {
                break;
            };
            page.push(view);
            self.advance();
        }
        page
    }

    pub fn has_more(&self) -> bool {
        self.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::test_support::{at, feed_with};

    fn cursor(feed: Feed, filter: EntryFilter) -> FeedCursor {
        FeedCursor::from_feed(feed, &CategoryPath::root(), filter)
    }

    fn ids(page: &[EntryView]) -> Vec<String> {
        page.iter().map(|v| v.title.clone()).collect()
    }

    #[test]
    fn test_emits_newest_first() {
        let mut c = cursor(feed_with("a", 3, 1, 0), EntryFilter::default());
        assert!(c.resume_after(None));
        assert_eq!(ids(&c.collect_page(10)), ["a 2", "a 1", "a 0"]);
        assert!(!c.has_more());
        assert!(c.current_view().is_none());
    }

    #[test]
    fn test_unpositioned_cursor_has_nothing() {
        let c = cursor(feed_with("a", 3, 1, 0), EntryFilter::default());
        assert!(!c.has_more());
    }

    #[test]
    fn test_advance_applies_filters() {
        let mut feed = feed_with("a", 6, 1, 0);
        for entry in feed.entries.iter_mut().step_by(2) {
            entry.read = true;
        }
        feed.entries[1].starred = true;

        let mut unread = cursor(feed.clone(), EntryFilter::from_params(Some("False"), None));
        unread.resume_after(None);
        assert_eq!(ids(&unread.collect_page(10)), ["a 5", "a 3", "a 1"]);

        let mut starred_unread =
            cursor(feed, EntryFilter::from_params(Some("false"), Some("true")));
        starred_unread.resume_after(None);
        assert_eq!(ids(&starred_unread.collect_page(10)), ["a 1"]);
    }

    #[test]
    fn test_resume_after_skips_through_entry() {
        let feed = feed_with("a", 5, 1, 0);
        let hash = Entry::hash_id("a-3");
        let mut c = cursor(feed, EntryFilter::default());
        assert!(c.resume_after(Some(&hash)));
        assert_eq!(ids(&c.collect_page(10)), ["a 2", "a 1", "a 0"]);
    }

    #[test]
    fn test_resume_after_ignores_filter_for_boundary() {
        let mut feed = feed_with("a", 4, 1, 0);
        // The boundary entry was marked read after it was delivered
        feed.entries[2].read = true;
        let hash = Entry::hash_id("a-2");
        let mut c = cursor(feed, EntryFilter::from_params(Some("false"), None));
        assert!(c.resume_after(Some(&hash)));
        assert_eq!(ids(&c.collect_page(10)), ["a 1", "a 0"]);
    }

    #[test]
    fn test_resume_after_unknown_entry_exhausts() {
        let mut c = cursor(feed_with("a", 3, 1, 0), EntryFilter::default());
        assert!(!c.resume_after(Some("unknown")));
        assert!(c.collect_page(10).is_empty());
    }

    #[test]
    fn test_pages_are_exhaustive_without_duplicates() {
        for size in [1, 3, 7, 50] {
            let mut c = cursor(feed_with("a", 17, 1, 0), EntryFilter::default());
            c.resume_after(None);
            let mut seen = Vec::new();
            while c.has_more() {
                let page = c.collect_page(size);
                assert!(page.len() <= size);
                seen.extend(ids(&page));
            }
            assert_eq!(seen.len(), 17);
            seen.dedup();
            assert_eq!(seen.len(), 17);
        }
    }

    #[test]
    fn test_skip_delivered_without_owner() {
        let feed = feed_with("a", 5, 10, 0);
        let mut c = cursor(feed, EntryFilter::default());
        let boundary = PageBoundary::new(&Entry::hash_id("a-2"), at(20));
        assert!(c.skip_delivered(&boundary, None));
        assert_eq!(c.current().map(|e| e.title.as_str()), Some("a 1"));
    }

    #[test]
    fn test_skip_delivered_owner_resumes_after_boundary_entry() {
        // Three entries share the boundary time; the first two were delivered
        let mut feed = Feed::new("https://a.example/feed", "a");
        for i in 0..3 {
            feed.entries.push(Entry::new(&format!("e{i}"), &format!("e{i}"), at(5)));
        }
        feed.entries.push(Entry::new("e3", "e3", at(1)));
        let owner = feed.id.clone();

        let mut c = cursor(feed, EntryFilter::default());
        let boundary = PageBoundary::new(&Entry::hash_id("e1"), at(5));
        assert!(c.holds(&boundary.entry_id));
        assert!(c.skip_delivered(&boundary, Some(&owner)));
        assert_eq!(ids(&c.collect_page(10)), ["e2", "e3"]);
    }

    #[test]
    fn test_skip_delivered_ties_depend_on_feed_order() {
        let mut feed = Feed::new("https://a.example/feed", "a");
        feed.entries.push(Entry::new("tied", "tied", at(5)));
        feed.entries.push(Entry::new("older", "older", at(4)));
        let boundary = PageBoundary::new("elsewhere", at(5));

        // Feed ids are hex digests: every one sorts before "~" and after ""
        let mut below_owner = cursor(feed.clone(), EntryFilter::default());
        below_owner.skip_delivered(&boundary, Some("~"));
        assert_eq!(below_owner.current().map(|e| e.title.as_str()), Some("older"));

        let mut above_owner = cursor(feed, EntryFilter::default());
        above_owner.skip_delivered(&boundary, Some(""));
        assert_eq!(above_owner.current().map(|e| e.title.as_str()), Some("tied"));
    }
}
