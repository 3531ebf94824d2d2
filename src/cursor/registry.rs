use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::cursor::{EntryView, FeedCursor, MergeCursor, PageBoundary};

pub const DEFAULT_CAPACITY: usize = 10;
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// A cursor parked between two page requests.
#[derive(Debug)]
pub enum SuspendedCursor {
    Feed(FeedCursor),
    Category(MergeCursor),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorKind {
    Feed,
    Category,
}

impl SuspendedCursor {
    pub fn kind(&self) -> CursorKind {
        match self {
            Self::Feed(_) => CursorKind::Feed,
            Self::Category(_) => CursorKind::Category,
        }
    }

    pub fn collect_page(&mut self, size: usize) -> Vec<EntryView> {
        match self {
            Self::Feed(cursor) => cursor.collect_page(size),
            Self::Category(cursor) => cursor.collect_page(size),
        }
    }

    pub fn has_more(&self) -> bool {
        match self {
            Self::Feed(cursor) => cursor.has_more(),
            Self::Category(cursor) => cursor.has_more(),
        }
    }

    /// The `entry_after` value that resumes right after `last`.
    pub fn resume_position(&self, last: &EntryView) -> String {
        match self {
            Self::Feed(_) => last.entry_id.clone(),
            Self::Category(_) => PageBoundary::from_view(last).encode(),
        }
    }
}

pub type SharedCursor = Arc<Mutex<SuspendedCursor>>;

struct Slot {
    cursor: SharedCursor,
    touched_at: DateTime<Utc>,
}

/// Recency-bounded cache of suspended cursors keyed by opaque token.
///
/// Losing a cursor is harmless: the next request rebuilds it from the resume
/// position in its URL. Lock poisoning is therefore recovered, never
/// reported.
pub struct CursorRegistry {
    slots: Mutex<HashMap<String, Slot>>,
    capacity: usize,
    ttl: chrono::Duration,
    issued: AtomicU64,
}

impl Default for CursorRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl CursorRegistry {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            capacity,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
            issued: AtomicU64::new(0),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `<nanoseconds hex>-<counter hex>`, unique within this process.
    pub fn issue_token(&self) -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let counter = self.issued.fetch_add(1, Ordering::Relaxed);
        format!("{nanos:x}-{counter:x}")
    }

    pub fn save(&self, token: &str, cursor: SharedCursor) {
        self.save_at(token, cursor, Utc::now());
    }

    pub(crate) fn save_at(&self, token: &str, cursor: SharedCursor, now: DateTime<Utc>) {
        self.slots().insert(
            token.to_string(),
            Slot {
                cursor,
                touched_at: now,
            },
        );
    }

    /// Stale slots count as missing even before [`Self::evict_stale`] runs.
    pub fn get(&self, token: &str) -> Option<SharedCursor> {
        self.get_at(token, Utc::now())
    }

    pub(crate) fn get_at(&self, token: &str, now: DateTime<Utc>) -> Option<SharedCursor> {
        self.slots()
            .get(token)
            .filter(|slot| now - slot.touched_at <= self.ttl)
            .map(|slot| slot.cursor.clone())
    }

    pub fn remove(&self, token: &str) {
        self.slots().remove(token);
    }

    /// Drop slots older than the TTL, then keep only the `capacity` most
    /// recently touched. Returns how many were dropped.
    pub fn evict_stale(&self) -> usize {
        self.evict_stale_at(Utc::now())
    }

    pub(crate) fn evict_stale_at(&self, now: DateTime<Utc>) -> usize {
        let mut slots = self.slots();
        let before = slots.len();

        slots.retain(|_, slot| now - slot.touched_at <= self.ttl);

        if slots.len() > self.capacity {
            let mut by_recency: Vec<_> = slots
                .iter()
                .map(|(token, slot)| (slot.touched_at, token.clone()))
                .collect();
            by_recency.sort_unstable_by(|a, b| b.cmp(a));
            for (_, token) in by_recency.into_iter().skip(self.capacity) {
                slots.remove(&token);
            }
        }

        let evicted = before - slots.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} suspended cursors", evicted);
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::test_support::feed_with;
    use crate::cursor::EntryFilter;
    use crate::domain::CategoryPath;
    use chrono::TimeZone;

    fn cursor() -> SharedCursor {
        let feed = feed_with("a", 3, 1, 0);
        Arc::new(Mutex::new(SuspendedCursor::Feed(FeedCursor::from_feed(
            feed,
            &CategoryPath::root(),
            EntryFilter::default(),
        ))))
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_tokens_are_unique() {
        let registry = CursorRegistry::default();
        let a = registry.issue_token();
        let b = registry.issue_token();
        assert_ne!(a, b);
        assert!(a.split_once('-').is_some());
    }

    #[test]
    fn test_save_get_remove() {
        let registry = CursorRegistry::default();
        let saved = cursor();
        registry.save("t", saved.clone());
        assert!(Arc::ptr_eq(&registry.get("t").unwrap(), &saved));

        // Overwrite is idempotent
        registry.save("t", saved);
        assert_eq!(registry.len(), 1);

        registry.remove("t");
        assert!(registry.get("t").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_stale_slot_is_missing_and_evicted() {
        let registry = CursorRegistry::new(10, Duration::from_secs(30 * 60));
        registry.save_at("old", cursor(), t0());
        registry.save_at("fresh", cursor(), t0() + chrono::Duration::minutes(20));

        let now = t0() + chrono::Duration::minutes(31);
        assert!(registry.get_at("old", now).is_none());
        assert!(registry.get_at("fresh", now).is_some());

        assert_eq!(registry.evict_stale_at(now), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_capacity_keeps_most_recently_touched() {
        let registry = CursorRegistry::new(10, Duration::from_secs(30 * 60));
        for i in 0..11 {
            registry.save_at(&format!("t{i}"), cursor(), t0() + chrono::Duration::seconds(i));
        }
        // Touching t0 again makes t1 the least recently used
        registry.save_at("t0", cursor(), t0() + chrono::Duration::seconds(60));

        let now = t0() + chrono::Duration::minutes(2);
        assert_eq!(registry.evict_stale_at(now), 1);
        assert_eq!(registry.len(), 10);
        assert!(registry.get_at("t1", now).is_none());
        assert!(registry.get_at("t0", now).is_some());
        assert!(registry.get_at("t10", now).is_some());
    }

    #[test]
    fn test_suspended_cursor_resume_position() {
        let shared = cursor();
        let mut suspended = shared.lock().unwrap();
        if let SuspendedCursor::Feed(c) = &mut *suspended {
            c.resume_after(None);
        }
        assert_eq!(suspended.kind(), CursorKind::Feed);
        let page = suspended.collect_page(1);
        assert_eq!(suspended.resume_position(&page[0]), page[0].entry_id);
        assert!(suspended.has_more());
    }
}
