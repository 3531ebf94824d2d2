use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use chrono::{DateTime, Utc};

use crate::cursor::{EntryView, FeedCursor, PageBoundary};

/// K-way merge of feed cursors into one stream ordered by update time,
/// newest first.
///
/// Every cursor in the heap is positioned on a live entry; exhausted cursors
/// are dropped.
#[derive(Debug)]
pub struct MergeCursor {
    heads: BinaryHeap<Head>,
}

impl MergeCursor {
    /// Position every cursor and, when resuming, skip what the previous page
    /// already delivered.
    pub fn new(cursors: Vec<FeedCursor>, boundary: Option<&PageBoundary>) -> Self {
        let owner = boundary.and_then(|boundary| {
            cursors
                .iter()
                .find(|cursor| cursor.holds(&boundary.entry_id))
                .map(|cursor| cursor.feed().feed_id.clone())
        });

        let heads = cursors
            .into_iter()
            .filter_map(|mut cursor| {
                let live = match boundary {
                    Some(boundary) => cursor.skip_delivered(boundary, owner.as_deref()),
                    None => cursor.resume_after(None),
                };
                live.then_some(Head(cursor))
            })
            .collect();
        Self { heads }
    }

    pub fn next_entry(&mut self) -> Option<EntryView> {
        let Head(mut cursor) = self.heads.pop()?;
        let view = cursor.current_view();
        if cursor.advance().is_some() {
            self.heads.push(Head(cursor));
        }
        view
    }

    pub fn collect_page(&mut self, size: usize) -> Vec<EntryView> {
        let mut page = Vec::with_capacity(size);
        while page.len() < size {
            let Some(view) = self.next_entry() else {
                break;
            };
            page.push(view);
        }
        page
    }

    pub fn has_more(&self) -> bool {
        !self.heads.is_empty()
    }

    pub fn live_feeds(&self) -> usize {
        self.heads.len()
    }
}

/// Heap slot ordered by the current entry's update time; equal times pop in
/// ascending feed id order.
#[derive(Debug)]
struct Head(FeedCursor);

impl Head {
    fn key(&self) -> (Option<DateTime<Utc>>, Reverse<&str>) {
        (
            self.0.current().map(|entry| entry.updated_at),
            Reverse(self.0.feed().feed_id.as_str()),
        )
    }
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Head {}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}
