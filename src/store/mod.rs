pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{Feed, SubscriptionList};

pub use sqlite::SqliteStore;

/// Persistent home of crawled feeds and the subscription tree.
///
/// Every method is atomic with respect to other calls on the same store;
/// read-modify-write of the subscription tree goes through
/// [`Store::update_subscriptions`].
pub trait Store {
    // Feed operations
    fn get_feed(&self, feed_id: &str) -> Result<Option<Feed>>;
    /// Feed metadata only; `entries` is left empty.
    fn get_feed_meta(&self, feed_id: &str) -> Result<Option<Feed>>;
    /// Metadata of every stored feed, ordered by title.
    fn get_all_feeds(&self) -> Result<Vec<Feed>>;
    /// Merge a crawled feed into storage, keyed by entry identifier. Existing
    /// entries keep their read/starred flags. Returns the number of entries
    /// that were not stored before.
    fn put_feed(&self, feed: &Feed) -> Result<usize>;
    fn delete_feed(&self, feed_id: &str) -> Result<()>;

    // Entry state operations
    fn set_read(&self, feed_id: &str, entry_hash: &str, is_read: bool) -> Result<()>;
    fn set_starred(&self, feed_id: &str, entry_hash: &str, is_starred: bool) -> Result<()>;
    /// Mark every entry updated at or before `up_to` (all entries when
    /// `None`) as read.
    fn mark_all_read(&self, feed_id: &str, up_to: Option<DateTime<Utc>>) -> Result<usize>;
    fn get_unread_count(&self, feed_id: &str) -> Result<i64>;

    // Subscription tree operations
    fn get_subscriptions(&self) -> Result<SubscriptionList>;
    fn put_subscriptions(&self, list: &SubscriptionList) -> Result<i64>;
    /// Read-modify-write of the subscription tree in one transaction. Stored
    /// feeds that lose their last subscription in the edit are deleted with
    /// it; nothing changes when `f` fails.
    fn update_subscriptions<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SubscriptionList) -> Result<T>,
        Self: Sized;
    /// [`Store::put_feed`] and [`Store::update_subscriptions`] in a single
    /// transaction. Returns the new entry count and `f`'s value.
    fn subscribe_feed<T, F>(&self, feed: &Feed, f: F) -> Result<(usize, T)>
    where
        F: FnOnce(&mut SubscriptionList) -> Result<T>,
        Self: Sized;
}
