use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};
use tracing::info;

use crate::app::{Result, TributaryError};
use crate::domain::{Entry, Feed, SubscriptionList};
use crate::store::Store;

const FEED_COLUMNS: &str = "id, url, title, permalink, etag, last_modified, revised_at";

const ENTRY_COLUMNS: &str = "guid, hash, title, permalink, content, summary, author, \
                             published_at, updated_at, is_read, is_starred";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;

        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| TributaryError::Other(format!("Migration failed: {}", e)))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| TributaryError::Lock(e.to_string()))
    }

    /// Fixed-width UTC timestamps so that text ordering in SQL matches time
    /// ordering.
    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn row_to_feed(row: &Row<'_>) -> rusqlite::Result<Feed> {
        Ok(Feed {
            id: row.get(0)?,
            url: row.get(1)?,
            title: row.get(2)?,
            permalink: row.get(3)?,
            entries: Vec::new(),
            etag: row.get(4)?,
            last_modified: row.get(5)?,
            revised_at: row
                .get::<_, Option<String>>(6)?
                .and_then(|s| Self::parse_datetime(&s)),
        })
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<Entry> {
        Ok(Entry {
            id: row.get(0)?,
            hash: row.get(1)?,
            title: row.get(2)?,
            permalink: row.get(3)?,
            content: row.get(4)?,
            summary: row.get(5)?,
            author: row.get(6)?,
            published_at: row
                .get::<_, Option<String>>(7)?
                .and_then(|s| Self::parse_datetime(&s)),
            updated_at: row
                .get::<_, String>(8)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            read: row.get::<_, i32>(9)? != 0,
            starred: row.get::<_, i32>(10)? != 0,
        })
    }

    fn query_feed_meta(conn: &Connection, feed_id: &str) -> Result<Option<Feed>> {
        let feed = conn
            .query_row(
                &format!("SELECT {FEED_COLUMNS} FROM feeds WHERE id = ?1"),
                params![feed_id],
                Self::row_to_feed,
            )
            .optional()?;
        Ok(feed)
    }

    fn feed_exists(conn: &Connection, feed_id: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM feeds WHERE id = ?1",
            params![feed_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn touch_revision(conn: &Connection, feed_id: &str) -> Result<()> {
        conn.execute(
            "UPDATE feeds SET revised_at = ?1 WHERE id = ?2",
            params![Self::format_datetime(&Utc::now()), feed_id],
        )?;
        Ok(())
    }

    fn set_flag(&self, column: &str, feed_id: &str, entry_hash: &str, value: bool) -> Result<()> {
        let conn = self.conn()?;

        let updated = conn.execute(
            &format!("UPDATE entries SET {column} = ?1 WHERE feed_id = ?2 AND hash = ?3"),
            params![value as i32, feed_id, entry_hash],
        )?;

        if updated == 0 {
            return Err(if Self::feed_exists(&conn, feed_id)? {
                TributaryError::EntryNotFound(entry_hash.to_string())
            } else {
                TributaryError::FeedNotFound(feed_id.to_string())
            });
        }

        Self::touch_revision(&conn, feed_id)
    }

    fn read_subscriptions(conn: &Connection) -> Result<SubscriptionList> {
        let row = conn
            .query_row(
                "SELECT document, version FROM subscriptions WHERE id = 1",
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        match row {
            Some((document, version)) => {
                let mut list: SubscriptionList = serde_json::from_str(&document)?;
                list.version = version;
                Ok(list)
            }
            None => Ok(SubscriptionList::default()),
        }
    }

    fn write_subscriptions(conn: &Connection, list: &SubscriptionList) -> Result<i64> {
        let document = serde_json::to_string(list)?;
        conn.execute(
            "INSERT INTO subscriptions (id, document, version) VALUES (1, ?1, 1)
             ON CONFLICT(id) DO UPDATE SET document = excluded.document, version = version + 1",
            params![document],
        )?;
        let version = conn.query_row("SELECT version FROM subscriptions WHERE id = 1", [], |row| {
            row.get(0)
        })?;
        Ok(version)
    }

    /// Upsert a feed and its entries. Run inside a transaction.
    fn write_feed(conn: &Connection, feed: &Feed) -> Result<usize> {
        conn.execute(
            "INSERT INTO feeds (id, url, title, permalink, etag, last_modified, revised_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                url = excluded.url,
                title = excluded.title,
                permalink = excluded.permalink,
                etag = excluded.etag,
                last_modified = excluded.last_modified,
                revised_at = excluded.revised_at",
            params![
                feed.id,
                feed.url,
                feed.title,
                feed.permalink,
                feed.etag,
                feed.last_modified,
                Self::format_datetime(&Utc::now())
            ],
        )?;

        let mut count = 0;
        for entry in &feed.entries {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM entries WHERE feed_id = ?1 AND hash = ?2",
                params![feed.id, entry.hash],
                |row| row.get(0),
            )?;
            if exists == 0 {
                count += 1;
            }

            // Crawls never carry reader state, so flags are only written on
            // first insert.
            conn.execute(
                "INSERT INTO entries (feed_id, guid, hash, title, permalink, content, summary,
                                      author, published_at, updated_at, is_read, is_starred)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                 ON CONFLICT(feed_id, hash) DO UPDATE SET
                    guid = excluded.guid,
                    title = excluded.title,
                    permalink = excluded.permalink,
                    content = excluded.content,
                    summary = excluded.summary,
                    author = excluded.author,
                    published_at = excluded.published_at,
                    updated_at = excluded.updated_at",
                params![
                    feed.id,
                    entry.id,
                    entry.hash,
                    entry.title,
                    entry.permalink,
                    entry.content,
                    entry.summary,
                    entry.author,
                    entry.published_at.as_ref().map(Self::format_datetime),
                    Self::format_datetime(&entry.updated_at),
                    entry.read as i32,
                    entry.starred as i32
                ],
            )?;
        }

        Ok(count)
    }

    /// Apply `f` to the subscription tree and delete stored feeds the edit
    /// left without any subscription. Run inside a transaction.
    fn edit_subscriptions<T, F>(conn: &Connection, f: F) -> Result<T>
    where
        F: FnOnce(&mut SubscriptionList) -> Result<T>,
    {
        let mut list = Self::read_subscriptions(conn)?;
        let before = Self::subscribed_feed_ids(&list);
        let value = f(&mut list)?;

        let after = Self::subscribed_feed_ids(&list);
        for feed_id in before.difference(&after) {
            info!("Dropping unsubscribed feed {}", feed_id);
            conn.execute("DELETE FROM feeds WHERE id = ?1", params![feed_id])?;
        }

        Self::write_subscriptions(conn, &list)?;
        Ok(value)
    }

    fn subscribed_feed_ids(list: &SubscriptionList) -> HashSet<String> {
        list.root
            .recursive_subscriptions()
            .into_iter()
            .map(|s| s.feed_id.clone())
            .collect()
    }
}

impl Store for SqliteStore {
    fn get_feed(&self, feed_id: &str) -> Result<Option<Feed>> {
        let conn = self.conn()?;

        let Some(mut feed) = Self::query_feed_meta(&conn, feed_id)? else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE feed_id = ?1 ORDER BY updated_at DESC, hash"
        ))?;

        feed.entries = stmt
            .query_map(params![feed_id], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(Some(feed))
    }

    fn get_feed_meta(&self, feed_id: &str) -> Result<Option<Feed>> {
        let conn = self.conn()?;
        Self::query_feed_meta(&conn, feed_id)
    }

    fn get_all_feeds(&self) -> Result<Vec<Feed>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds ORDER BY title COLLATE NOCASE, url"
        ))?;

        let feeds = stmt
            .query_map([], Self::row_to_feed)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(feeds)
    }

    fn put_feed(&self, feed: &Feed) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let count = Self::write_feed(&tx, feed)?;
        tx.commit()?;
        Ok(count)
    }

    fn delete_feed(&self, feed_id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM feeds WHERE id = ?1", params![feed_id])?;
        Ok(())
    }

    fn set_read(&self, feed_id: &str, entry_hash: &str, is_read: bool) -> Result<()> {
        self.set_flag("is_read", feed_id, entry_hash, is_read)
    }

    fn set_starred(&self, feed_id: &str, entry_hash: &str, is_starred: bool) -> Result<()> {
        self.set_flag("is_starred", feed_id, entry_hash, is_starred)
    }

    fn mark_all_read(&self, feed_id: &str, up_to: Option<DateTime<Utc>>) -> Result<usize> {
        let conn = self.conn()?;

        if !Self::feed_exists(&conn, feed_id)? {
            return Err(TributaryError::FeedNotFound(feed_id.to_string()));
        }

        let updated = conn.execute(
            "UPDATE entries SET is_read = 1
             WHERE feed_id = ?1 AND is_read = 0 AND (?2 IS NULL OR updated_at <= ?2)",
            params![feed_id, up_to.as_ref().map(Self::format_datetime)],
        )?;

        Self::touch_revision(&conn, feed_id)?;
        Ok(updated)
    }

    fn get_unread_count(&self, feed_id: &str) -> Result<i64> {
        let conn = self.conn()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE feed_id = ?1 AND is_read = 0",
            params![feed_id],
            |row| row.get(0),
        )?;

        Ok(count)
    }

    fn get_subscriptions(&self) -> Result<SubscriptionList> {
        let conn = self.conn()?;
        Self::read_subscriptions(&conn)
    }

    fn put_subscriptions(&self, list: &SubscriptionList) -> Result<i64> {
        let conn = self.conn()?;
        Self::write_subscriptions(&conn, list)
    }

    fn update_subscriptions<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut SubscriptionList) -> Result<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let value = Self::edit_subscriptions(&tx, f)?;
        tx.commit()?;
        Ok(value)
    }

    fn subscribe_feed<T, F>(&self, feed: &Feed, f: F) -> Result<(usize, T)>
    where
        F: FnOnce(&mut SubscriptionList) -> Result<T>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let count = Self::write_feed(&tx, feed)?;
        let value = Self::edit_subscriptions(&tx, f)?;
        tx.commit()?;
        Ok((count, value))
    }
}
