use chrono::Utc;
use feed_rs::model::Link;
use feed_rs::parser;
use html_escape::decode_html_entities;

use crate::app::{Result, TributaryError};
use crate::domain::{Entry, Feed};

#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, feed_url: &str, body: &[u8]) -> Result<Feed> {
        let parsed = parser::parse(body).map_err(|e| TributaryError::FeedParse(e.to_string()))?;

        let title = parsed
            .title
            .map(|t| decode_html_entities(&t.content).to_string())
            .unwrap_or_default();
        let mut feed = Feed::new(feed_url, &title);
        feed.permalink = alternate_link(&parsed.links);

        // Undated entries fall back to the feed's own timestamp so a re-crawl
        // does not keep bumping them to the top.
        let fallback = parsed.updated.unwrap_or_else(Utc::now);

        feed.entries = parsed
            .entries
            .into_iter()
            .map(|entry| {
                let link = alternate_link(&entry.links);
                let raw_id = if entry.id.is_empty() {
                    link.clone().unwrap_or_default()
                } else {
                    entry.id.clone()
                };
                let title = entry
                    .title
                    .map(|t| decode_html_entities(&t.content).to_string())
                    .unwrap_or_default();
                let updated_at = entry.updated.or(entry.published).unwrap_or(fallback);

                let mut normalized = Entry::new(&raw_id, &title, updated_at.with_timezone(&Utc));
                normalized.permalink = link;
                normalized.content = entry
                    .content
                    .and_then(|c| c.body)
                    .map(|b| decode_html_entities(&b).to_string());
                normalized.summary = entry
                    .summary
                    .map(|s| decode_html_entities(&s.content).to_string());
                normalized.author = entry.authors.first().map(|a| a.name.clone());
                normalized.published_at = entry.published.map(|dt| dt.with_timezone(&Utc));

                normalized
            })
            .collect();

        Ok(feed)
    }
}

/// The HTML alternate link, falling back to the first link of any kind.
fn alternate_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| {
            l.rel.as_deref().unwrap_or("alternate") == "alternate"
                && l
                    .media_type
                    .as_deref()
                    .is_none_or(|t| t.contains("html"))
        })
        .or_else(|| links.first())
        .map(|l| l.href.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test &amp; Feed</title>
    <link>https://example.com/</link>
    <description>A test feed</description>
    <item>
      <title>Test Item 1</title>
      <link>https://example.com/item1</link>
      <guid>item-1</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
      <description>This is item 1</description>
    </item>
    <item>
      <title>Test Item 2</title>
      <link>https://example.com/item2</link>
      <guid>item-2</guid>
      <description>This is item 2</description>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Test Feed</title>
  <id>urn:example:feed</id>
  <updated>2024-01-02T00:00:00Z</updated>
  <link rel="self" href="https://example.com/feed.atom"/>
  <link rel="alternate" type="text/html" href="https://example.com/"/>
  <entry>
    <title>Atom Entry 1</title>
    <link rel="related" href="https://example.com/related"/>
    <link rel="alternate" href="https://example.com/atom1"/>
    <id>atom-entry-1</id>
    <updated>2024-01-01T12:00:00Z</updated>
    <author><name>Alice</name></author>
    <summary>This is Atom entry 1</summary>
    <content type="html">&lt;p&gt;Body&lt;/p&gt;</content>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss() {
        let normalizer = Normalizer::new();
        let feed = normalizer
            .normalize("https://example.com/feed.xml", RSS_SAMPLE.as_bytes())
            .unwrap();

        assert_eq!(feed.title, "Test & Feed");
        assert_eq!(feed.id, Feed::id_for_url("https://example.com/feed.xml"));
        assert_eq!(feed.entries.len(), 2);
        let first = &feed.entries[0];
        assert_eq!(first.title, "Test Item 1");
        assert_eq!(first.id, "item-1");
        assert_eq!(first.permalink, Some("https://example.com/item1".into()));
        assert_eq!(
            first.updated_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(first.summary, Some("This is item 1".into()));
    }

    #[test]
    fn test_parse_atom() {
        let normalizer = Normalizer::new();
        let feed = normalizer
            .normalize("https://example.com/feed.atom", ATOM_SAMPLE.as_bytes())
            .unwrap();

        assert_eq!(feed.title, "Atom Test Feed");
        assert_eq!(feed.permalink, Some("https://example.com/".into()));
        assert_eq!(feed.entries.len(), 1);
        let entry = &feed.entries[0];
        assert_eq!(entry.title, "Atom Entry 1");
        assert_eq!(entry.permalink, Some("https://example.com/atom1".into()));
        assert_eq!(entry.author, Some("Alice".into()));
        assert_eq!(entry.display_content(), Some("<p>Body</p>"));
    }

    #[test]
    fn test_undated_entry_uses_feed_time() {
        let normalizer = Normalizer::new();
        let feed = normalizer
            .normalize("https://example.com/feed.xml", RSS_SAMPLE.as_bytes())
            .unwrap();
        let second = &feed.entries[1];
        assert!(second.published_at.is_none());
        assert!(second.updated_at > Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_entry_hash_determinism() {
        let normalizer = Normalizer::new();
        let feed1 = normalizer
            .normalize("https://example.com/feed.xml", RSS_SAMPLE.as_bytes())
            .unwrap();
        let feed2 = normalizer
            .normalize("https://example.com/feed.xml", RSS_SAMPLE.as_bytes())
            .unwrap();

        assert_eq!(feed1.entries[0].hash, feed2.entries[0].hash);
        assert_eq!(feed1.entries[1].hash, feed2.entries[1].hash);
        assert_eq!(feed1.entries[0].hash, Entry::hash_id("item-1"));
    }

    #[test]
    fn test_rejects_non_feed() {
        let normalizer = Normalizer::new();
        let result = normalizer.normalize("https://example.com/", b"<html><body>hi</body></html>");
        assert!(matches!(result, Err(TributaryError::FeedParse(_))));
    }
}
