//! In-process fetcher used by crawl, discovery, worker and HTTP tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::app::{Result, TributaryError};
use crate::fetcher::{FetchResult, Fetcher};

pub const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Static Feed</title>
  <id>urn:example:static</id>
  <updated>2024-01-02T00:00:00Z</updated>
  <link rel="alternate" type="text/html" href="https://example.com/"/>
  <entry>
    <title>First</title>
    <link rel="alternate" href="https://example.com/1"/>
    <id>urn:example:static:1</id>
    <updated>2024-01-01T00:00:00Z</updated>
  </entry>
  <entry>
    <title>Second</title>
    <link rel="alternate" href="https://example.com/2"/>
    <id>urn:example:static:2</id>
    <updated>2024-01-02T00:00:00Z</updated>
  </entry>
</feed>"#;

enum Page {
    Body(String),
    NotModified { etag: String },
}

#[derive(Default)]
pub struct StaticFetcher {
    pages: HashMap<String, Page>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), Page::Body(body.to_string()));
        self
    }

    /// Answer 304 when the request carries `etag`, otherwise an empty feed.
    pub fn with_not_modified(mut self, url: &str, etag: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Page::NotModified {
                etag: etag.to_string(),
            },
        );
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        _last_modified: Option<&str>,
    ) -> Result<FetchResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url) {
            Some(Page::Body(body)) => Ok(FetchResult::Content {
                body: body.clone().into_bytes(),
                etag: Some("\"atom\"".into()),
                last_modified: None,
                final_url: url.to_string(),
            }),
            Some(Page::NotModified { etag: expected }) if etag == Some(expected.as_str()) => {
                Ok(FetchResult::NotModified)
            }
            Some(Page::NotModified { .. }) => Ok(FetchResult::Content {
                body: ATOM_FEED.as_bytes().to_vec(),
                etag: None,
                last_modified: None,
                final_url: url.to_string(),
            }),
            None => Err(TributaryError::UnreachableUrl(url.to_string())),
        }
    }
}
