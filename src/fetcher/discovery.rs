use std::sync::LazyLock;

use regex::Regex;

use crate::app::{Result, TributaryError};
use crate::domain::Feed;
use crate::fetcher::{Crawler, FetchResult};

impl Crawler {
    /// Resolve a user-supplied URL to a feed.
    ///
    /// If the URL is a RSS/Atom document it is used directly; otherwise the
    /// page is searched for `<link rel="alternate">` feed links and the first
    /// one is fetched.
    pub async fn discover(&self, url: &str) -> Result<Feed> {
        let (body, final_url, etag, last_modified) =
            match self.fetcher.fetch(url, None, None).await {
                Ok(FetchResult::Content {
                    body,
                    final_url,
                    etag,
                    last_modified,
                }) => (body, final_url, etag, last_modified),
                Ok(FetchResult::NotModified) => {
                    return Err(TributaryError::UnreachableUrl(url.to_string()))
                }
                Err(e) => {
                    tracing::debug!("Discovery fetch of {} failed: {}", url, e);
                    return Err(TributaryError::UnreachableUrl(url.to_string()));
                }
            };

        if let Ok(mut feed) = self.normalizer.normalize(url, &body) {
            feed.etag = etag;
            feed.last_modified = last_modified;
            return Ok(feed);
        }

        let html = String::from_utf8_lossy(&body);
        let feed_url = find_feed_link(&html, &final_url)
            .ok_or_else(|| TributaryError::FeedUrlNotFound(url.to_string()))?;
        tracing::debug!("Discovered feed {} from {}", feed_url, url);

        match self.fetcher.fetch(&feed_url, None, None).await {
            Ok(FetchResult::Content {
                body,
                etag,
                last_modified,
                ..
            }) => {
                let mut feed = self
                    .normalizer
                    .normalize(&feed_url, &body)
                    .map_err(|_| TributaryError::FeedUrlNotFound(feed_url.clone()))?;
                feed.etag = etag;
                feed.last_modified = last_modified;
                Ok(feed)
            }
            _ => Err(TributaryError::FeedUrlNotFound(feed_url)),
        }
    }
}

static REL_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"<link[^>]*rel=["']alternate["'][^>]*type=["']application/(rss|atom)\+xml["'][^>]*href=["']([^"']+)["']"#,
    )
    .expect("valid feed link pattern")
});

// type before rel, or no rel at all
static TYPE_FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<link[^>]*type=["']application/(rss|atom)\+xml["'][^>]*href=["']([^"']+)["']"#)
        .expect("valid feed link pattern")
});

/// Search HTML for a RSS/Atom `<link>` and resolve it against `base_url`.
pub fn find_feed_link(html: &str, base_url: &str) -> Option<String> {
    let href = REL_FIRST
        .captures(html)
        .or_else(|| TYPE_FIRST.captures(html))
        .and_then(|cap| cap.get(2))
        .map(|m| html_escape::decode_html_entities(m.as_str()).to_string())?;

    match url::Url::parse(base_url).and_then(|base| base.join(&href)) {
        Ok(resolved) => Some(resolved.to_string()),
        Err(_) => Some(href),
    }
}
