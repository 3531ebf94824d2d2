use std::sync::Arc;

use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::app::Result;
use crate::domain::Feed;
use crate::fetcher::{FetchResult, Fetcher};
use crate::normalizer::Normalizer;
use crate::store::Store;

pub const DEFAULT_WORKERS: usize = 4;

/// One URL to crawl, with the conditional-request hints from the last
/// successful crawl.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlTarget {
    pub feed_id: String,
    pub url: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl CrawlTarget {
    pub fn new(url: &str) -> Self {
        Self {
            feed_id: Feed::id_for_url(url),
            url: url.to_string(),
            etag: None,
            last_modified: None,
        }
    }

    /// Target for `url`, carrying the stored feed's hints when there is one.
    pub fn with_hints<S: Store>(store: &S, url: &str) -> Result<Self> {
        let mut target = Self::new(url);
        if let Some(stored) = store.get_feed_meta(&target.feed_id)? {
            target.etag = stored.etag;
            target.last_modified = stored.last_modified;
        }
        Ok(target)
    }
}

#[derive(Debug)]
pub enum CrawlOutcome {
    Fetched(Feed),
    NotModified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlFailure {
    pub feed_id: String,
    pub url: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct CrawlReport {
    pub new_entries: usize,
    pub succeeded: Vec<String>,
    pub failed: Vec<CrawlFailure>,
}

#[derive(Clone)]
pub struct Crawler {
    pub(crate) fetcher: Arc<dyn Fetcher + Send + Sync>,
    pub(crate) normalizer: Normalizer,
    workers: usize,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        Self::with_workers(fetcher, DEFAULT_WORKERS)
    }

    pub fn with_workers(fetcher: Arc<dyn Fetcher + Send + Sync>, workers: usize) -> Self {
        Self {
            fetcher,
            normalizer: Normalizer::new(),
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetch and parse every target with at most `workers` requests in
    /// flight, yielding results in completion order. A failing target does
    /// not affect the others.
    pub fn crawl(
        &self,
        targets: Vec<CrawlTarget>,
    ) -> impl Stream<Item = (CrawlTarget, Result<CrawlOutcome>)> + Send + 'static {
        let fetcher = self.fetcher.clone();
        let normalizer = self.normalizer.clone();

        stream::iter(targets)
            .map(move |target| {
                let fetcher = fetcher.clone();
                let normalizer = normalizer.clone();
                async move {
                    let result = crawl_single_feed(&fetcher, &normalizer, &target).await;
                    (target, result)
                }
            })
            .buffer_unordered(self.workers)
    }

    /// Crawl `targets` and merge each result into `store` as soon as it
    /// arrives.
    pub async fn crawl_into<S: Store>(&self, store: &S, targets: Vec<CrawlTarget>) -> CrawlReport {
        let mut report = CrawlReport::default();
        let mut results = std::pin::pin!(self.crawl(targets));

        while let Some((target, result)) = results.next().await {
            let stored = result.and_then(|outcome| match outcome {
                CrawlOutcome::NotModified => {
                    tracing::debug!("Feed {} not modified", target.url);
                    Ok(0)
                }
                CrawlOutcome::Fetched(feed) => store.put_feed(&feed),
            });

            match stored {
                Ok(count) => {
                    tracing::info!("Added {} new entries from {}", count, target.url);
                    report.new_entries += count;
                    report.succeeded.push(target.feed_id);
                }
                Err(e) => {
                    tracing::warn!("Failed to crawl {}: {}", target.url, e);
                    report.failed.push(CrawlFailure {
                        feed_id: target.feed_id,
                        url: target.url,
                        message: e.to_string(),
                    });
                }
            }
        }

        report
    }
}

async fn crawl_single_feed(
    fetcher: &Arc<dyn Fetcher + Send + Sync>,
    normalizer: &Normalizer,
    target: &CrawlTarget,
) -> Result<CrawlOutcome> {
    let result = fetcher
        .fetch(
            &target.url,
            target.etag.as_deref(),
            target.last_modified.as_deref(),
        )
        .await?;

    match result {
        FetchResult::NotModified => Ok(CrawlOutcome::NotModified),
        FetchResult::Content {
            body,
            etag,
            last_modified,
            ..
        } => {
            let mut feed = normalizer.normalize(&target.url, &body)?;
            feed.etag = etag;
            feed.last_modified = last_modified;
            Ok(CrawlOutcome::Fetched(feed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::testing::{StaticFetcher, ATOM_FEED};
    use crate::store::SqliteStore;

    fn crawler(fetcher: StaticFetcher) -> Crawler {
        Crawler::with_workers(Arc::new(fetcher), 2)
    }

    #[tokio::test]
    async fn test_crawl_yields_every_target() {
        let fetcher = StaticFetcher::new()
            .with_page("https://a.example/feed", ATOM_FEED)
            .with_page("https://b.example/feed", ATOM_FEED);
        let targets = vec![
            CrawlTarget::new("https://a.example/feed"),
            CrawlTarget::new("https://b.example/feed"),
            CrawlTarget::new("https://missing.example/feed"),
        ];

        let results: Vec<_> = crawler(fetcher).crawl(targets).collect().await;
        assert_eq!(results.len(), 3);
        let failures: Vec<_> = results
            .iter()
            .filter(|(_, r)| r.is_err())
            .map(|(t, _)| t.url.as_str())
            .collect();
        assert_eq!(failures, ["https://missing.example/feed"]);
    }

    #[tokio::test]
    async fn test_crawl_sends_hints_and_reports_not_modified() {
        let fetcher = StaticFetcher::new().with_not_modified("https://a.example/feed", "\"v1\"");
        let mut target = CrawlTarget::new("https://a.example/feed");
        target.etag = Some("\"v1\"".into());

        let results: Vec<_> = crawler(fetcher).crawl(vec![target]).collect().await;
        assert!(matches!(results[0].1, Ok(CrawlOutcome::NotModified)));
    }

    #[tokio::test]
    async fn test_crawl_into_stores_feeds_and_collects_failures() {
        let store = SqliteStore::in_memory().unwrap();
        let fetcher = StaticFetcher::new()
            .with_page("https://a.example/feed", ATOM_FEED)
            .with_page("https://broken.example/feed", "<html>not a feed</html>");
        let targets = vec![
            CrawlTarget::new("https://a.example/feed"),
            CrawlTarget::new("https://broken.example/feed"),
        ];

        let report = crawler(fetcher).crawl_into(&store, targets).await;
        assert_eq!(report.new_entries, 2);
        assert_eq!(report.succeeded, [Feed::id_for_url("https://a.example/feed")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].url, "https://broken.example/feed");

        let stored = store
            .get_feed(&Feed::id_for_url("https://a.example/feed"))
            .unwrap()
            .unwrap();
        assert_eq!(stored.entries.len(), 2);
        assert_eq!(stored.etag, Some("\"atom\"".into()));
    }

    #[test]
    fn test_target_with_hints_reads_store() {
        let store = SqliteStore::in_memory().unwrap();
        let mut feed = Feed::new("https://a.example/feed", "A");
        feed.etag = Some("\"v2\"".into());
        feed.last_modified = Some("Mon, 01 Jan 2024 00:00:00 GMT".into());
        store.put_feed(&feed).unwrap();

        let target = CrawlTarget::with_hints(&store, "https://a.example/feed").unwrap();
        assert_eq!(target.etag, Some("\"v2\"".into()));
        assert_eq!(target.last_modified, feed.last_modified);

        let fresh = CrawlTarget::with_hints(&store, "https://new.example/feed").unwrap();
        assert!(fresh.etag.is_none());
    }
}
