pub mod discovery;
pub mod http_fetcher;
pub mod parallel;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

use crate::app::Result;

pub use discovery::find_feed_link;
pub use http_fetcher::HttpFetcher;
pub use parallel::{
    CrawlFailure, CrawlOutcome, CrawlReport, CrawlTarget, Crawler, DEFAULT_WORKERS,
};

#[derive(Debug)]
pub enum FetchResult {
    /// New content fetched successfully
    Content {
        body: Vec<u8>,
        etag: Option<String>,
        last_modified: Option<String>,
        /// Location after redirects
        final_url: String,
    },
    /// Content not modified (HTTP 304)
    NotModified,
}

#[async_trait]
pub trait Fetcher {
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<FetchResult>;
}
