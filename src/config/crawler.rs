use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fetcher::http_fetcher::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::fetcher::DEFAULT_WORKERS;

/// Configuration for the background crawl worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Start the crawl worker together with the server (default: true)
    pub enabled: bool,

    /// Concurrent feed requests per crawl (default: 4)
    pub workers: usize,

    /// Request timeout in seconds (default: 10)
    pub timeout_secs: u64,

    /// User agent string to use
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            workers: DEFAULT_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
