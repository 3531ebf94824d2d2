use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{Result, TributaryError};
use crate::config::Config;
use crate::fetcher::{Crawler, Fetcher, HttpFetcher};
use crate::store::SqliteStore;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub crawler: Crawler,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match &config.database {
            Some(p) => p.clone(),
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::with_store(config, store)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store)
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::with_options(
            config.crawler.timeout(),
            &config.crawler.user_agent,
        )?);
        Ok(Self::with_fetcher(config, store, fetcher))
    }

    pub fn with_fetcher(
        config: Config,
        store: Arc<SqliteStore>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
    ) -> Self {
        let crawler = Crawler::with_workers(fetcher, config.crawler.workers);
        Self {
            config,
            store,
            crawler,
        }
    }

    pub fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| TributaryError::Config("Could not find data directory".into()))?;
        let tributary_dir = data_dir.join("tributary");
        std::fs::create_dir_all(&tributary_dir)?;
        Ok(tributary_dir.join("tributary.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn test_in_memory_context() {
        let mut config = Config::default();
        config.crawler.workers = 2;
        let ctx = AppContext::in_memory(config).unwrap();
        assert_eq!(ctx.crawler.workers(), 2);
        assert!(ctx.store.get_all_feeds().unwrap().is_empty());
    }

    #[test]
    fn test_context_uses_configured_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            database: Some(dir.path().join("feeds.db")),
            ..Config::default()
        };
        AppContext::new(config).unwrap();
        assert!(dir.path().join("feeds.db").exists());
    }
}
