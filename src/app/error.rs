use thiserror::Error;

#[derive(Error, Debug)]
pub enum TributaryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Invalid category path: {0}")]
    InvalidCategoryPath(String),

    #[error("Invalid category title: {0}")]
    InvalidCategoryTitle(String),

    #[error("Circular reference: {0}")]
    CategoryCircularReference(String),

    #[error("Feed {0} is not subscribed in this category")]
    FeedNotInCategory(String),

    #[error("Cannot connect to {0}")]
    UnreachableUrl(String),

    #[error("Cannot find a feed at {0}")]
    FeedUrlNotFound(String),

    #[error("The background crawl worker is not running")]
    WorkerNotRunning,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TributaryError>;
