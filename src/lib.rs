//! # Tributary
//!
//! A self-hosted RSS/Atom feed reader served as a JSON REST API.
//!
//! ## Architecture
//!
//! ```text
//! Fetcher → Normalizer → Store → Cursors → Web
//!                          ↑
//!                    Crawl worker
//! ```
//!
//! Subscriptions live in a tree of nested categories. Entry listings for a
//! feed or a whole category are paginated through resumable cursors that are
//! suspended server-side between requests.
//!
//! ## Quick Start
//!
//! ```bash
//! # Subscribe to a feed (or a page that links to one)
//! tributary add https://blog.rust-lang.org/ -c -Rust
//!
//! # Crawl everything once
//! tributary crawl
//!
//! # Serve the API with the background crawler
//! tributary serve -p 5000
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store and
/// the crawler from the loaded configuration.
pub mod app;

/// Command-line interface using clap.
///
/// - `serve` - Run the HTTP API
/// - `crawl` - Crawl every subscription once
/// - `add <url>` - Subscribe to a feed
/// - `import <opml>` - Import an OPML outline
/// - `list` - Print the subscription tree
pub mod cli;

/// Configuration loaded from `~/.config/tributary/config.toml`.
pub mod config;

/// Resumable entry cursors, their k-way merge, and the token registry that
/// keeps them between requests.
pub mod cursor;

/// Core domain models.
///
/// - [`Feed`](domain::Feed): a crawled feed and its entries
/// - [`Entry`](domain::Entry): one entry with read/starred flags
/// - [`SubscriptionList`](domain::SubscriptionList): the category tree
pub mod domain;

/// HTTP fetching, feed autodiscovery and parallel crawling.
pub mod fetcher;

/// Feed parsing and normalization.
///
/// Converts RSS and Atom documents into [`Feed`](domain::Feed)s.
pub mod normalizer;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// The JSON REST API.
pub mod web;

/// Background crawl worker fed through a bounded job queue.
pub mod worker;
