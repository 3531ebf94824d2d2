use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::warn;

use crate::app::{AppContext, Result};
use crate::domain::{Category, CategoryPath, Feed, Subscription};
use crate::fetcher::{CrawlReport, CrawlTarget};
use crate::store::Store;
use crate::web::{self, AppState};
use crate::worker::spawn_crawl_worker;

/// Run the HTTP API, with the crawl worker unless disabled.
pub async fn serve(ctx: &AppContext) -> Result<()> {
    let worker = ctx
        .config
        .crawler
        .enabled
        .then(|| spawn_crawl_worker(ctx.store.clone(), ctx.crawler.clone()));
    let handle = worker.as_ref().map(|(handle, _)| handle.clone());
    if handle.is_none() {
        println!("Crawl worker disabled");
    }

    let state = Arc::new(AppState::new(ctx, handle));
    let result = web::serve(state, &ctx.config.server.bind_addr()).await;

    if let Some((handle, task)) = worker {
        handle.terminate();
        if let Err(e) = task.await {
            warn!("Crawl worker did not shut down cleanly: {}", e);
        }
    }

    result
}

pub async fn add_feed(ctx: &AppContext, url: &str, category: &str) -> Result<()> {
    let category = CategoryPath::parse(category)?;
    ctx.store.get_subscriptions()?.category(&category)?;

    let feed = ctx.crawler.discover(url).await?;
    let subscription = subscription_for(&feed);
    let (count, _) = ctx.store.subscribe_feed(&feed, |list| {
        Ok(list.category_mut(&category)?.subscribe(subscription))
    })?;

    println!("Added feed: {}", feed.url);
    println!("Feed title: {}", feed.display_title());
    println!("Fetched {} entries into {}", count, category_name(&category));
    Ok(())
}

pub async fn crawl(ctx: &AppContext) -> Result<()> {
    let list = ctx.store.get_subscriptions()?;
    let urls: Vec<&str> = list
        .root
        .recursive_subscriptions()
        .into_iter()
        .map(|s| s.feed_uri.as_str())
        .collect();

    if urls.is_empty() {
        println!("No feeds to crawl");
        return Ok(());
    }

    println!("Crawling {} feeds...", urls.len());
    let report = crawl_urls(ctx, &urls).await?;
    print_report(&report);
    Ok(())
}

pub fn list(ctx: &AppContext) -> Result<()> {
    let list = ctx.store.get_subscriptions()?;

    if list.root.recursive_subscriptions().is_empty() && list.root.categories().next().is_none() {
        println!("No subscriptions");
        return Ok(());
    }

    print_category(ctx, &list.root, 0)
}

fn print_category(ctx: &AppContext, category: &Category, depth: usize) -> Result<()> {
    let indent = "  ".repeat(depth);
    for subscription in category.subscriptions() {
        let unread = ctx.store.get_unread_count(&subscription.feed_id)?;
        println!(
            "{}{} ({} unread)\n{}  {}",
            indent, subscription.title, unread, indent, subscription.feed_uri
        );
    }
    for child in category.categories() {
        println!("{}[{}]", indent, child.label);
        print_category(ctx, child, depth + 1)?;
    }
    Ok(())
}

/// Import subscriptions from an OPML file, keeping its category nesting, then
/// crawl the imported feeds.
pub async fn import_opml(ctx: &AppContext, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let outlines = parse_opml(&content);

    if outlines.is_empty() {
        println!("No feeds found in OPML file");
        return Ok(());
    }

    println!("Found {} feeds in OPML file", outlines.len());

    let subscriptions: Vec<(CategoryPath, Subscription)> = outlines
        .into_iter()
        .map(|outline| {
            let subscription = Subscription {
                feed_id: Feed::id_for_url(&outline.url),
                feed_uri: outline.url,
                title: outline.title,
            };
            (outline.category, subscription)
        })
        .collect();
    let added = subscribe_all(ctx, &subscriptions)?;
    let skipped = subscriptions.len() - added;

    let urls: Vec<&str> = subscriptions
        .iter()
        .map(|(_, s)| s.feed_uri.as_str())
        .collect();
    let report = crawl_urls(ctx, &urls).await?;
    for failure in &report.failed {
        eprintln!("  ! {} - {}", failure.url, failure.message);
    }

    println!(
        "\nImport complete: {} added, {} skipped (already subscribed), {} errors",
        added,
        skipped,
        report.failed.len()
    );

    Ok(())
}

async fn crawl_urls(ctx: &AppContext, urls: &[&str]) -> Result<CrawlReport> {
    let targets = urls
        .iter()
        .map(|url| CrawlTarget::with_hints(ctx.store.as_ref(), url))
        .collect::<Result<Vec<_>>>()?;
    Ok(ctx.crawler.crawl_into(ctx.store.as_ref(), targets).await)
}

fn print_report(report: &CrawlReport) {
    for failure in &report.failed {
        eprintln!("  Error crawling {}: {}", failure.url, failure.message);
    }
    println!(
        "Crawl complete: {} new entries, {} errors",
        report.new_entries,
        report.failed.len()
    );
}

fn subscription_for(feed: &Feed) -> Subscription {
    Subscription {
        feed_id: feed.id.clone(),
        feed_uri: feed.url.clone(),
        title: feed.display_title().to_string(),
    }
}

/// Subscribe each feed in its category, creating missing categories.
/// Returns how many subscriptions were new.
fn subscribe_all(ctx: &AppContext, subscriptions: &[(CategoryPath, Subscription)]) -> Result<usize> {
    ctx.store.update_subscriptions(|list| {
        let mut added = 0;
        for (category, subscription) in subscriptions {
            let mut parent = &mut list.root;
            for label in category.labels() {
                parent = parent.add_category(label)?;
            }
            if parent.subscribe(subscription.clone()) {
                added += 1;
            }
        }
        Ok(added)
    })
}

fn category_name(category: &CategoryPath) -> String {
    if category.is_root() {
        "the root category".to_string()
    } else {
        category.to_id()
    }
}

#[derive(Debug, PartialEq)]
struct OpmlFeed {
    category: CategoryPath,
    title: String,
    url: String,
}

static OUTLINE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<outline\b(.*?)(/?)>|</outline\s*>").expect("valid outline pattern")
});

/// Parse OPML content into feeds, each with the category path of its
/// enclosing outlines.
fn parse_opml(content: &str) -> Vec<OpmlFeed> {
    let mut feeds = Vec::new();
    // One slot per open outline; `Some` for categories
    let mut open: Vec<Option<String>> = Vec::new();

    for tag in OUTLINE_TAG.captures_iter(content) {
        let Some(attrs) = tag.get(1) else {
            open.pop();
            continue;
        };
        let attrs = attrs.as_str();
        let self_closing = tag.get(2).is_some_and(|m| !m.as_str().is_empty());
        let title = extract_attr(attrs, "title").or_else(|| extract_attr(attrs, "text"));

        match extract_attr(attrs, "xmlUrl") {
            Some(url) => {
                let category = open
                    .iter()
                    .flatten()
                    .fold(CategoryPath::root(), |path, label| path.child(label));
                feeds.push(OpmlFeed {
                    category,
                    title: title.unwrap_or_else(|| url.clone()),
                    url,
                });
                if !self_closing {
                    open.push(None);
                }
            }
            None if !self_closing => {
                // Labels cannot contain the path separator
                open.push(title.map(|t| t.trim().replace('/', "-")).filter(|t| !t.is_empty()));
            }
            None => {}
        }
    }

    feeds
}

/// Extract an attribute value from an XML element string
fn extract_attr(attrs: &str, attr: &str) -> Option<String> {
    let pattern = format!(" {}=\"", attr);
    let padded = format!(" {}", attrs.replace(['\n', '\t', '\r'], " "));
    let start = padded.find(&pattern)? + pattern.len();
    let rest = &padded[start..];
    let end = rest.find('"')?;
    Some(html_escape::decode_html_entities(&rest[..end]).to_string())
}
