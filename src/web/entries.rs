//! Entry handlers: paginated feed and category listings, entry detail,
//! read/starred flags, mark-all-read and crawl requests.

use axum::extract::Request;
use axum::http::header::{IF_MODIFIED_SINCE, LAST_MODIFIED};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::app::TributaryError;
use crate::cursor::{
    next_page, CursorKind, EntryFilter, EntryView, FeedCursor, MergeCursor, Page, PageBoundary,
    PageRequest, SuspendedCursor,
};
use crate::domain::{format_timestamp, parse_timestamp, CategoryPath, Subscription};
use crate::fetcher::CrawlFailure;
use crate::store::Store;
use crate::web::feeds::category_title;
use crate::web::urls;
use crate::web::{query, ApiError, ApiResult, AppState};

#[derive(Debug, Default, Deserialize)]
struct EntriesQuery {
    url_token: Option<String>,
    entry_after: Option<String>,
    read: Option<String>,
    starred: Option<String>,
}

impl EntriesQuery {
    fn filter(&self) -> EntryFilter {
        EntryFilter::from_params(self.read.as_deref(), self.starred.as_deref())
    }

    fn page_request(&self, page_size: usize) -> PageRequest<'_> {
        PageRequest {
            token: self.url_token.as_deref(),
            entry_after: self.entry_after.as_deref().filter(|s| !s.is_empty()),
            filter: self.filter(),
            page_size,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReadAllQuery {
    last_updated: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntryFeed {
    pub title: String,
    pub permalink: Option<String>,
    pub entries_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntrySummary {
    pub title: String,
    pub entry_id: String,
    pub permalink: String,
    pub updated: String,
    pub read: bool,
    pub starred: bool,
    pub entry_url: String,
    pub feed: EntryFeed,
}

impl From<EntryView> for EntrySummary {
    fn from(view: EntryView) -> Self {
        let category = &view.feed.category;
        Self {
            entry_url: urls::entry_url(category, &view.feed.feed_id, &view.entry_id),
            feed: EntryFeed {
                entries_url: urls::feed_entries_url(category, &view.feed.feed_id),
                title: view.feed.title,
                permalink: view.feed.permalink,
            },
            title: view.title,
            entry_id: view.entry_id,
            permalink: view.permalink,
            updated: view.updated,
            read: view.read,
            starred: view.starred,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntryPage {
    pub title: String,
    pub entries: Vec<EntrySummary>,
    pub next_url: Option<String>,
    pub read_url: String,
}

impl EntryPage {
    fn new(title: String, page: Page, base: &str, filter: &EntryFilter, read_url: String) -> Self {
        Self {
            title,
            next_url: page
                .next
                .map(|next| urls::next_url(base, &next.token, &next.entry_after, filter)),
            entries: page.entries.into_iter().map(EntrySummary::from).collect(),
            read_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntryDetail {
    pub title: String,
    pub entry_id: String,
    pub content: Option<String>,
    pub updated: String,
    pub permalink: String,
    pub read: bool,
    pub starred: bool,
    pub read_url: String,
    pub unread_url: String,
    pub star_url: String,
    pub unstar_url: String,
    pub feed: EntryFeed,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CrawlAccepted {
    pub queued: usize,
    pub failed: Vec<CrawlFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagUpdate {
    Read(bool),
    Starred(bool),
}

/// HTTP dates carry whole seconds only.
fn not_modified_since(headers: &HeaderMap, revised_at: &DateTime<Utc>) -> bool {
    headers
        .get(IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
        .is_some_and(|since| since.with_timezone(&Utc) >= revised_at.trunc_subsecs(0))
}

fn http_date(at: &DateTime<Utc>) -> Option<HeaderValue> {
    HeaderValue::from_str(&at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()).ok()
}

pub fn feed_entries(
    state: &AppState,
    category: &CategoryPath,
    feed_id: &str,
    request: &Request,
) -> ApiResult<Response> {
    let params: EntriesQuery = query(request)?;
    state.store.get_subscriptions()?.category(category)?;

    let feed = state
        .store
        .get_feed(feed_id)?
        .ok_or_else(|| TributaryError::FeedNotFound(feed_id.to_string()))?;

    if let Some(revised_at) = &feed.revised_at {
        if not_modified_since(request.headers(), revised_at) {
            debug!("Feed {} not modified", feed_id);
            return Ok(StatusCode::NOT_MODIFIED.into_response());
        }
    }

    let title = feed.display_title().to_string();
    let revised_at = feed.revised_at;
    let filter = params.filter();
    let page_request = params.page_request(state.reader.page_size);

    let page = next_page(&state.registry, &page_request, CursorKind::Feed, || {
        let mut cursor = FeedCursor::from_feed(feed, category, filter);
        cursor.resume_after(page_request.entry_after);
        Ok(SuspendedCursor::Feed(cursor))
    })?;

    let base = urls::feed_entries_url(category, feed_id);
    let last_updated = format_timestamp(&revised_at.unwrap_or_else(Utc::now));
    let read_url = urls::read_all_url(&base, &last_updated);
    let body = EntryPage::new(title, page, &base, &filter, read_url);

    let mut response = Json(body).into_response();
    if let Some(value) = revised_at.as_ref().and_then(http_date) {
        response.headers_mut().insert(LAST_MODIFIED, value);
    }
    Ok(response)
}

pub fn category_entries(state: &AppState, category: &CategoryPath, request: &Request) -> ApiResult<Response> {
    let params: EntriesQuery = query(request)?;
    let subscriptions: Vec<Subscription> = state
        .store
        .get_subscriptions()?
        .category(category)?
        .recursive_subscriptions()
        .into_iter()
        .cloned()
        .collect();

    let filter = params.filter();
    let page_request = params.page_request(state.reader.page_size);

    let page = next_page(&state.registry, &page_request, CursorKind::Category, || {
        let boundary = page_request.entry_after.and_then(PageBoundary::decode);
        let mut cursors = Vec::with_capacity(subscriptions.len());
        for subscription in &subscriptions {
            // Subscribed but never crawled
            let Some(feed) = state.store.get_feed(&subscription.feed_id)? else {
                continue;
            };
            cursors.push(FeedCursor::from_feed(feed, category, filter));
        }
        Ok(SuspendedCursor::Category(MergeCursor::new(cursors, boundary.as_ref())))
    })?;

    let base = urls::entries_url(category);
    let read_url = urls::read_all_url(&base, &format_timestamp(&Utc::now()));
    let body = EntryPage::new(category_title(state, category), page, &base, &filter, read_url);

    Ok(Json(body).into_response())
}

pub fn entry_detail(
    state: &AppState,
    category: &CategoryPath,
    feed_id: &str,
    entry_id: &str,
) -> ApiResult<Response> {
    state.store.get_subscriptions()?.category(category)?;

    let feed = state
        .store
        .get_feed(feed_id)?
        .ok_or_else(|| TributaryError::FeedNotFound(feed_id.to_string()))?;
    let entry = feed
        .entry(entry_id)
        .ok_or_else(|| TributaryError::EntryNotFound(entry_id.to_string()))?;

    let action = |name: &str| urls::entry_action_url(category, feed_id, entry_id, name);
    let detail = EntryDetail {
        title: entry.title.clone(),
        entry_id: entry.hash.clone(),
        content: entry.display_content().map(str::to_string),
        updated: entry.updated_rfc3339(),
        permalink: entry.permalink_or_id().to_string(),
        read: entry.read,
        starred: entry.starred,
        read_url: action("read"),
        unread_url: action("unread"),
        star_url: action("star"),
        unstar_url: action("unstar"),
        feed: EntryFeed {
            title: feed.display_title().to_string(),
            permalink: feed.permalink.clone(),
            entries_url: urls::feed_entries_url(category, feed_id),
        },
    };

    Ok(Json(detail).into_response())
}

pub fn set_flag(
    state: &AppState,
    category: &CategoryPath,
    feed_id: &str,
    entry_id: &str,
    update: FlagUpdate,
) -> ApiResult<Response> {
    state.store.get_subscriptions()?.category(category)?;

    match update {
        FlagUpdate::Read(read) => state.store.set_read(feed_id, entry_id, read)?,
        FlagUpdate::Starred(starred) => state.store.set_starred(feed_id, entry_id, starred)?,
    }

    Ok(Json(json!({})).into_response())
}

/// Mark entries updated at or before `last_updated` as read; an absent or
/// unparsable `last_updated` marks everything.
pub fn read_all(
    state: &AppState,
    category: &CategoryPath,
    feed_id: Option<&str>,
    request: &Request,
) -> ApiResult<Response> {
    let ReadAllQuery { last_updated } = query(request)?;
    let up_to = last_updated.as_deref().and_then(parse_timestamp);
    let list = state.store.get_subscriptions()?;
    let scope = list.category(category)?;

    let marked = match feed_id {
        Some(feed_id) => state.store.mark_all_read(feed_id, up_to)?,
        None => {
            let mut marked = 0;
            for subscription in scope.recursive_subscriptions() {
                match state.store.mark_all_read(&subscription.feed_id, up_to) {
                    Ok(count) => marked += count,
                    Err(TributaryError::FeedNotFound(_)) => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            marked
        }
    };

    Ok(Json(json!({ "marked": marked })).into_response())
}

/// Queue a crawl of the category, or of one feed in it, on the worker.
pub async fn crawl(state: &AppState, category: &CategoryPath, feed_id: Option<&str>) -> ApiResult<Response> {
    let worker = state
        .worker
        .as_ref()
        .ok_or(ApiError::App(TributaryError::WorkerNotRunning))?;

    let feed_ids: Vec<String> = {
        let list = state.store.get_subscriptions()?;
        let in_scope = list.category(category)?.recursive_subscriptions();
        match feed_id {
            Some(id) if !in_scope.iter().any(|s| s.feed_id == id) => {
                return Err(TributaryError::FeedNotInCategory(id.to_string()).into())
            }
            Some(id) => vec![id.to_string()],
            None => in_scope.into_iter().map(|s| s.feed_id.clone()).collect(),
        }
    };

    worker
        .enqueue(category.clone(), feed_id.map(str::to_string))
        .await?;

    let body = CrawlAccepted {
        queued: feed_ids.len(),
        failed: worker.failures_for(feed_ids.iter().map(String::as_str)),
    };
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}
