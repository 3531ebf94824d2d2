//! Subscription tree handlers: listing, adding and removing categories and
//! feeds, and moving outlines between categories.

use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::app::TributaryError;
use crate::domain::{Category, CategoryPath, OutlineRef, Subscription, SubscriptionList};
use crate::store::Store;
use crate::web::urls;
use crate::web::{form, query, ApiError, ApiResult, AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedOutline {
    pub title: String,
    pub entries_url: String,
    pub remove_feed_url: String,
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryOutline {
    pub title: String,
    pub feeds_url: String,
    pub entries_url: String,
    pub add_feed_url: String,
    pub add_category_url: String,
    pub remove_category_url: String,
    pub move_url: String,
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Listing {
    pub feeds: Vec<FeedOutline>,
    pub categories: Vec<CategoryOutline>,
}

impl Listing {
    fn new(category: &Category, path: &CategoryPath) -> Self {
        let feeds = category
            .subscriptions()
            .map(|s| FeedOutline {
                title: s.title.clone(),
                entries_url: urls::feed_entries_url(path, &s.feed_id),
                remove_feed_url: urls::feed_url(path, &s.feed_id),
                path: urls::subscription_path(path, &s.feed_id),
            })
            .collect();

        let categories = category
            .categories()
            .map(|c| {
                let child = path.child(&c.label);
                CategoryOutline {
                    title: c.label.clone(),
                    feeds_url: urls::feeds_url(&child),
                    entries_url: urls::entries_url(&child),
                    add_feed_url: urls::feeds_url(&child),
                    add_category_url: urls::category_url(&child),
                    remove_category_url: urls::category_url(&child),
                    move_url: urls::feeds_url(&child),
                    path: child.to_id(),
                }
            })
            .collect();

        Self { feeds, categories }
    }
}

#[derive(Debug, Serialize)]
struct CategoryIndex {
    title: String,
    path: String,
    feeds_url: String,
    entries_url: String,
}

#[derive(Debug, Deserialize)]
struct AddFeedForm {
    url: String,
}

#[derive(Debug, Deserialize)]
struct AddCategoryForm {
    title: String,
}

#[derive(Debug, Deserialize)]
struct MoveQuery {
    from: Option<String>,
}

pub(crate) fn category_title(state: &AppState, category: &CategoryPath) -> String {
    category
        .last_label()
        .map(str::to_string)
        .unwrap_or_else(|| state.reader.all_feeds_title.clone())
}

fn listing(list: &SubscriptionList, category: &CategoryPath) -> ApiResult<Response> {
    Ok(Json(Listing::new(list.category(category)?, category)).into_response())
}

pub fn index(state: &AppState, category: &CategoryPath) -> ApiResult<Response> {
    state.store.get_subscriptions()?.category(category)?;
    Ok(Json(CategoryIndex {
        title: category_title(state, category),
        path: category.to_id(),
        feeds_url: urls::feeds_url(category),
        entries_url: urls::entries_url(category),
    })
    .into_response())
}

pub fn list(state: &AppState, category: &CategoryPath) -> ApiResult<Response> {
    listing(&state.store.get_subscriptions()?, category)
}

pub async fn add_feed(state: &AppState, category: &CategoryPath, request: Request) -> ApiResult<Response> {
    let AddFeedForm { url } = form(request).await?;
    state.store.get_subscriptions()?.category(category)?;

    let feed = state.crawler.discover(url.trim()).await?;
    let subscription = Subscription {
        feed_id: feed.id.clone(),
        feed_uri: feed.url.clone(),
        title: feed.display_title().to_string(),
    };
    let (added, list) = state.store.subscribe_feed(&feed, |list| {
        list.category_mut(category)?.subscribe(subscription);
        Ok(list.clone())
    })?;
    info!("Subscribed to {} ({} entries)", feed.url, added);

    listing(&list, category)
}

pub async fn add_category(
    state: &AppState,
    category: &CategoryPath,
    request: Request,
) -> ApiResult<Response> {
    let AddCategoryForm { title } = form(request).await?;

    let list = state.store.update_subscriptions(|list| {
        list.category_mut(category)?.add_category(&title)?;
        Ok(list.clone())
    })?;

    listing(&list, category)
}

pub fn delete_category(state: &AppState, category: &CategoryPath) -> ApiResult<Response> {
    let parent = category
        .parent()
        .ok_or_else(|| ApiError::BadRequest("The root category cannot be removed".into()))?;

    let list = state.store.update_subscriptions(|list| {
        list.remove_category(category)?;
        Ok(list.clone())
    })?;

    listing(&list, &parent)
}

pub fn delete_feed(state: &AppState, category: &CategoryPath, feed_id: &str) -> ApiResult<Response> {
    let list = state.store.update_subscriptions(|list| {
        list.category_mut(category)?
            .unsubscribe(feed_id)
            .ok_or_else(|| TributaryError::FeedNotInCategory(feed_id.to_string()))?;
        Ok(list.clone())
    })?;

    listing(&list, category)
}

pub fn move_outline(state: &AppState, category: &CategoryPath, request: &Request) -> ApiResult<Response> {
    let MoveQuery { from } = query(request)?;
    let from = from.ok_or_else(|| ApiError::BadRequest("Missing 'from' parameter".into()))?;
    let source = OutlineRef::parse(&from)?;

    let list = state.store.update_subscriptions(|list| {
        list.move_outline(&source, category)?;
        Ok(list.clone())
    })?;

    listing(&list, category)
}
