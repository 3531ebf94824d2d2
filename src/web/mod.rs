//! JSON REST API.
//!
//! All paths may carry a category prefix, so a single fallback handler
//! parses the path into a [`route::Target`] and dispatches on method and
//! resource.

pub mod entries;
pub mod error;
pub mod feeds;
pub mod route;
pub mod urls;


use std::sync::Arc;

use axum::extract::{FromRequest, Query, Request, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::{Form, Router};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::app::{AppContext, Result};
use crate::config::ReaderConfig;
use crate::cursor::CursorRegistry;
use crate::fetcher::Crawler;
use crate::store::SqliteStore;
use crate::worker::CrawlWorkerHandle;

pub use error::{ApiError, ApiResult, ErrorResponseBody};
use route::{EntryFlag, Resource, Target};

/// Application state available to all handlers
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub crawler: Crawler,
    pub registry: CursorRegistry,
    /// `None` when the server runs without a crawl worker.
    pub worker: Option<CrawlWorkerHandle>,
    pub reader: ReaderConfig,
}

impl AppState {
    pub fn new(ctx: &AppContext, worker: Option<CrawlWorkerHandle>) -> Self {
        Self {
            store: ctx.store.clone(),
            crawler: ctx.crawler.clone(),
            registry: CursorRegistry::new(ctx.config.cursors.capacity, ctx.config.cursors.ttl()),
            worker,
            reader: ctx.config.reader.clone(),
        }
    }
}

pub fn make_router(state: Arc<AppState>) -> Router {
    Router::new().fallback(dispatch).with_state(state)
}

/// Serve the API on `addr` until Ctrl-C.
pub async fn serve(state: Arc<AppState>, addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, make_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    Ok(())
}

async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let path = request.uri().path().to_string();
    let method = request.method().clone();
    debug!("{} {}", method, path);

    let Some(Target { category, resource }) = Target::parse(&path) else {
        return ApiError::NotFound(path).into_response();
    };

    let result = match (&method, resource) {
        (&Method::GET, Resource::Category) => feeds::index(&state, &category),
        (&Method::POST, Resource::Category) => feeds::add_category(&state, &category, request).await,
        (&Method::DELETE, Resource::Category) => feeds::delete_category(&state, &category),

        (&Method::GET, Resource::Feeds) => feeds::list(&state, &category),
        (&Method::POST, Resource::Feeds) => feeds::add_feed(&state, &category, request).await,
        (&Method::PUT, Resource::Feeds) => feeds::move_outline(&state, &category, &request),
        (&Method::DELETE, Resource::Feed { feed_id }) => {
            feeds::delete_feed(&state, &category, &feed_id)
        }

        (&Method::GET, Resource::FeedEntries { feed_id }) => {
            entries::feed_entries(&state, &category, &feed_id, &request)
        }
        (&Method::PUT, Resource::FeedEntries { feed_id }) => {
            entries::crawl(&state, &category, Some(&feed_id)).await
        }
        (&Method::PUT, Resource::FeedReadAll { feed_id }) => {
            entries::read_all(&state, &category, Some(&feed_id), &request)
        }
        (&Method::GET, Resource::Entry { feed_id, entry_id }) => {
            entries::entry_detail(&state, &category, &feed_id, &entry_id)
        }
        (
            &Method::PUT | &Method::DELETE,
            Resource::EntryFlag {
                feed_id,
                entry_id,
                flag,
            },
        ) => match flag_update(&method, flag) {
            Some(update) => entries::set_flag(&state, &category, &feed_id, &entry_id, update),
            None => Err(ApiError::MethodNotAllowed(method.to_string())),
        },

        (&Method::GET, Resource::Entries) => entries::category_entries(&state, &category, &request),
        (&Method::PUT, Resource::Entries) => entries::crawl(&state, &category, None).await,
        (&Method::PUT, Resource::ReadAll) => entries::read_all(&state, &category, None, &request),

        _ => Err(ApiError::MethodNotAllowed(method.to_string())),
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

/// Which flag a method on a flag resource sets, and to what. The `unread`
/// and `unstar` aliases only accept PUT.
fn flag_update(method: &Method, flag: EntryFlag) -> Option<entries::FlagUpdate> {
    use entries::FlagUpdate::{Read, Starred};
    match (method, flag) {
        (&Method::PUT, EntryFlag::Read) => Some(Read(true)),
        (&Method::DELETE, EntryFlag::Read) | (&Method::PUT, EntryFlag::Unread) => Some(Read(false)),
        (&Method::PUT, EntryFlag::Star) => Some(Starred(true)),
        (&Method::DELETE, EntryFlag::Star) | (&Method::PUT, EntryFlag::Unstar) => {
            Some(Starred(false))
        }
        _ => None,
    }
}

pub(crate) fn query<T: DeserializeOwned>(request: &Request) -> ApiResult<T> {
    Query::<T>::try_from_uri(request.uri())
        .map(|Query(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

pub(crate) async fn form<T: DeserializeOwned + Send>(request: Request) -> ApiResult<T> {
    Form::<T>::from_request(request, &())
        .await
        .map(|Form(value)| value)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}
