use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::TributaryError;

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponseBody {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ErrorResponseBody {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    App(#[from] TributaryError),

    #[error("{0}")]
    BadRequest(String),

    #[error("No resource at {0}")]
    NotFound(String),

    #[error("Method {0} is not allowed here")]
    MethodNotAllowed(String),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn as_status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::App(e) => match e {
                TributaryError::FeedNotFound(_) => (StatusCode::NOT_FOUND, "feed-not-found"),
                TributaryError::EntryNotFound(_) => (StatusCode::NOT_FOUND, "entry-not-found"),
                TributaryError::InvalidCategoryPath(_) => {
                    (StatusCode::NOT_FOUND, "category-id-invalid")
                }
                TributaryError::InvalidCategoryTitle(_) => {
                    (StatusCode::BAD_REQUEST, "category-title-invalid")
                }
                TributaryError::CategoryCircularReference(_) => {
                    (StatusCode::BAD_REQUEST, "circular-reference")
                }
                TributaryError::FeedNotInCategory(_) => {
                    (StatusCode::BAD_REQUEST, "feed-not-found-in-path")
                }
                TributaryError::UnreachableUrl(_) => (StatusCode::BAD_REQUEST, "unreachable-url"),
                TributaryError::FeedUrlNotFound(_) => {
                    (StatusCode::BAD_REQUEST, "unreachable-feed-url")
                }
                TributaryError::WorkerNotRunning => (StatusCode::CONFLICT, "worker-not-running"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal-error"),
            },
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad-request"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not-found"),
            ApiError::MethodNotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "method-not-allowed"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, kind) = self.as_status_and_kind();
        let message = if code == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorResponseBody {
            error: kind.to_string(),
            message,
        };
        (code, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_kinds() {
        let cases = [
            (TributaryError::FeedNotFound("f".into()), StatusCode::NOT_FOUND, "feed-not-found"),
            (TributaryError::EntryNotFound("e".into()), StatusCode::NOT_FOUND, "entry-not-found"),
            (
                TributaryError::InvalidCategoryPath("-x".into()),
                StatusCode::NOT_FOUND,
                "category-id-invalid",
            ),
            (
                TributaryError::CategoryCircularReference("-a".into()),
                StatusCode::BAD_REQUEST,
                "circular-reference",
            ),
            (TributaryError::WorkerNotRunning, StatusCode::CONFLICT, "worker-not-running"),
            (
                TributaryError::Lock("poisoned".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal-error",
            ),
        ];
        for (error, status, kind) in cases {
            assert_eq!(ApiError::from(error).as_status_and_kind(), (status, kind));
        }
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let response = ApiError::from(TributaryError::Other("secret".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
