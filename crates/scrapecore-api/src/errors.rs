//! `ApiError`: maps every handler failure onto the envelope spec.md §6
//! defines for error responses, `{success:false, error:{message, code,
//! status, details?}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scrapecore_types::ScrapeError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("a scraping run is already in progress")]
    Conflict,

    #[error("rate limit exceeded")]
    TooManyRequests,

    #[error(transparent)]
    Upstream(#[from] ScrapeError),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(err) => match err {
                ScrapeError::NotFound(_) => StatusCode::NOT_FOUND,
                ScrapeError::AlreadyRunning => StatusCode::CONFLICT,
                ScrapeError::Config(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "not_found",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Conflict => "already_running",
            ApiError::TooManyRequests => "rate_limited",
            ApiError::Upstream(err) => err.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else {
            warn!(error = %self, "request rejected");
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "message": self.to_string(),
                "code": self.code(),
                "status": status.as_u16(),
            }
        }));
        (status, body).into_response()
    }
}
