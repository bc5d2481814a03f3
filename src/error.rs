//! Classified errors surfaced by handlers and middlewares.
//!
//! Inner components return these instead of building responses themselves.
//! The context middleware is the single place that turns them into HTTP
//! responses, so formatting and logging stay uniform.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::cache::CacheError;
use crate::context::ContextError;
use crate::store::StoreError;

/// Message key sent with 429 responses unless overridden.
pub const RATE_LIMIT_MESSAGE_KEY: &str = "app.errors.too-many-requests";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("origin not allowed")]
    Forbidden,

    #[error("too many requests")]
    TooManyRequests { message_key: String },

    #[error("authentication required")]
    Unauthenticated,

    #[error("infrastructure error: {0}")]
    Infrastructure(String),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn too_many_requests() -> Self {
        ApiError::TooManyRequests {
            message_key: RATE_LIMIT_MESSAGE_KEY.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Context(ContextError::Unauthenticated) => StatusCode::UNAUTHORIZED,
            ApiError::Context(ContextError::NoActiveContext) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Infrastructure(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Cache(_) | ApiError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Whether the fault lies with the server rather than the client.
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }

    /// Client-facing message. Server-side details are never exposed.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::TooManyRequests { message_key } => message_key.clone(),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Context(ContextError::Unauthenticated) => ApiError::Unauthenticated.to_string(),
            e if e.is_server_error() => match e.status() {
                StatusCode::SERVICE_UNAVAILABLE => "service unavailable".to_string(),
                _ => "internal server error".to_string(),
            },
            e => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
