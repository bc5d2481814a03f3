//! Per-IP, per-path rate limiting for pipeline routes.

use std::fmt;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use axum::response::{IntoResponse, Response};

use crate::context;
use crate::error::{ApiError, RATE_LIMIT_MESSAGE_KEY};
use crate::observability::metrics;
use crate::pipeline::{Handler, Middleware};
use crate::security::client_ip::UNKNOWN_IP;
use crate::security::rate_limit::{RateLimitResult, SlidingWindowLimiter};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Builds the response sent when a caller is over the limit.
pub type ExceededHandler = Arc<dyn Fn(&RateLimitResult) -> Response + Send + Sync>;

/// Counts each request against `"{ip}:{path}"`.
///
/// Requires an active request context. Store failures let the request through.
#[derive(Clone)]
pub struct RateLimit {
    limiter: Arc<SlidingWindowLimiter>,
    message_key: String,
    on_exceeded: Option<ExceededHandler>,
}

impl fmt::Debug for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimit")
            .field("limiter", &self.limiter)
            .field("message_key", &self.message_key)
            .field("custom_handler", &self.on_exceeded.is_some())
            .finish()
    }
}

impl RateLimit {
    pub fn new(limiter: Arc<SlidingWindowLimiter>) -> Self {
        Self {
            limiter,
            message_key: RATE_LIMIT_MESSAGE_KEY.to_string(),
            on_exceeded: None,
        }
    }

    /// Message key placed in the default 429 body.
    pub fn message_key(mut self, key: impl Into<String>) -> Self {
        self.message_key = key.into();
        self
    }

    /// Replace the default 429 response.
    pub fn on_exceeded<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RateLimitResult) -> Response + Send + Sync + 'static,
    {
        self.on_exceeded = Some(Arc::new(handler));
        self
    }

    async fn handle(&self, next: Handler, req: Request<Body>) -> Result<Response, ApiError> {
        let ip = context::ip()?;
        if ip == UNKNOWN_IP {
            return Err(ApiError::Infrastructure(
                "client ip could not be determined for rate limiting".to_string(),
            ));
        }

        let identifier = format!("{ip}:{}", req.uri().path());
        let result = match self.limiter.check_limit(&identifier).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(identifier = %identifier, error = %e, "Rate limit check failed, allowing request");
                metrics::record_rate_limit_fail_open();
                return next.call(req).await;
            }
        };

        let mut response = if result.allowed {
            next.call(req).await?
        } else {
            tracing::info!(
                identifier = %identifier,
                total = result.total_requests,
                "Rate limit exceeded"
            );
            match &self.on_exceeded {
                Some(handler) => handler(&result),
                None => ApiError::TooManyRequests {
                    message_key: self.message_key.clone(),
                }
                .into_response(),
            }
        };

        set_limit_headers(
            response.headers_mut(),
            self.limiter.config().max_requests,
            result.remaining_requests,
        );
        Ok(response)
    }
}

impl Middleware for RateLimit {
    fn wrap(&self, next: Handler) -> Handler {
        let this = self.clone();
        Handler::new(move |req: Request<Body>| {
            let next = next.clone();
            let this = this.clone();
            async move { this.handle(next, req).await }
        })
    }
}

fn set_limit_headers(headers: &mut HeaderMap, limit: u64, remaining: u64) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
}
