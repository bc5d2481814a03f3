//! Rejects state-changing requests from unrecognized origins.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request};

use crate::error::ApiError;
use crate::pipeline::{Handler, Middleware};
use crate::security::origin::{is_safe_method, AllowedOrigins};

#[derive(Debug, Clone)]
pub struct OriginGuard {
    allowed: Arc<AllowedOrigins>,
}

impl OriginGuard {
    pub fn new(allowed: Arc<AllowedOrigins>) -> Self {
        Self { allowed }
    }
}

impl Middleware for OriginGuard {
    fn wrap(&self, next: Handler) -> Handler {
        let allowed = self.allowed.clone();
        Handler::new(move |req: Request<Body>| {
            let next = next.clone();
            let allowed = allowed.clone();
            async move {
                if is_safe_method(req.method()) || allowed.allows_request(req.headers()) {
                    return next.call(req).await;
                }

                tracing::warn!(
                    method = %req.method(),
                    path = %req.uri().path(),
                    origin = ?req.headers().get(header::ORIGIN),
                    referer = ?req.headers().get(header::REFERER),
                    "Rejected request from unrecognized origin"
                );
                Err(ApiError::Forbidden)
            }
        })
    }
}
