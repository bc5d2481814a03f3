//! Outermost middleware: binds the request context and normalizes errors.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::response::{IntoResponse, Response};
use tracing::Instrument;

use crate::context::{self, LocaleSettings};
use crate::error::ApiError;
use crate::observability::metrics;
use crate::pipeline::{Handler, Middleware};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Runs the wrapped handler inside a request context.
///
/// Any `ApiError` escaping the inner layers is logged with the request id
/// and converted into its JSON response here. When a context is already
/// active (nested pipelines) the layer is transparent.
#[derive(Debug, Clone)]
pub struct RequestContextLayer {
    locales: Arc<LocaleSettings>,
}

impl RequestContextLayer {
    pub fn new(locales: Arc<LocaleSettings>) -> Self {
        Self { locales }
    }
}

impl Middleware for RequestContextLayer {
    fn wrap(&self, next: Handler) -> Handler {
        let locales = self.locales.clone();
        Handler::new(move |req: Request<Body>| {
            let next = next.clone();
            let locales = locales.clone();
            async move {
                if context::is_active() {
                    return next.call(req).await;
                }
                context::run_for_request(req, &locales, |req| boundary(next, req)).await
            }
        })
    }
}

async fn boundary(next: Handler, req: Request<Body>) -> Result<Response, ApiError> {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let request_id = context::request_id()?;

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    let mut response = match next.call(req).instrument(span.clone()).await {
        Ok(response) => response,
        Err(err) => {
            if err.is_server_error() {
                tracing::error!(parent: &span, error = %err, "Request failed");
            } else {
                tracing::warn!(parent: &span, error = %err, status = err.status().as_u16(), "Request rejected");
            }
            err.into_response()
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), start);

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(X_REQUEST_ID, value);
    }
    Ok(response)
}
