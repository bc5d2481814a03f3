//! Service-method logging as a pipeline middleware.

use axum::body::Body;
use axum::http::Request;

use crate::observability::logging::log_service_method;
use crate::pipeline::{Handler, Middleware};

/// Logs start, duration and failure of the wrapped handler under
/// `service.method`, tagged with the active request id.
#[derive(Debug, Clone, Copy)]
pub struct LogServiceMethod {
    service: &'static str,
    method: &'static str,
}

impl LogServiceMethod {
    pub fn new(service: &'static str, method: &'static str) -> Self {
        Self { service, method }
    }
}

impl Middleware for LogServiceMethod {
    fn wrap(&self, next: Handler) -> Handler {
        let Self { service, method } = *self;
        Handler::new(move |req: Request<Body>| {
            let next = next.clone();
            async move { log_service_method(service, method, next.call(req)).await }
        })
    }
}
