//! Middleware composition.
//!
//! # Data Flow
//! ```text
//! compose!(context, origin, rate_limit).wrap(handler)
//!     = context(origin(rate_limit(handler)))
//!
//! request  → context → origin → rate_limit → handler
//! response ← context ← origin ← rate_limit ← handler
//! ```
//!
//! # Design Decisions
//! - A middleware is a plain `Handler -> Handler` transformation; the wrapped
//!   handler keeps the same call signature
//! - The first listed middleware is outermost
//! - Errors travel outward as `ApiError` until the context middleware turns
//!   them into a response; nothing in between swallows them silently

use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, MethodRouter};
use futures_util::future::BoxFuture;

use crate::error::ApiError;

/// Future returned by every handler.
pub type HandlerFuture = BoxFuture<'static, Result<Response, ApiError>>;

/// A cloneable async request handler.
#[derive(Clone)]
pub struct Handler {
    inner: Arc<dyn Fn(Request<Body>) -> HandlerFuture + Send + Sync>,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Handler")
    }
}

impl Handler {
    /// Wrap an async function whose success value converts into a response.
    pub fn new<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request<Body>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, ApiError>> + Send + 'static,
        R: IntoResponse,
    {
        Self {
            inner: Arc::new(move |req| {
                let fut = f(req);
                Box::pin(async move { fut.await.map(IntoResponse::into_response) })
            }),
        }
    }

    pub fn call(&self, req: Request<Body>) -> HandlerFuture {
        (self.inner)(req)
    }
}

/// Transforms a handler into another handler with the same signature.
pub trait Middleware: Send + Sync + 'static {
    fn wrap(&self, next: Handler) -> Handler;
}

impl<F> Middleware for F
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    fn wrap(&self, next: Handler) -> Handler {
        self(next)
    }
}

/// An ordered list of middlewares, outermost first.
#[derive(Clone, Default)]
pub struct Pipeline {
    layers: Vec<Arc<dyn Middleware>>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware inside the ones already added.
    pub fn layer<M: Middleware>(mut self, middleware: M) -> Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Apply every middleware around `handler`.
    pub fn wrap(&self, handler: Handler) -> Handler {
        self.layers
            .iter()
            .rev()
            .fold(handler, |next, middleware| middleware.wrap(next))
    }

    /// Wrap `handler` and mount it as an axum route accepting any method.
    pub fn route<S>(&self, handler: Handler) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        into_route(self.wrap(handler))
    }
}

/// Build a pipeline from middlewares listed outermost first.
#[macro_export]
macro_rules! compose {
    ($($middleware:expr),+ $(,)?) => {
        $crate::pipeline::Pipeline::new()$(.layer($middleware))+
    };
}

/// Adapt a handler into an axum route. Errors that escaped every middleware
/// still render through `ApiError`'s response.
pub fn into_route<S>(handler: Handler) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    any(move |req: Request<Body>| {
        let handler = handler.clone();
        async move {
            match handler.call(req).await {
                Ok(response) => response,
                Err(err) => err.into_response(),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::sync::Mutex;

    fn recorder(log: Arc<Mutex<Vec<String>>>, name: &'static str) -> impl Middleware {
        move |next: Handler| {
            let log = log.clone();
            Handler::new(move |req| {
                let next = next.clone();
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(format!("{name}:in"));
                    let res = next.call(req).await;
                    log.lock().unwrap().push(format!("{name}:out"));
                    res
                }
            })
        }
    }

    fn request() -> Request<Body> {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_first_listed_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner_log = log.clone();
        let handler = Handler::new(move |_req| {
            let log = inner_log.clone();
            async move {
                log.lock().unwrap().push("handler".to_string());
                Ok::<_, ApiError>(StatusCode::NO_CONTENT)
            }
        });

        let pipeline = compose!(
            recorder(log.clone(), "a"),
            recorder(log.clone(), "b"),
            recorder(log.clone(), "c"),
        );
        assert_eq!(pipeline.len(), 3);

        let res = pipeline.wrap(handler).call(request()).await.unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:in", "b:in", "c:in", "handler", "c:out", "b:out", "a:out"]
        );
    }

    #[tokio::test]
    async fn test_errors_propagate_through_layers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = Handler::new(|_req| async { Err::<StatusCode, _>(ApiError::NotFound) });

        let wrapped = compose!(recorder(log.clone(), "a")).wrap(handler);
        let err = wrapped.call(request()).await.unwrap_err();

        assert!(matches!(err, ApiError::NotFound));
        assert_eq!(*log.lock().unwrap(), vec!["a:in", "a:out"]);
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_identity() {
        let handler = Handler::new(|_req| async { Ok::<_, ApiError>("plain") });
        let res = Pipeline::new().wrap(handler).call(request()).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
