//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};

use cookhound_api::clock::ManualClock;
use cookhound_api::context;
use cookhound_api::http::middleware::LogServiceMethod;
use cookhound_api::security::RateLimitResult;
use cookhound_api::store::{KvStore, MemoryStore, StoreError};
use cookhound_api::{ApiError, AppConfig, AppState, Handler, HttpServer};

pub const TEST_ORIGIN: &str = "https://cookhound.com";
pub const ADMIN_KEY: &str = "test-admin-key-0123456789";
pub const START: u64 = 1_700_000_000_000;
pub const MAX_REQUESTS: u64 = 3;

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub hits: Arc<AtomicUsize>,
}

impl TestApp {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.security.allowed_origins = vec![TEST_ORIGIN.to_string()];
    config.rate_limit.max_requests = MAX_REQUESTS;
    config.rate_limit.window_secs = 60;
    config.admin.enabled = true;
    config.admin.api_key = ADMIN_KEY.to_string();
    config
}

/// App over an in-memory store driven by a manual clock.
pub fn spawn_app() -> TestApp {
    let clock = Arc::new(ManualClock::new(START));
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));
    build_app(test_config(), store, clock)
}

pub fn build_app(config: AppConfig, store: Arc<dyn KvStore>, clock: Arc<ManualClock>) -> TestApp {
    let state = AppState::with_clock(config, store, clock.clone()).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let server = HttpServer::with_routes(state.clone(), app_routes(&state, hits.clone()));
    TestApp {
        router: server.router(),
        state,
        clock,
        hits,
    }
}

/// Application routes used across tests.
///
/// - `/recipes`: full API pipeline, echoes the request context
/// - `/whoami`: context + origin only, sleeps based on the caller's IP
/// - `/custom-limit`: rate limited with a custom exceeded response
pub fn app_routes(state: &AppState, hits: Arc<AtomicUsize>) -> Router {
    let recipes = Handler::new(move |_req: Request<Body>| {
        let hits = hits.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            echo_context().await
        }
    });

    let whoami = Handler::new(|_req: Request<Body>| async {
        let ip = context::ip()?;
        let delay = ip.rsplit('.').next().and_then(|o| o.parse::<u64>().ok()).unwrap_or(0) % 7;
        tokio::time::sleep(Duration::from_millis(delay * 3)).await;
        echo_context().await
    });

    let custom = state.pipeline().layer(state.rate_limit().on_exceeded(|result: &RateLimitResult| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "slowDown": true, "total": result.total_requests })),
        )
            .into_response()
    }));

    Router::new()
        .route(
            "/recipes",
            state
                .api_pipeline()
                .layer(LogServiceMethod::new("RecipeService", "list"))
                .route(recipes),
        )
        .route("/whoami", state.pipeline().route(whoami))
        .route(
            "/custom-limit",
            custom.route(Handler::new(|_req: Request<Body>| async { Ok::<_, ApiError>("ok") })),
        )
}

async fn echo_context() -> Result<Json<Value>, ApiError> {
    let request_id = context::request_id()?;
    let ip = context::ip()?;
    let locale = context::user_locale()?;
    let user_id = context::user_id()?;
    Ok(Json(json!({
        "requestId": request_id,
        "ip": ip,
        "locale": locale,
        "userId": user_id,
    })))
}

/// Request with a transport peer address attached, as `into_make_service_with_connect_info` does.
pub fn request(method: Method, uri: &str, headers: &[(&str, &str)], peer: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let mut req = builder.body(Body::empty()).unwrap();
    if let Some(peer) = peer {
        let addr: SocketAddr = peer.parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
    }
    req
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Store whose every command fails, as if the backend were down.
#[derive(Debug, Default)]
pub struct FailingStore;

#[async_trait]
impl KvStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn del(&self, _key: &str) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn keys(&self, _pattern: &str) -> Result<Vec<String>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}
