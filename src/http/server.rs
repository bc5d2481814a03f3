//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build shared state (store, limiter, cache, allow-list) once at startup
//! - Hand out the standard middleware pipelines
//! - Create the Axum Router with health, admin and application routes
//! - Wire up tower layers (timeout, tracing, body limit)
//! - Serve with graceful shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::cache::QueryCache;
use crate::clock::{Clock, SystemClock};
use crate::compose;
use crate::config::loader::ConfigError;
use crate::config::validation::ValidationError;
use crate::config::AppConfig;
use crate::context::{self, LocaleSettings};
use crate::error::ApiError;
use crate::http::middleware::{OriginGuard, RateLimit, RequestContextLayer};
use crate::pipeline::{Handler, Pipeline};
use crate::security::origin::AllowedOrigins;
use crate::security::rate_limit::{RateLimitConfig, SlidingWindowLimiter};
use crate::store::KvStore;

/// Application state shared by handlers and middlewares.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn KvStore>,
    pub cache: QueryCache,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub origins: Arc<AllowedOrigins>,
    pub locales: Arc<LocaleSettings>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn KvStore>) -> Result<Self, ConfigError> {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`], with the limiter reading time from `clock`.
    pub fn with_clock(
        config: AppConfig,
        store: Arc<dyn KvStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let origins = AllowedOrigins::parse(&config.security.allowed_origins).map_err(|entry| {
            ConfigError::Validation(vec![ValidationError::new(
                "security.allowed_origins",
                format!("`{entry}` is not a valid origin"),
            )])
        })?;

        let rl = &config.rate_limit;
        let limiter_config = RateLimitConfig::with_prefix(
            Duration::from_secs(rl.window_secs),
            rl.max_requests,
            rl.key_prefix.clone(),
        )
        .sub_windows(rl.sub_windows);

        let cache = QueryCache::with_policy(
            store.clone(),
            config.cache.namespace.clone(),
            config.cache.ttl_policy(),
        );

        Ok(Self {
            limiter: Arc::new(SlidingWindowLimiter::with_clock(store.clone(), limiter_config, clock)),
            locales: Arc::new(config.locale.settings()),
            origins: Arc::new(origins),
            config: Arc::new(config),
            store,
            cache,
            started_at: Instant::now(),
        })
    }

    /// Context boundary plus origin guard. Every route starts from this.
    pub fn pipeline(&self) -> Pipeline {
        compose!(
            RequestContextLayer::new(self.locales.clone()),
            OriginGuard::new(self.origins.clone()),
        )
    }

    /// Rate-limit middleware over the shared limiter.
    pub fn rate_limit(&self) -> RateLimit {
        RateLimit::new(self.limiter.clone()).message_key(self.config.rate_limit.message_key.clone())
    }

    /// Standard pipeline for API routes, rate limited when enabled.
    pub fn api_pipeline(&self) -> Pipeline {
        if self.config.rate_limit.enabled {
            self.pipeline().layer(self.rate_limit())
        } else {
            self.pipeline()
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthStatus {
    status: &'static str,
    request_id: String,
    locale: String,
}

async fn health(_req: Request<Body>) -> Result<Json<HealthStatus>, ApiError> {
    Ok(Json(HealthStatus {
        status: "ok",
        request_id: context::request_id()?,
        locale: context::user_locale()?,
    }))
}

/// HTTP server for the API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Server with the built-in routes only.
    pub fn new(state: AppState) -> Self {
        Self::with_routes(state, Router::new())
    }

    /// Server with application routes merged next to the built-in ones.
    pub fn with_routes(state: AppState, routes: Router) -> Self {
        let router = Self::build_router(&state, routes);
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: &AppState, routes: Router) -> Router {
        let mut router = Router::new()
            .route("/health", state.pipeline().route(Handler::new(health)))
            .merge(routes);

        if state.config.admin.enabled {
            router = router.merge(setup_admin_router(state.clone()));
        }

        router
            .layer(RequestBodyLimitLayer::new(state.config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(state.config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C. If the handler cannot be installed the server runs
/// until killed.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
