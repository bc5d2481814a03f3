use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::http::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub rate_limit: RateLimitStatus,
    pub cache_namespace: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub enabled: bool,
    pub window_secs: u64,
    pub max_requests: u64,
    pub sub_windows: u32,
}

#[derive(Serialize)]
pub struct Removed {
    pub removed: u64,
}

#[derive(Debug, Deserialize)]
pub struct InvalidateRequest {
    pub model: String,
    pub changed: Map<String, Value>,
    #[serde(default)]
    pub original: Option<Map<String, Value>>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let limiter = state.limiter.config();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        rate_limit: RateLimitStatus {
            enabled: state.config.rate_limit.enabled,
            window_secs: limiter.window.as_secs(),
            max_requests: limiter.max_requests,
            sub_windows: limiter.sub_windows,
        },
        cache_namespace: state.cache.namespace().to_string(),
    })
}

/// Clear every sub-window counter for an identifier such as `"203.0.113.7:/recipes"`.
pub async fn reset_rate_limit(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<Removed>, ApiError> {
    let removed = state.limiter.reset_limit(&identifier).await?;
    Ok(Json(Removed { removed }))
}

pub async fn invalidate_cache(
    State(state): State<AppState>,
    Json(body): Json<InvalidateRequest>,
) -> Result<Json<Removed>, ApiError> {
    if body.model.trim().is_empty() {
        return Err(ApiError::BadRequest("model must not be empty".to_string()));
    }
    let removed = state
        .cache
        .invalidate_model_cache(&body.model, &body.changed, body.original.as_ref())
        .await?;
    Ok(Json(Removed { removed }))
}
