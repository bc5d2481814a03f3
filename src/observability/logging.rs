//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Time and log service methods without annotating them
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - JSON format for production, pretty format for development
//! - Every service-method event carries the request id when one is active

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::LogFormat;
use crate::context;

/// Install the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("cookhound_api={level},tower_http={level}").into());

    let registry = tracing_subscriber::registry().with(filter);
    let result = match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Await `future`, logging its outcome and duration under `service.method`.
pub async fn log_service_method<T, E, F>(service: &'static str, method: &'static str, future: F) -> Result<T, E>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    let request_id = context::request_id().unwrap_or_else(|_| "-".to_string());
    let start = Instant::now();
    tracing::debug!(service, method, request_id = %request_id, "Service method started");

    let result = future.await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match &result {
        Ok(_) => tracing::debug!(service, method, request_id = %request_id, elapsed_ms, "Service method finished"),
        Err(e) => tracing::warn!(
            service,
            method,
            request_id = %request_id,
            elapsed_ms,
            error = %e,
            "Service method failed"
        ),
    }
    result
}
