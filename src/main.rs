//! Cookhound API server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use cookhound_api::config::{load_config, load_from_env};
use cookhound_api::http::server::shutdown_signal;
use cookhound_api::observability::{logging, metrics};
use cookhound_api::store::{KvStore, MemoryStore, RedisStore};
use cookhound_api::{AppState, HttpServer};

#[derive(Parser)]
#[command(name = "cookhound-api", version, about = "Cookhound API server")]
struct Cli {
    /// Path to a TOML config file. Defaults plus environment when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability.log_level, config.observability.log_format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        "cookhound-api starting"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let store: Arc<dyn KvStore> = match &config.store.redis_url {
        Some(url) => Arc::new(RedisStore::connect(url).await?),
        None => {
            tracing::warn!("No redis_url configured, using in-process store; limits are not shared across instances");
            Arc::new(MemoryStore::new())
        }
    };

    tracing::info!(
        bind_address = %config.listener.bind_address,
        allowed_origins = config.security.allowed_origins.len(),
        rate_limit_enabled = config.rate_limit.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let state = AppState::new(config, store)?;

    HttpServer::new(state).run(listener, shutdown_signal()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
