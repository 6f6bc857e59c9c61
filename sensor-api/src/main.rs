mod auth;
mod config;
mod db;
mod errors;
mod memory;
mod metrics;
mod model;
mod rest;
mod sensor;
mod service;
mod store;
mod token;
mod validate;

use axum::{routing::get, Router};
use config::{Config, StorageBackend};
use std::sync::Arc;
use store::ReadingStore;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!("Sensor API failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    info!("Starting Sensor API");
    info!("HTTP server: {}", config.http_addr);
    info!("Storage backend: {:?}", config.storage);
    info!("Token lifetime: {}s", config.token.lifetime_secs);

    metrics::init_metrics()
        .map_err(|e| anyhow::anyhow!("Failed to register metrics: {}", e))?;

    let store: Arc<dyn ReadingStore> = match config.storage {
        StorageBackend::Postgres => {
            info!(
                "Database: {}",
                config.database_url.split('@').last().unwrap_or("***")
            );
            let pool = db::make_pool(&config.database_url).await?;
            Arc::new(db::PgStore::new(pool))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage, readings are lost on restart");
            Arc::new(memory::MemoryStore::new())
        }
    };

    let readings = service::ReadingService::new(store);
    if config.seed_sample_data {
        // A failed seed should not keep the API down.
        if let Err(e) = readings.seed_if_empty().await {
            error!("Failed to seed sample data: {}", e);
        }
    }

    let codec = token::TokenCodec::new(&config.token)?;
    let state = rest::AppState {
        readings,
        auth: auth::AuthService::new(codec),
    };

    // Build HTTP app with REST API and metrics endpoint
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .merge(rest::create_router(state, &config.cors_allowed_origins));

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!("HTTP server listening on {}", config.http_addr);

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap_or_else(|e| {
            error!("HTTP server error: {}", e);
        });
    });

    tokio::select! {
        _ = server_handle => {
            error!("HTTP server terminated");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down");
    Ok(())
}

async fn metrics_handler() -> String {
    metrics::gather_metrics()
}
