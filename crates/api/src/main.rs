//! LendCalc API server binary entrypoint.

use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use lendcalc_common::config::AppConfig;
use lendcalc_engine::persistence::FileStore;
use lendcalc_engine::service::PositionService;
use lendcalc_pricesync::{CoinGeckoClient, SymbolTable};

use lendcalc_api::routes::create_router;
use lendcalc_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(
                "lendcalc_api=debug,lendcalc_engine=debug,lendcalc_pricesync=info,tower_http=debug",
            )
        }))
        .init();

    tracing::info!("Starting LendCalc API server...");

    // Load configuration
    let config = AppConfig::from_env()?;

    // Restore the saved position
    let storage = Arc::new(FileStore::new(config.storage_dir.clone()));
    tracing::info!(dir = %storage.dir().display(), "Using file storage");
    let service = PositionService::load(storage);

    // Quote provider for live prices
    let provider = Arc::new(CoinGeckoClient::new(
        config.price_api_url.clone(),
        Duration::from_millis(config.price_request_timeout_ms),
        SymbolTable::coingecko(),
    )?);

    // Build application state
    let state = AppState::new(service, provider, config.clone());

    if config.price_sync_enabled {
        state.price_sync.lock().await.start().await;
    }

    // Build router
    let app = create_router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.price_sync.lock().await.stop().await;
    tracing::info!("API server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
