//! Shared application state for the Axum API server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use lendcalc_common::config::AppConfig;
use lendcalc_engine::service::PositionService;
use lendcalc_pricesync::{PriceSync, QuoteProvider};

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub service: PositionService,
    pub quotes: Arc<dyn QuoteProvider>,
    pub price_sync: Arc<Mutex<PriceSync>>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(
        service: PositionService,
        provider: Arc<dyn QuoteProvider>,
        config: AppConfig,
    ) -> Self {
        let price_sync = PriceSync::new(
            service.clone(),
            Arc::clone(&provider),
            Duration::from_millis(config.price_poll_interval_ms),
        );
        Self {
            service,
            quotes: provider,
            price_sync: Arc::new(Mutex::new(price_sync)),
            config,
        }
    }
}
