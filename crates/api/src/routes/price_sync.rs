//! Live price sync toggle.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use lendcalc_pricesync::SyncStatus;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/price-sync", get(get_status).put(set_enabled))
}

#[derive(Debug, Deserialize)]
pub struct PriceSyncToggle {
    pub enabled: bool,
}

/// GET /api/price-sync — Poller status, including symbols without quotes.
async fn get_status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.price_sync.lock().await.status().await)
}

/// PUT /api/price-sync — Start or stop live price polling.
///
/// After a stop returns, no in-flight fetch can change the position.
async fn set_enabled(
    State(state): State<AppState>,
    Json(toggle): Json<PriceSyncToggle>,
) -> Json<SyncStatus> {
    let mut sync = state.price_sync.lock().await;
    sync.set_enabled(toggle.enabled).await;
    Json(sync.status().await)
}
