//! One-off price lookup through the configured quote provider.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use lendcalc_common::error::AppError;
use lendcalc_common::types::normalize_symbol;
use lendcalc_pricesync::QuoteError;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/quotes/{symbol}", get(get_quote))
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub symbol: String,
    pub price: f64,
    pub provider: &'static str,
}

/// GET /api/quotes/:symbol — Current USD price of one symbol. Does not touch the position.
async fn get_quote(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> Result<Json<QuoteResponse>, AppError> {
    let price = state
        .quotes
        .fetch_price(&symbol)
        .await
        .map_err(|e| match e {
            QuoteError::MissingSymbol(_) => AppError::NotFound(e.to_string()),
            other => {
                tracing::warn!(symbol = %symbol, error = %other, "Quote lookup failed");
                AppError::Quote(other.to_string())
            }
        })?;

    Ok(Json(QuoteResponse {
        symbol: normalize_symbol(&symbol),
        price,
        provider: state.quotes.id(),
    }))
}
