//! Position snapshot and multiplier routes.

use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Serialize;

use lendcalc_common::error::AppError;
use lendcalc_common::format::{format_number, format_usd, format_utilization};
use lendcalc_engine::calculations::PositionSummary;
use lendcalc_engine::service::PositionView;

use super::{MutationResponse, ValueBody, rejection_error};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/position", get(get_position))
        .route("/api/multiplier", put(set_multiplier))
}

/// Display strings for the summary panel.
#[derive(Debug, Serialize)]
pub struct DisplaySummary {
    pub total_collateral_value: String,
    pub total_collateral_amount: String,
    pub total_borrow_value: String,
    pub equity: String,
    pub breakeven_price: String,
    pub utilization: String,
    pub remaining_borrow_power: String,
    pub borrow_capacity: String,
    pub risk: String,
}

impl From<&PositionSummary> for DisplaySummary {
    fn from(summary: &PositionSummary) -> Self {
        Self {
            total_collateral_value: format_usd(summary.total_collateral_value),
            total_collateral_amount: format_number(summary.total_collateral_amount, 4),
            total_borrow_value: format_usd(summary.total_borrow_value),
            equity: format_usd(summary.equity),
            breakeven_price: format_usd(summary.breakeven_price),
            utilization: format_utilization(summary.utilization.rate()),
            remaining_borrow_power: format_usd(summary.remaining_borrow_power),
            borrow_capacity: format_usd(summary.borrow_capacity),
            risk: summary.risk.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PositionResponse {
    #[serde(flatten)]
    pub view: PositionView,
    pub display: DisplaySummary,
}

/// GET /api/position — Configuration, derived metrics and their display strings.
async fn get_position(State(state): State<AppState>) -> Json<PositionResponse> {
    let view = state.service.view().await;
    let display = DisplaySummary::from(&view.summary);
    Json(PositionResponse { view, display })
}

/// PUT /api/multiplier — Set the loan-to-value multiplier. Existing borrows are not re-clamped.
async fn set_multiplier(
    State(state): State<AppState>,
    Json(body): Json<ValueBody>,
) -> Result<Json<MutationResponse>, AppError> {
    state
        .service
        .set_multiplier(body.value)
        .await
        .map_err(rejection_error)?;
    tracing::info!(multiplier = body.value, "Multiplier updated");
    Ok(Json(MutationResponse::new(state.service.summary().await)))
}
