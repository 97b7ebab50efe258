pub mod borrowed;
pub mod collaterals;
pub mod health;
pub mod position;
pub mod price_sync;
pub mod quotes;

use axum::Router;
use serde::{Deserialize, Serialize};

use lendcalc_common::error::AppError;
use lendcalc_common::types::{AssetField, AssetId};
use lendcalc_engine::calculations::PositionSummary;
use lendcalc_engine::store::{EditOutcome, Rejection};

use crate::state::AppState;

/// Build the complete API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(position::router())
        .merge(collaterals::router())
        .merge(borrowed::router())
        .merge(price_sync::router())
        .merge(quotes::router())
        .with_state(state)
}

/// Body of the single-value edit endpoints.
#[derive(Debug, Deserialize)]
pub struct ValueBody {
    pub value: f64,
}

/// Result of an applied mutation, with the recomputed summary.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<AssetId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<EditOutcome>,
    pub summary: PositionSummary,
}

impl MutationResponse {
    pub fn new(summary: PositionSummary) -> Self {
        Self {
            id: None,
            outcome: None,
            summary,
        }
    }

    pub fn with_id(mut self, id: AssetId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_outcome(mut self, outcome: EditOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }
}

/// Unknown ids are 404s; every other rejection is a 422 with its reason.
pub(crate) fn rejection_error(rejection: Rejection) -> AppError {
    match rejection {
        Rejection::UnknownAsset { .. } => AppError::NotFound(rejection.to_string()),
        other => AppError::Rejected(other.to_string()),
    }
}

pub(crate) fn parse_field(field: &str) -> Result<AssetField, AppError> {
    field.parse().map_err(AppError::Validation)
}
