//! Collateral asset routes.

use axum::extract::{Path, State};
use axum::routing::{patch, post, put};
use axum::{Json, Router};

use lendcalc_common::error::AppError;
use lendcalc_common::types::{AssetId, CollateralDraft};
use lendcalc_engine::store::CollateralUpdate;

use super::{MutationResponse, ValueBody, parse_field, rejection_error};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/collaterals", post(add_collateral))
        .route(
            "/api/collaterals/{id}",
            patch(update_collateral).delete(remove_collateral),
        )
        .route("/api/collaterals/{id}/{field}", put(edit_collateral))
}

/// POST /api/collaterals — Add a collateral asset from the submitted draft.
async fn add_collateral(
    State(state): State<AppState>,
    Json(draft): Json<CollateralDraft>,
) -> Result<Json<MutationResponse>, AppError> {
    let id = state
        .service
        .add_collateral(draft)
        .await
        .map_err(rejection_error)?;
    tracing::info!(asset_id = %id, "Collateral added");
    Ok(Json(
        MutationResponse::new(state.service.summary().await).with_id(id),
    ))
}

/// PATCH /api/collaterals/:id — Rename and/or toggle inclusion.
async fn update_collateral(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<CollateralUpdate>,
) -> Result<Json<MutationResponse>, AppError> {
    let id = AssetId::from(id);
    state
        .service
        .update_collateral(&id, update)
        .await
        .map_err(rejection_error)?;
    Ok(Json(MutationResponse::new(state.service.summary().await)))
}

/// PUT /api/collaterals/:id/:field — Set the price or amount of a collateral asset.
async fn edit_collateral(
    State(state): State<AppState>,
    Path((id, field)): Path<(String, String)>,
    Json(body): Json<ValueBody>,
) -> Result<Json<MutationResponse>, AppError> {
    let id = AssetId::from(id);
    let field = parse_field(&field)?;
    let outcome = state
        .service
        .edit_collateral(&id, field, body.value)
        .await
        .map_err(rejection_error)?;
    Ok(Json(
        MutationResponse::new(state.service.summary().await).with_outcome(outcome),
    ))
}

/// DELETE /api/collaterals/:id — Remove a collateral asset.
async fn remove_collateral(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MutationResponse>, AppError> {
    let id = AssetId::from(id);
    state
        .service
        .remove_collateral(&id)
        .await
        .map_err(rejection_error)?;
    tracing::info!(asset_id = %id, "Collateral removed");
    Ok(Json(MutationResponse::new(state.service.summary().await)))
}
