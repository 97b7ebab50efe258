//! Borrowed asset routes.

use axum::extract::{Path, State};
use axum::routing::{delete, post, put};
use axum::{Json, Router};

use lendcalc_common::error::AppError;
use lendcalc_common::types::{AssetId, Token};

use super::{MutationResponse, ValueBody, parse_field, rejection_error};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/borrowed", post(add_borrowed))
        .route("/api/borrowed/{id}", delete(remove_borrowed))
        .route("/api/borrowed/{id}/{field}", put(edit_borrowed))
}

/// POST /api/borrowed — Add a borrowed asset, clamped to the remaining borrowing power.
async fn add_borrowed(
    State(state): State<AppState>,
    Json(draft): Json<Token>,
) -> Result<Json<MutationResponse>, AppError> {
    let id = state
        .service
        .add_borrowed(draft)
        .await
        .map_err(rejection_error)?;
    tracing::info!(asset_id = %id, "Borrowed asset added");
    Ok(Json(
        MutationResponse::new(state.service.summary().await).with_id(id),
    ))
}

/// PUT /api/borrowed/:id/:field — Set the price or amount of a borrowed asset.
///
/// Increases beyond the borrowing ceiling are stored at the ceiling and
/// reported as `amount_clamped`.
async fn edit_borrowed(
    State(state): State<AppState>,
    Path((id, field)): Path<(String, String)>,
    Json(body): Json<ValueBody>,
) -> Result<Json<MutationResponse>, AppError> {
    let id = AssetId::from(id);
    let field = parse_field(&field)?;
    let outcome = state
        .service
        .edit_borrowed(&id, field, body.value)
        .await
        .map_err(rejection_error)?;
    Ok(Json(
        MutationResponse::new(state.service.summary().await).with_outcome(outcome),
    ))
}

/// DELETE /api/borrowed/:id — Remove a borrowed asset.
async fn remove_borrowed(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MutationResponse>, AppError> {
    let id = AssetId::from(id);
    state
        .service
        .remove_borrowed(&id)
        .await
        .map_err(rejection_error)?;
    tracing::info!(asset_id = %id, "Borrowed asset removed");
    Ok(Json(MutationResponse::new(state.service.summary().await)))
}
