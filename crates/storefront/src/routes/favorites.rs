//! Favorites route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use tracing::instrument;

use larkspur_core::ProductId;

use crate::error::Result;
use crate::middleware::Visitor;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub product_ids: Vec<ProductId>,
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub product_id: ProductId,
    pub is_favorite: bool,
}

/// `GET /api/favorites` - the user's favorite products (empty if anonymous).
#[instrument(skip_all)]
pub async fn list(State(state): State<AppState>, visitor: Visitor) -> Result<Json<FavoritesResponse>> {
    let product_ids = visitor.favorites(&state).list().await?;
    Ok(Json(FavoritesResponse { product_ids }))
}

/// `POST /api/favorites/{product_id}/toggle` - flip favorite status.
///
/// Anonymous visitors get `401` and a toast asking them to sign in.
#[instrument(skip(state, visitor))]
pub async fn toggle(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(product_id): Path<ProductId>,
) -> Result<Json<ToggleResponse>> {
    let is_favorite = visitor.favorites(&state).toggle(&product_id).await?;
    Ok(Json(ToggleResponse {
        product_id,
        is_favorite,
    }))
}
