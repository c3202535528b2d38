//! Cart route handlers.
//!
//! JSON endpoints for cart mutations plus the HTML badge fragment. Each
//! mutation answers with the new item count and an `HX-Trigger` header so
//! the badge and toast stack refresh.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{AppendHeaders, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use larkspur_core::{AddPlan, VariantId};

use crate::error::Result;
use crate::middleware::Visitor;
use crate::models::CartView;
use crate::services::cart::SyncOutcome;
use crate::state::AppState;

/// Event names fired through `HX-Trigger` after a cart change.
pub const CART_UPDATED: &str = "cart-updated, toasts-updated";

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub variant_id: VariantId,
    pub quantity: Option<u32>,
}

/// Quantity update request body.
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

/// Outcome of an add-to-cart request.
#[derive(Debug, Serialize)]
pub struct AddToCartResponse {
    /// `added`, `capped` or `at_limit`.
    pub status: &'static str,
    /// Units actually added.
    pub added: u32,
    pub item_count: u32,
}

impl AddToCartResponse {
    fn new(plan: AddPlan, item_count: u32) -> Self {
        let status = match plan {
            AddPlan::Add(_) => "added",
            AddPlan::Capped { .. } => "capped",
            AddPlan::AtLimit => "at_limit",
        };
        Self {
            status,
            added: plan.added().map_or(0, |q| q.get()),
            item_count,
        }
    }
}

/// Item count after a mutation.
#[derive(Debug, Serialize)]
pub struct ItemCountResponse {
    pub item_count: u32,
}

/// Outcome of a manual sync trigger.
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    /// `not_signed_in`, `already_synced` or `synced`.
    pub status: &'static str,
    pub merged: usize,
    pub kept_locally: usize,
}

/// Cart count badge fragment template (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/cart_count.html")]
pub struct CartCountTemplate {
    pub count: u32,
}

fn updated<T: IntoResponse>(body: T) -> Response {
    (AppendHeaders([("HX-Trigger", CART_UPDATED)]), body).into_response()
}

/// `GET /api/cart` - cart lines with catalog data.
#[instrument(skip_all)]
pub async fn show(State(state): State<AppState>, visitor: Visitor) -> Result<Json<CartView>> {
    Ok(Json(visitor.cart(&state).view().await?))
}

/// `POST /api/cart/items` - add units of a variant.
#[instrument(skip(state, visitor))]
pub async fn add(
    State(state): State<AppState>,
    visitor: Visitor,
    Json(body): Json<AddToCartRequest>,
) -> Result<Response> {
    let outcome = visitor
        .cart(&state)
        .add_to_cart(&body.variant_id, body.quantity.unwrap_or(1), false)
        .await?;

    Ok(updated(Json(AddToCartResponse::new(
        outcome.plan,
        outcome.item_count,
    ))))
}

/// `PATCH /api/cart/items/{variant_id}` - set a line's quantity.
#[instrument(skip(state, visitor))]
pub async fn update(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(variant_id): Path<VariantId>,
    Json(body): Json<UpdateQuantityRequest>,
) -> Result<Response> {
    let item_count = visitor
        .cart(&state)
        .update_quantity(&variant_id, body.quantity)
        .await?;
    Ok(updated(Json(ItemCountResponse { item_count })))
}

/// `DELETE /api/cart/items/{variant_id}` - remove a line.
#[instrument(skip(state, visitor))]
pub async fn remove(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(variant_id): Path<VariantId>,
) -> Result<Response> {
    let item_count = visitor.cart(&state).remove(&variant_id).await?;
    Ok(updated(Json(ItemCountResponse { item_count })))
}

/// `DELETE /api/cart` - empty the cart.
#[instrument(skip_all)]
pub async fn clear(State(state): State<AppState>, visitor: Visitor) -> Result<Response> {
    visitor.cart(&state).clear().await?;
    Ok(updated(StatusCode::NO_CONTENT))
}

/// `POST /api/cart/sync` - merge the anonymous cart now.
///
/// Normally happens on the first signed-in request; this endpoint reports
/// what that did.
#[instrument(skip_all)]
pub async fn sync(State(state): State<AppState>, visitor: Visitor) -> Result<Json<SyncResponse>> {
    let outcome = visitor.cart(&state).sync_local_cart_with_server().await?;
    let response = match outcome {
        SyncOutcome::NotSignedIn => SyncResponse {
            status: "not_signed_in",
            merged: 0,
            kept_locally: 0,
        },
        SyncOutcome::AlreadySynced => SyncResponse {
            status: "already_synced",
            merged: 0,
            kept_locally: 0,
        },
        SyncOutcome::Synced {
            merged,
            kept_locally,
        } => SyncResponse {
            status: "synced",
            merged,
            kept_locally,
        },
    };
    Ok(Json(response))
}

/// `GET /cart/count` - badge fragment (HTMX).
///
/// Renders 0 when the cart cannot be read.
#[instrument(skip_all)]
pub async fn count(State(state): State<AppState>, visitor: Visitor) -> impl IntoResponse {
    let count = match visitor.cart(&state).item_count().await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!("Failed to count cart items: {e}");
            0
        }
    };

    CartCountTemplate { count }
}
