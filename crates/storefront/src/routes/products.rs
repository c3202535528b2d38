//! Catalog and review handlers.
//!
//! Listing and detail responses come from the cached API client; reviews
//! are always fetched fresh.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use larkspur_core::ProductId;

use crate::api::{NewReview, ProductDetail, ProductFilter, ProductPage, Review};
use crate::error::{AppError, Result};
use crate::middleware::Visitor;
use crate::state::AppState;

/// Longest review body accepted, in characters.
pub const MAX_REVIEW_CHARS: usize = 2000;

/// Review submission body.
#[derive(Debug, Deserialize)]
pub struct ReviewForm {
    pub rating: u8,
    pub body: String,
}

impl ReviewForm {
    /// Check the rating range and body length.
    fn validate(self) -> Result<NewReview> {
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::BadRequest(
                "rating must be between 1 and 5".to_string(),
            ));
        }
        let body = self.body.trim();
        if body.is_empty() {
            return Err(AppError::BadRequest("review cannot be empty".to_string()));
        }
        if body.chars().count() > MAX_REVIEW_CHARS {
            return Err(AppError::BadRequest(format!(
                "review must be at most {MAX_REVIEW_CHARS} characters"
            )));
        }
        Ok(NewReview {
            rating: self.rating,
            body: body.to_string(),
        })
    }
}

/// `GET /api/products` - filtered, paginated listing.
#[instrument(skip(state))]
pub async fn list(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<ProductPage>> {
    if filter.has_inverted_price_range() {
        return Err(AppError::BadRequest(
            "min_price must not exceed max_price".to_string(),
        ));
    }
    Ok(Json(state.api().products(&filter).await?))
}

/// `GET /api/products/{id}`
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    Ok(Json(state.api().product(&product_id).await?))
}

/// `GET /api/products/{id}/reviews` - newest first.
#[instrument(skip(state))]
pub async fn reviews(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Vec<Review>>> {
    Ok(Json(state.api().reviews(&product_id).await?))
}

/// `POST /api/products/{id}/reviews` - post a review as the signed-in user.
#[instrument(skip(state, visitor, form))]
pub async fn create_review(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(product_id): Path<ProductId>,
    Json(form): Json<ReviewForm>,
) -> Result<(StatusCode, Json<Review>)> {
    let auth = visitor.require_auth()?;
    let review = form.validate()?;
    let created = state
        .api()
        .create_review(auth, &product_id, &review)
        .await?;
    visitor.toasts.success("Thanks for your review!");
    Ok((StatusCode::CREATED, Json(created)))
}
