//! Store REST API client (catalog, cart, favorites, reviews, users, checkout).
//!
//! # Architecture
//!
//! - The REST API is the source of truth for authenticated carts and
//!   favorites - NO local copy is kept once a visitor signs in
//! - Catalog reads (variants, product listings, product detail) are cached
//!   in memory via `moka` (5 minute TTL)
//! - User-scoped endpoints carry the identity provider access token as a
//!   bearer token
//!
//! Handlers and services depend on the [`StoreApi`] trait rather than the
//! concrete [`StoreApiClient`] so they can run against in-memory fakes.
//!
//! # Example
//!
//! ```rust,ignore
//! use larkspur_storefront::api::{ApiAuth, StoreApi, StoreApiClient};
//!
//! let client = StoreApiClient::new(&config.api)?;
//! let auth = ApiAuth::new(user.id.clone(), token);
//!
//! client.add_cart_item(&auth, &variant_id, Quantity::ONE).await?;
//! let items = client.cart(&auth).await?;
//! ```

mod cache;
mod client;
pub mod types;

pub use client::StoreApiClient;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

use larkspur_core::{Email, ProductId, Quantity, VariantId};

/// Errors that can occur when talking to the store API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bearer token missing, expired or rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Failed to parse a response body.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Could not build an endpoint URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Operations offered by the store REST API.
#[async_trait]
pub trait StoreApi: Send + Sync {
    // Cart

    /// Fetch the user's server-side cart.
    async fn cart(&self, auth: &ApiAuth) -> Result<Vec<ServerCartItem>, ApiError>;

    /// Add `quantity` units of a variant to the user's cart.
    async fn add_cart_item(
        &self,
        auth: &ApiAuth,
        variant_id: &VariantId,
        quantity: Quantity,
    ) -> Result<(), ApiError>;

    /// Replace the quantity of a cart line.
    async fn update_cart_item(
        &self,
        auth: &ApiAuth,
        variant_id: &VariantId,
        quantity: Quantity,
    ) -> Result<(), ApiError>;

    /// Remove a line from the cart.
    async fn remove_cart_item(&self, auth: &ApiAuth, variant_id: &VariantId)
    -> Result<(), ApiError>;

    /// Remove every line from the cart.
    async fn clear_cart(&self, auth: &ApiAuth) -> Result<(), ApiError>;

    // Favorites

    /// List the user's favorites.
    async fn favorites(&self, auth: &ApiAuth) -> Result<Vec<Favorite>, ApiError>;

    /// Mark a product as favorite.
    async fn add_favorite(&self, auth: &ApiAuth, product_id: &ProductId) -> Result<(), ApiError>;

    /// Unmark a favorite product.
    async fn remove_favorite(&self, auth: &ApiAuth, product_id: &ProductId)
    -> Result<(), ApiError>;

    // Catalog

    /// Catalog data for a single variant.
    async fn variant(&self, variant_id: &VariantId) -> Result<VariantDetails, ApiError>;

    /// A filtered page of products.
    async fn products(&self, filter: &ProductFilter) -> Result<ProductPage, ApiError>;

    /// Product detail with variants.
    async fn product(&self, product_id: &ProductId) -> Result<ProductDetail, ApiError>;

    // Reviews

    /// Reviews for a product, newest first.
    async fn reviews(&self, product_id: &ProductId) -> Result<Vec<Review>, ApiError>;

    /// Post a review as the signed-in user.
    async fn create_review(
        &self,
        auth: &ApiAuth,
        product_id: &ProductId,
        review: &NewReview,
    ) -> Result<Review, ApiError>;

    // Users & checkout

    /// Whether an account is registered for `email`.
    async fn user_exists(&self, email: &Email) -> Result<bool, ApiError>;

    /// Create a payment session for the user's cart.
    async fn create_checkout_session(&self, auth: &ApiAuth) -> Result<CheckoutSession, ApiError>;

    /// Upstream liveness probe.
    async fn health(&self) -> Result<(), ApiError>;
}
