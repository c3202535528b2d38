//! Wire types for the store REST API.
//!
//! The API speaks camelCase JSON. Quantities coming back from the server are
//! kept as raw integers and only turned into [`Quantity`] at the display edge,
//! so a misbehaving backend can never make deserialization of a whole cart
//! fail.

use core::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use larkspur_core::{Price, ProductId, Quantity, ReviewId, UserId, VariantId};

/// Credentials for user-scoped endpoints.
///
/// Every mutating request carries the identity provider's access token as a
/// bearer token.
#[derive(Clone)]
pub struct ApiAuth {
    /// The signed-in user.
    pub user_id: UserId,
    /// Identity provider access token.
    pub token: SecretString,
}

impl ApiAuth {
    /// Create credentials for a user.
    #[must_use]
    pub fn new(user_id: UserId, token: impl Into<String>) -> Self {
        Self {
            user_id,
            token: SecretString::from(token.into()),
        }
    }

    /// Value of the `Authorization` header.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }
}

impl fmt::Debug for ApiAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiAuth")
            .field("user_id", &self.user_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A line of the server-persisted cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerCartItem {
    pub variant_id: VariantId,
    pub quantity: u32,
}

/// Body of `GET /cart/{user}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CartResponse {
    #[serde(default)]
    pub items: Vec<ServerCartItem>,
}

/// Body of `POST /cart/{user}`: adds `quantity` units to the variant's line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItemRequest {
    pub variant_id: VariantId,
    pub quantity: Quantity,
}

/// Body of `PATCH /cart/{user}/{variant}`: replaces the line quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: Quantity,
}

// =============================================================================
// Catalog
// =============================================================================

/// Catalog data for a purchasable variant, denormalised onto cart lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantDetails {
    pub variant_id: VariantId,
    pub product_id: ProductId,
    pub product_title: String,
    #[serde(default)]
    pub variant_title: Option<String>,
    pub price: Price,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_true")]
    pub in_stock: bool,
}

const fn default_true() -> bool {
    true
}

/// A product as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: ProductId,
    pub title: String,
    pub category: String,
    pub price: Price,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
}

/// A page of products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<ProductSummary>,
    pub page: u32,
    pub total_pages: u32,
}

/// Full product detail with its variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    pub id: ProductId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    pub variants: Vec<VariantDetails>,
    #[serde(default)]
    pub average_rating: Option<f32>,
    #[serde(default)]
    pub review_count: u32,
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
}

impl ProductSort {
    /// Query-string value understood by the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::PriceAsc => "price_asc",
            Self::PriceDesc => "price_desc",
            Self::Rating => "rating",
        }
    }
}

/// Listing filter. Every field is optional; unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub color: Option<String>,
    pub size: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub sort: Option<ProductSort>,
    pub page: Option<u32>,
}

impl ProductFilter {
    /// Query pairs for the API, skipping unset and blank fields.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        let text = [
            ("category", &self.category),
            ("color", &self.color),
            ("size", &self.size),
        ];
        for (key, value) in text {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                pairs.push((key, value.to_string()));
            }
        }
        if let Some(min) = self.min_price {
            pairs.push(("minPrice", min.to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("maxPrice", max.to_string()));
        }
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.as_str().to_string()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        pairs
    }

    /// Whether `min_price` is greater than `max_price`.
    #[must_use]
    pub fn has_inverted_price_range(&self) -> bool {
        matches!((self.min_price, self.max_price), (Some(min), Some(max)) if min > max)
    }
}

// =============================================================================
// Favorites, reviews, users, checkout
// =============================================================================

/// A favorited product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub product_id: ProductId,
}

/// Body of `GET /favorites/{user}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FavoritesResponse {
    #[serde(default)]
    pub favorites: Vec<Favorite>,
}

/// A product review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub author: String,
    pub rating: u8,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /products/{id}/reviews`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReview {
    pub rating: u8,
    pub body: String,
}

/// Body of `GET /users/exists`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UserExistsResponse {
    pub exists: bool,
}

/// Payment session created for the embedded checkout widget.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub client_secret: String,
}

impl fmt::Debug for CheckoutSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutSession")
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cart_response_deserializes_camel_case() {
        let cart: CartResponse =
            serde_json::from_str(r#"{"items":[{"variantId":"V1","quantity":3}]}"#).unwrap();
        assert_eq!(
            cart.items,
            vec![ServerCartItem {
                variant_id: VariantId::new("V1"),
                quantity: 3
            }]
        );
    }

    #[test]
    fn test_cart_response_missing_items_is_empty() {
        let cart: CartResponse = serde_json::from_str("{}").unwrap();
        assert!(cart.items.is_empty());
    }

    #[test]
    fn test_filter_query_pairs_skip_blank_fields() {
        let filter = ProductFilter {
            category: Some("shoes".to_string()),
            color: Some("  ".to_string()),
            min_price: Some(Decimal::new(1000, 2)),
            sort: Some(ProductSort::PriceDesc),
            ..ProductFilter::default()
        };
        assert_eq!(
            filter.query_pairs(),
            vec![
                ("category", "shoes".to_string()),
                ("minPrice", "10.00".to_string()),
                ("sort", "price_desc".to_string()),
            ]
        );
    }

    #[test]
    fn test_filter_inverted_price_range() {
        let filter = ProductFilter {
            min_price: Some(Decimal::new(50, 0)),
            max_price: Some(Decimal::new(10, 0)),
            ..ProductFilter::default()
        };
        assert!(filter.has_inverted_price_range());
        assert!(!ProductFilter::default().has_inverted_price_range());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let auth = ApiAuth::new(UserId::new("u1"), "very-secret-token");
        assert!(!format!("{auth:?}").contains("very-secret-token"));
        assert_eq!(auth.bearer(), "Bearer very-secret-token");

        let session = CheckoutSession {
            client_secret: "pi_secret".to_string(),
        };
        assert!(!format!("{session:?}").contains("pi_secret"));
    }
}
