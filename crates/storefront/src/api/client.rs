//! HTTP implementation of [`StoreApi`].
//!
//! Uses `reqwest` for JSON over HTTP.
//! Caches variants, product detail and product listings using `moka`
//! (5-minute TTL).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use larkspur_core::{Email, ProductId, Quantity, VariantId};

use super::cache::{CacheKey, CacheValue};
use super::types::{
    AddCartItemRequest, ApiAuth, CartResponse, CheckoutSession, Favorite, FavoritesResponse,
    NewReview, ProductDetail, ProductFilter, ProductPage, Review, ServerCartItem,
    UpdateCartItemRequest, UserExistsResponse, VariantDetails,
};
use super::{ApiError, StoreApi};
use crate::config::StoreApiConfig;

/// Client for the store REST API.
#[derive(Clone)]
pub struct StoreApiClient {
    inner: Arc<StoreApiClientInner>,
}

struct StoreApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    cache: Cache<CacheKey, CacheValue>,
}

impl StoreApiClient {
    /// Create a new store API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &StoreApiConfig) -> Result<Self, ApiError> {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("larkspur-storefront/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(StoreApiClientInner {
                client,
                base_url: config.base_url.clone(),
                cache,
            }),
        })
    }

    /// Build an endpoint URL from path segments. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, auth: Option<&ApiAuth>) -> RequestBuilder {
        let builder = self.inner.client.request(method, url);
        match auth {
            Some(auth) => builder.header(reqwest::header::AUTHORIZATION, auth.bearer()),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body.
    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send(builder).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse store API response"
            );
            ApiError::Parse(e.to_string())
        })
    }

    /// Send a request, map error statuses and return the raw body.
    async fn send(&self, builder: RequestBuilder) -> Result<String, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        let path = response.url().path().to_string();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ApiError::RateLimited(retry_after));
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(path));
        }

        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                path = %path,
                body = %body.chars().take(500).collect::<String>(),
                "Store API returned non-success status"
            );
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl StoreApi for StoreApiClient {
    // =========================================================================
    // Cart Methods
    // =========================================================================

    #[instrument(skip(self, auth), fields(user_id = %auth.user_id))]
    async fn cart(&self, auth: &ApiAuth) -> Result<Vec<ServerCartItem>, ApiError> {
        let url = self.endpoint(&["cart", auth.user_id.as_str()])?;
        let cart: CartResponse = self
            .send_json(self.request(Method::GET, url, Some(auth)))
            .await?;
        Ok(cart.items)
    }

    #[instrument(skip(self, auth), fields(user_id = %auth.user_id, variant_id = %variant_id))]
    async fn add_cart_item(
        &self,
        auth: &ApiAuth,
        variant_id: &VariantId,
        quantity: Quantity,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&["cart", auth.user_id.as_str()])?;
        let body = AddCartItemRequest {
            variant_id: variant_id.clone(),
            quantity,
        };
        self.send(self.request(Method::POST, url, Some(auth)).json(&body))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, auth), fields(user_id = %auth.user_id, variant_id = %variant_id))]
    async fn update_cart_item(
        &self,
        auth: &ApiAuth,
        variant_id: &VariantId,
        quantity: Quantity,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&["cart", auth.user_id.as_str(), variant_id.as_str()])?;
        let body = UpdateCartItemRequest { quantity };
        self.send(self.request(Method::PATCH, url, Some(auth)).json(&body))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, auth), fields(user_id = %auth.user_id, variant_id = %variant_id))]
    async fn remove_cart_item(
        &self,
        auth: &ApiAuth,
        variant_id: &VariantId,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&["cart", auth.user_id.as_str(), variant_id.as_str()])?;
        self.send(self.request(Method::DELETE, url, Some(auth)))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, auth), fields(user_id = %auth.user_id))]
    async fn clear_cart(&self, auth: &ApiAuth) -> Result<(), ApiError> {
        let url = self.endpoint(&["cart", auth.user_id.as_str()])?;
        self.send(self.request(Method::DELETE, url, Some(auth)))
            .await?;
        Ok(())
    }

    // =========================================================================
    // Favorites Methods
    // =========================================================================

    #[instrument(skip(self, auth), fields(user_id = %auth.user_id))]
    async fn favorites(&self, auth: &ApiAuth) -> Result<Vec<Favorite>, ApiError> {
        let url = self.endpoint(&["favorites", auth.user_id.as_str()])?;
        let response: FavoritesResponse = self
            .send_json(self.request(Method::GET, url, Some(auth)))
            .await?;
        Ok(response.favorites)
    }

    #[instrument(skip(self, auth), fields(user_id = %auth.user_id, product_id = %product_id))]
    async fn add_favorite(&self, auth: &ApiAuth, product_id: &ProductId) -> Result<(), ApiError> {
        let url = self.endpoint(&["favorites", auth.user_id.as_str(), product_id.as_str()])?;
        self.send(self.request(Method::POST, url, Some(auth)))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, auth), fields(user_id = %auth.user_id, product_id = %product_id))]
    async fn remove_favorite(
        &self,
        auth: &ApiAuth,
        product_id: &ProductId,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&["favorites", auth.user_id.as_str(), product_id.as_str()])?;
        self.send(self.request(Method::DELETE, url, Some(auth)))
            .await?;
        Ok(())
    }

    // =========================================================================
    // Catalog Methods
    // =========================================================================

    #[instrument(skip(self), fields(variant_id = %variant_id))]
    async fn variant(&self, variant_id: &VariantId) -> Result<VariantDetails, ApiError> {
        let cache_key = CacheKey::Variant(variant_id.clone());

        if let Some(CacheValue::Variant(variant)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for variant");
            return Ok(*variant);
        }

        let url = self.endpoint(&["variants", variant_id.as_str()])?;
        let variant: VariantDetails = self
            .send_json(self.request(Method::GET, url, None))
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Variant(Box::new(variant.clone())))
            .await;

        Ok(variant)
    }

    #[instrument(skip(self))]
    async fn products(&self, filter: &ProductFilter) -> Result<ProductPage, ApiError> {
        let cache_key = CacheKey::Products(filter.clone());

        if let Some(CacheValue::Products(page)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for products");
            return Ok(page);
        }

        let url = self.endpoint(&["products"])?;
        let page: ProductPage = self
            .send_json(
                self.request(Method::GET, url, None)
                    .query(&filter.query_pairs()),
            )
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(page.clone()))
            .await;

        Ok(page)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn product(&self, product_id: &ProductId) -> Result<ProductDetail, ApiError> {
        let cache_key = CacheKey::Product(product_id.clone());

        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let url = self.endpoint(&["products", product_id.as_str()])?;
        let product: ProductDetail = self
            .send_json(self.request(Method::GET, url, None))
            .await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;

        Ok(product)
    }

    // =========================================================================
    // Review Methods
    // =========================================================================

    #[instrument(skip(self), fields(product_id = %product_id))]
    async fn reviews(&self, product_id: &ProductId) -> Result<Vec<Review>, ApiError> {
        let url = self.endpoint(&["products", product_id.as_str(), "reviews"])?;
        self.send_json(self.request(Method::GET, url, None)).await
    }

    #[instrument(skip(self, auth, review), fields(user_id = %auth.user_id, product_id = %product_id))]
    async fn create_review(
        &self,
        auth: &ApiAuth,
        product_id: &ProductId,
        review: &NewReview,
    ) -> Result<Review, ApiError> {
        let url = self.endpoint(&["products", product_id.as_str(), "reviews"])?;
        let created: Review = self
            .send_json(self.request(Method::POST, url, Some(auth)).json(review))
            .await?;

        // Rating summary on the product detail is now stale
        self.inner
            .cache
            .invalidate(&CacheKey::Product(product_id.clone()))
            .await;

        Ok(created)
    }

    // =========================================================================
    // User & Checkout Methods
    // =========================================================================

    #[instrument(skip(self, email))]
    async fn user_exists(&self, email: &Email) -> Result<bool, ApiError> {
        let url = self.endpoint(&["users", "exists"])?;
        let response: UserExistsResponse = self
            .send_json(
                self.request(Method::GET, url, None)
                    .query(&[("email", email.as_str())]),
            )
            .await?;
        Ok(response.exists)
    }

    #[instrument(skip(self, auth), fields(user_id = %auth.user_id))]
    async fn create_checkout_session(&self, auth: &ApiAuth) -> Result<CheckoutSession, ApiError> {
        let url = self.endpoint(&["checkout", auth.user_id.as_str()])?;
        self.send_json(self.request(Method::POST, url, Some(auth)))
            .await
    }

    async fn health(&self) -> Result<(), ApiError> {
        let url = self.endpoint(&["health"])?;
        self.send(self.request(Method::GET, url, None)).await?;
        Ok(())
    }
}
