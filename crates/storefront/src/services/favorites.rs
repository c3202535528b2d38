//! Favorites for signed-in users.
//!
//! Favorites live only on the server. Anonymous visitors are told to sign in.

use tracing::{error, instrument};

use larkspur_core::ProductId;

use crate::api::{ApiAuth, StoreApi};
use crate::error::add_breadcrumb;
use crate::services::cart::{CartError, GENERIC_FAILURE};
use crate::services::toast::ToastStack;

const SIGN_IN_PROMPT: &str = "Sign in to save favorites.";

/// Favorites operations for one request.
pub struct FavoritesService<'a> {
    api: &'a dyn StoreApi,
    auth: Option<ApiAuth>,
    toasts: ToastStack,
}

impl<'a> FavoritesService<'a> {
    #[must_use]
    pub const fn new(api: &'a dyn StoreApi, auth: Option<ApiAuth>, toasts: ToastStack) -> Self {
        Self { api, auth, toasts }
    }

    /// Favorite product IDs of the signed-in user. Empty when anonymous.
    ///
    /// # Errors
    ///
    /// Returns the failing API error.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<ProductId>, CartError> {
        let Some(auth) = &self.auth else {
            return Ok(Vec::new());
        };

        let favorites = self.api.favorites(auth).await.map_err(|e| self.fail(e))?;
        Ok(favorites.into_iter().map(|f| f.product_id).collect())
    }

    /// Whether a product is among the user's favorites.
    ///
    /// # Errors
    ///
    /// Returns the failing API error.
    pub async fn is_favorite(&self, product_id: &ProductId) -> Result<bool, CartError> {
        Ok(self.list().await?.contains(product_id))
    }

    /// Flip a product's favorite status. Returns the new status.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotSignedIn`] for anonymous callers, or the
    /// failing API error.
    #[instrument(skip(self))]
    pub async fn toggle(&self, product_id: &ProductId) -> Result<bool, CartError> {
        let Some(auth) = &self.auth else {
            self.toasts.info(SIGN_IN_PROMPT);
            return Err(CartError::NotSignedIn);
        };

        let favorites = self.api.favorites(auth).await.map_err(|e| self.fail(e))?;
        let is_favorite = favorites.iter().any(|f| &f.product_id == product_id);

        if is_favorite {
            self.api
                .remove_favorite(auth, product_id)
                .await
                .map_err(|e| self.fail(e))?;
            self.toasts.info("Removed from favorites");
        } else {
            self.api
                .add_favorite(auth, product_id)
                .await
                .map_err(|e| self.fail(e))?;
            self.toasts.success("Added to favorites");
        }

        add_breadcrumb(
            "favorites",
            if is_favorite { "Unfavorited" } else { "Favorited" },
            Some(&[("product_id", product_id.as_str())]),
        );
        Ok(!is_favorite)
    }

    fn fail(&self, err: crate::api::ApiError) -> CartError {
        error!(error = %err, "Favorites operation failed");
        self.toasts.error(GENERIC_FAILURE);
        err.into()
    }
}
