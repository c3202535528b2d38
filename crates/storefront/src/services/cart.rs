//! Cart operations and local-to-server reconciliation.
//!
//! Signed-in visitors use the server cart exclusively; every mutation is a
//! store API call followed by a fresh fetch. Anonymous visitors get a cart
//! kept in their session. When a visitor signs in, the anonymous cart is
//! merged into the server cart once per authenticated session.
//!
//! Failures are logged and shown as a single error toast. Nothing is written
//! locally before the corresponding network call has succeeded.

use thiserror::Error;
use tower_sessions::Session;
use tracing::{error, info, instrument, warn};

use larkspur_core::{AddPlan, Quantity, QuantityError, VariantId};

use crate::api::{ApiAuth, ApiError, ServerCartItem, StoreApi};
use crate::error::add_breadcrumb;
use crate::models::{CartLine, CartView, LocalCart, session_keys};
use crate::services::toast::ToastStack;

/// Shown for any failed cart or favorites call.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Errors from cart and favorites operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Store API failure.
    #[error("Store API error: {0}")]
    Api(#[from] ApiError),

    /// Session store failure.
    #[error("Session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Invalid quantity requested.
    #[error("Invalid quantity: {0}")]
    Quantity(#[from] QuantityError),

    /// The variant is not in the cart.
    #[error("Not in cart: {0}")]
    NotInCart(VariantId),

    /// The operation needs a signed-in user.
    #[error("Sign in required")]
    NotSignedIn,
}

/// Result of an add-to-cart request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub plan: AddPlan,
    /// Units in the cart afterwards, all lines included.
    pub item_count: u32,
}

/// Result of merging the anonymous cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nobody is signed in.
    NotSignedIn,
    /// This authenticated session already merged its cart.
    AlreadySynced,
    /// The merge ran.
    Synced {
        merged: usize,
        /// Lines that failed and stay in the anonymous cart.
        kept_locally: usize,
    },
}

/// Cart operations for one request.
pub struct CartService<'a> {
    api: &'a dyn StoreApi,
    session: &'a Session,
    auth: Option<ApiAuth>,
    toasts: ToastStack,
}

impl<'a> CartService<'a> {
    /// `auth` selects the server cart; `None` uses the session cart.
    #[must_use]
    pub const fn new(
        api: &'a dyn StoreApi,
        session: &'a Session,
        auth: Option<ApiAuth>,
        toasts: ToastStack,
    ) -> Self {
        Self {
            api,
            session,
            auth,
            toasts,
        }
    }

    /// Add `requested` units of a variant, capped so the line never holds
    /// more than [`Quantity::MAX`].
    ///
    /// `is_syncing` suppresses notices; it is set while merging the
    /// anonymous cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Quantity`] for a zero request, or the failing
    /// API or session error.
    #[instrument(skip(self), fields(signed_in = self.auth.is_some()))]
    pub async fn add_to_cart(
        &self,
        variant_id: &VariantId,
        requested: u32,
        is_syncing: bool,
    ) -> Result<AddOutcome, CartError> {
        let outcome = match &self.auth {
            Some(auth) => self.add_remote(auth, variant_id, requested).await,
            None => self.add_local(variant_id, requested).await,
        }
        .map_err(|e| self.fail(e, is_syncing))?;

        if !is_syncing {
            self.announce(outcome.plan);
            add_breadcrumb(
                "cart",
                "Added to cart",
                Some(&[("variant_id", variant_id.as_str())]),
            );
        }
        Ok(outcome)
    }

    async fn add_remote(
        &self,
        auth: &ApiAuth,
        variant_id: &VariantId,
        requested: u32,
    ) -> Result<AddOutcome, CartError> {
        // Always plan against a fresh copy of the server cart
        let items = self.api.cart(auth).await?;
        let plan = Quantity::plan_add(quantity_in(&items, variant_id), requested)?;

        let items = match plan.added() {
            Some(added) => {
                self.api.add_cart_item(auth, variant_id, added).await?;
                self.api.cart(auth).await?
            }
            None => items,
        };

        Ok(AddOutcome {
            plan,
            item_count: CartView::count_items(&items),
        })
    }

    async fn add_local(
        &self,
        variant_id: &VariantId,
        requested: u32,
    ) -> Result<AddOutcome, CartError> {
        let mut cart = self.local_cart().await?;
        let existing = cart.quantity_of(variant_id);
        let plan = Quantity::plan_add(existing, requested)?;

        if let Some(added) = plan.added() {
            cart.set(variant_id, Quantity::clamped(existing + added.get()));
            self.save_local_cart(&cart).await?;
        }

        Ok(AddOutcome {
            plan,
            item_count: local_count(&cart),
        })
    }

    fn announce(&self, plan: AddPlan) {
        match plan {
            AddPlan::Add(_) => {
                self.toasts.success("Added to cart");
            }
            AddPlan::Capped { added } => {
                self.toasts.caution(format!(
                    "Only {added} more could be added. The limit is {} per item.",
                    Quantity::MAX
                ));
            }
            AddPlan::AtLimit => {
                self.toasts.caution(format!(
                    "You already have the maximum of {} of this item in your cart.",
                    Quantity::MAX
                ));
            }
        }
    }

    /// Set a line's quantity. Values are clamped into `1..=10`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] when the line is missing, or the
    /// failing API or session error.
    #[instrument(skip(self), fields(signed_in = self.auth.is_some()))]
    pub async fn update_quantity(
        &self,
        variant_id: &VariantId,
        requested: u32,
    ) -> Result<u32, CartError> {
        let quantity = Quantity::clamped(requested);
        let result = match &self.auth {
            Some(auth) => self.update_remote(auth, variant_id, quantity).await,
            None => self.update_local(variant_id, quantity).await,
        };

        let count = result.map_err(|e| self.fail(e, false))?;
        if requested > Quantity::MAX {
            self.toasts.caution(format!(
                "The limit is {} per item. Quantity set to {}.",
                Quantity::MAX,
                Quantity::MAX
            ));
        }
        Ok(count)
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotInCart`] when the line is absent, otherwise the
    /// failing API or session error.
    #[instrument(skip(self), fields(signed_in = self.auth.is_some()))]
    pub async fn remove(&self, variant_id: &VariantId) -> Result<u32, CartError> {
        let result = match &self.auth {
            Some(auth) => self.remove_remote(auth, variant_id).await,
            None => self.remove_local(variant_id).await,
        };

        let count = result.map_err(|e| self.fail(e, false))?;
        add_breadcrumb(
            "cart",
            "Removed from cart",
            Some(&[("variant_id", variant_id.as_str())]),
        );
        Ok(count)
    }

    async fn update_remote(
        &self,
        auth: &ApiAuth,
        variant_id: &VariantId,
        quantity: Quantity,
    ) -> Result<u32, CartError> {
        match self.api.update_cart_item(auth, variant_id, quantity).await {
            Ok(()) => {}
            Err(ApiError::NotFound(_)) => return Err(CartError::NotInCart(variant_id.clone())),
            Err(e) => return Err(e.into()),
        }
        Ok(CartView::count_items(&self.api.cart(auth).await?))
    }

    async fn update_local(
        &self,
        variant_id: &VariantId,
        quantity: Quantity,
    ) -> Result<u32, CartError> {
        let mut cart = self.local_cart().await?;
        if cart.quantity_of(variant_id) == 0 {
            return Err(CartError::NotInCart(variant_id.clone()));
        }
        cart.set(variant_id, quantity);
        self.save_local_cart(&cart).await?;
        Ok(local_count(&cart))
    }

    async fn remove_remote(&self, auth: &ApiAuth, variant_id: &VariantId) -> Result<u32, CartError> {
        match self.api.remove_cart_item(auth, variant_id).await {
            Ok(()) => {}
            Err(ApiError::NotFound(_)) => return Err(CartError::NotInCart(variant_id.clone())),
            Err(e) => return Err(e.into()),
        }
        Ok(CartView::count_items(&self.api.cart(auth).await?))
    }

    async fn remove_local(&self, variant_id: &VariantId) -> Result<u32, CartError> {
        let mut cart = self.local_cart().await?;
        if !cart.remove(variant_id) {
            return Err(CartError::NotInCart(variant_id.clone()));
        }
        self.save_local_cart(&cart).await?;
        Ok(local_count(&cart))
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns the failing API or session error.
    #[instrument(skip(self), fields(signed_in = self.auth.is_some()))]
    pub async fn clear(&self) -> Result<(), CartError> {
        let result = match &self.auth {
            Some(auth) => self.api.clear_cart(auth).await.map_err(CartError::from),
            None => self
                .session
                .remove::<LocalCart>(session_keys::LOCAL_CART)
                .await
                .map(|_| ())
                .map_err(CartError::from),
        };
        result.map_err(|e| self.fail(e, false))
    }

    /// Current cart lines with catalog data.
    ///
    /// Lines whose variant no longer exists in the catalog are skipped.
    ///
    /// # Errors
    ///
    /// Returns the failing API or session error.
    #[instrument(skip(self), fields(signed_in = self.auth.is_some()))]
    pub async fn view(&self) -> Result<CartView, CartError> {
        let entries = self.entries().await.map_err(|e| self.fail(e, false))?;

        let mut lines = Vec::with_capacity(entries.len());
        for (variant_id, quantity) in entries {
            match self.api.variant(&variant_id).await {
                Ok(details) => lines.push(CartLine::new(details, quantity)),
                Err(ApiError::NotFound(_)) => {
                    warn!(variant_id = %variant_id, "Cart line refers to an unknown variant");
                }
                Err(e) => return Err(self.fail(e.into(), false)),
            }
        }

        Ok(CartView::from_lines(lines))
    }

    /// Number of units in the cart, for the header badge.
    ///
    /// # Errors
    ///
    /// Returns the failing API or session error.
    pub async fn item_count(&self) -> Result<u32, CartError> {
        let entries = self.entries().await?;
        Ok(entries.iter().map(|(_, q)| q.get()).sum())
    }

    async fn entries(&self) -> Result<Vec<(VariantId, Quantity)>, CartError> {
        Ok(match &self.auth {
            Some(auth) => self
                .api
                .cart(auth)
                .await?
                .into_iter()
                .map(|item| (item.variant_id, Quantity::clamped(item.quantity)))
                .collect(),
            None => self
                .local_cart()
                .await?
                .items
                .into_iter()
                .map(|item| (item.variant_id, item.quantity))
                .collect(),
        })
    }

    /// Merge the anonymous cart into the signed-in user's server cart.
    ///
    /// A session flag is set before the first item is sent, so a later
    /// trigger that sees the saved flag is a no-op. Two requests that load
    /// the session before either saves it can both run the merge. Each item goes through [`CartService::add_to_cart`] in sync
    /// mode, which re-derives the cap against the current server cart.
    /// Items that fail stay in the anonymous cart.
    ///
    /// # Errors
    ///
    /// Returns an error only if the session store fails.
    #[instrument(skip(self))]
    pub async fn sync_local_cart_with_server(&self) -> Result<SyncOutcome, CartError> {
        if self.auth.is_none() {
            return Ok(SyncOutcome::NotSignedIn);
        }

        if self
            .session
            .get::<bool>(session_keys::CART_SYNCED)
            .await?
            .unwrap_or(false)
        {
            return Ok(SyncOutcome::AlreadySynced);
        }
        self.session.insert(session_keys::CART_SYNCED, true).await?;

        let local = self.local_cart().await?;
        let mut kept = LocalCart::default();
        let mut merged = 0;

        for item in local.items {
            match self
                .add_to_cart(&item.variant_id, item.quantity.get(), true)
                .await
            {
                Ok(_) => merged += 1,
                Err(e) => {
                    warn!(variant_id = %item.variant_id, error = %e, "Failed to merge cart line");
                    kept.items.push(item);
                }
            }
        }

        // Clear only after the loop; failed lines remain
        self.save_local_cart(&kept).await?;

        if !kept.is_empty() {
            self.toasts.error(GENERIC_FAILURE);
        }
        info!(merged, kept_locally = kept.items.len(), "Merged anonymous cart");

        Ok(SyncOutcome::Synced {
            merged,
            kept_locally: kept.items.len(),
        })
    }

    async fn local_cart(&self) -> Result<LocalCart, CartError> {
        Ok(self
            .session
            .get::<LocalCart>(session_keys::LOCAL_CART)
            .await?
            .unwrap_or_default())
    }

    async fn save_local_cart(&self, cart: &LocalCart) -> Result<(), CartError> {
        if cart.is_empty() {
            self.session
                .remove::<LocalCart>(session_keys::LOCAL_CART)
                .await?;
        } else {
            self.session.insert(session_keys::LOCAL_CART, cart).await?;
        }
        Ok(())
    }

    /// Log a failure and, unless quiet, show the generic failure toast.
    fn fail(&self, err: CartError, quiet: bool) -> CartError {
        if matches!(err, CartError::Api(_) | CartError::Session(_)) {
            error!(error = %err, "Cart operation failed");
            if !quiet {
                self.toasts.error(GENERIC_FAILURE);
            }
        }
        err
    }
}

fn quantity_in(items: &[ServerCartItem], variant_id: &VariantId) -> u32 {
    items
        .iter()
        .find(|item| &item.variant_id == variant_id)
        .map_or(0, |item| item.quantity)
}

fn local_count(cart: &LocalCart) -> u32 {
    cart.items.iter().map(|item| item.quantity.get()).sum()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tower_sessions::MemoryStore;

    use larkspur_core::UserId;

    use super::*;
    use crate::services::toast::ToastKind;
    use crate::testing::FakeStoreApi;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn auth() -> ApiAuth {
        ApiAuth::new(UserId::new("u-1"), "token")
    }

    fn api() -> FakeStoreApi {
        let api = FakeStoreApi::new();
        api.add_variant("V1", "P1", "Linen Shirt", 4500);
        api.add_variant("V2", "P2", "Canvas Tote", 1800);
        api
    }

    fn toasts() -> ToastStack {
        ToastStack::new(Duration::from_secs(3))
    }

    fn v(id: &str) -> VariantId {
        VariantId::new(id)
    }

    #[tokio::test]
    async fn test_local_add_accumulates() {
        let api = api();
        let session = session();
        let cart = CartService::new(&api, &session, None, toasts());

        cart.add_to_cart(&v("V1"), 2, false).await.unwrap();
        let outcome = cart.add_to_cart(&v("V1"), 3, false).await.unwrap();

        assert_eq!(outcome.item_count, 5);
        assert_eq!(api.write_count(), 0);
    }

    #[tokio::test]
    async fn test_local_add_caps_at_limit() {
        let api = api();
        let session = session();
        let toasts = toasts();
        let cart = CartService::new(&api, &session, None, toasts.clone());

        cart.add_to_cart(&v("V1"), 8, false).await.unwrap();
        let capped = cart.add_to_cart(&v("V1"), 5, false).await.unwrap();
        assert_eq!(
            capped.plan,
            AddPlan::Capped {
                added: Quantity::new(2).unwrap()
            }
        );
        assert_eq!(capped.item_count, 10);

        let at_limit = cart.add_to_cart(&v("V1"), 1, false).await.unwrap();
        assert_eq!(at_limit.plan, AddPlan::AtLimit);
        assert_eq!(at_limit.item_count, 10);

        let kinds: Vec<_> = toasts.visible().into_iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            [ToastKind::Success, ToastKind::Caution, ToastKind::Caution]
        );
    }

    #[tokio::test]
    async fn test_zero_quantity_is_rejected() {
        let api = api();
        let session = session();
        let cart = CartService::new(&api, &session, Some(auth()), toasts());

        let err = cart.add_to_cart(&v("V1"), 0, false).await.unwrap_err();
        assert!(matches!(err, CartError::Quantity(QuantityError::Zero)));
        assert_eq!(api.write_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_add_plans_against_server_cart() {
        let api = api();
        let session = session();
        api.set_cart(
            &auth().user_id,
            vec![ServerCartItem {
                variant_id: v("V1"),
                quantity: 9,
            }],
        );
        let cart = CartService::new(&api, &session, Some(auth()), toasts());

        let outcome = cart.add_to_cart(&v("V1"), 4, false).await.unwrap();

        assert_eq!(
            outcome.plan,
            AddPlan::Capped {
                added: Quantity::ONE
            }
        );
        assert_eq!(api.cart_of(&auth().user_id)[0].quantity, 10);
    }

    #[tokio::test]
    async fn test_remote_at_limit_makes_no_write() {
        let api = api();
        let session = session();
        api.set_cart(
            &auth().user_id,
            vec![ServerCartItem {
                variant_id: v("V1"),
                quantity: 10,
            }],
        );
        let cart = CartService::new(&api, &session, Some(auth()), toasts());

        let outcome = cart.add_to_cart(&v("V1"), 1, false).await.unwrap();
        assert_eq!(outcome.plan, AddPlan::AtLimit);
        assert_eq!(api.write_count(), 0);
    }

    #[tokio::test]
    async fn test_api_failure_shows_one_error_toast() {
        let api = api();
        api.set_unavailable(true);
        let session = session();
        let toasts = toasts();
        let cart = CartService::new(&api, &session, Some(auth()), toasts.clone());

        assert!(cart.add_to_cart(&v("V1"), 1, false).await.is_err());

        let visible = toasts.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].kind, ToastKind::Error);
        assert_eq!(visible[0].message, GENERIC_FAILURE);
    }

    #[tokio::test]
    async fn test_update_quantity_clamps() {
        let api = api();
        let session = session();
        let toasts = toasts();
        let cart = CartService::new(&api, &session, None, toasts.clone());
        cart.add_to_cart(&v("V1"), 1, true).await.unwrap();

        assert_eq!(cart.update_quantity(&v("V1"), 25).await.unwrap(), 10);
        assert_eq!(toasts.visible()[0].kind, ToastKind::Caution);
        assert_eq!(cart.update_quantity(&v("V1"), 0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_line() {
        let api = api();
        let session = session();
        let cart = CartService::new(&api, &session, None, toasts());

        let err = cart.update_quantity(&v("V9"), 2).await.unwrap_err();
        assert!(matches!(err, CartError::NotInCart(id) if id == v("V9")));
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let api = api();
        let session = session();
        let cart = CartService::new(&api, &session, Some(auth()), toasts());
        cart.add_to_cart(&v("V1"), 2, true).await.unwrap();
        cart.add_to_cart(&v("V2"), 1, true).await.unwrap();

        assert_eq!(cart.remove(&v("V1")).await.unwrap(), 1);
        cart.clear().await.unwrap();
        assert!(api.cart_of(&auth().user_id).is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing_line_is_not_in_cart() {
        let api = api();
        let session = session();
        let toasts = toasts();

        let local = CartService::new(&api, &session, None, toasts.clone());
        local.add_to_cart(&v("V1"), 1, true).await.unwrap();
        assert_eq!(local.remove(&v("V1")).await.unwrap(), 0);
        let err = local.remove(&v("V1")).await.unwrap_err();
        assert!(matches!(err, CartError::NotInCart(id) if id == v("V1")));

        let remote = CartService::new(&api, &session, Some(auth()), toasts.clone());
        remote.add_to_cart(&v("V2"), 1, true).await.unwrap();
        assert_eq!(remote.remove(&v("V2")).await.unwrap(), 0);
        let err = remote.remove(&v("V2")).await.unwrap_err();
        assert!(matches!(err, CartError::NotInCart(id) if id == v("V2")));

        assert!(toasts.visible().iter().all(|t| t.kind != ToastKind::Error));
    }

    #[tokio::test]
    async fn test_view_joins_catalog_data() {
        let api = api();
        let session = session();
        let cart = CartService::new(&api, &session, None, toasts());
        cart.add_to_cart(&v("V1"), 2, true).await.unwrap();
        cart.add_to_cart(&v("GONE"), 1, true).await.unwrap();

        let view = cart.view().await.unwrap();
        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].product_title, "Linen Shirt");
        assert_eq!(view.subtotal.unwrap().display(), "$90.00");
    }

    #[tokio::test]
    async fn test_sync_moves_local_cart_to_server() {
        let api = api();
        let session = session();

        let anonymous = CartService::new(&api, &session, None, toasts());
        anonymous.add_to_cart(&v("V1"), 3, false).await.unwrap();

        let signed_in = CartService::new(&api, &session, Some(auth()), toasts());
        let outcome = signed_in.sync_local_cart_with_server().await.unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Synced {
                merged: 1,
                kept_locally: 0
            }
        );
        assert_eq!(
            api.cart_of(&auth().user_id),
            vec![ServerCartItem {
                variant_id: v("V1"),
                quantity: 3
            }]
        );
        assert_eq!(
            session
                .get::<LocalCart>(session_keys::LOCAL_CART)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_sync_runs_once() {
        let api = api();
        let session = session();
        CartService::new(&api, &session, None, toasts())
            .add_to_cart(&v("V1"), 3, false)
            .await
            .unwrap();

        let signed_in = CartService::new(&api, &session, Some(auth()), toasts());
        signed_in.sync_local_cart_with_server().await.unwrap();

        // Something lands in the local cart again; a second trigger must not merge it
        session
            .insert(
                session_keys::LOCAL_CART,
                LocalCart {
                    items: vec![crate::models::LocalCartItem {
                        variant_id: v("V1"),
                        quantity: Quantity::new(3).unwrap(),
                    }],
                },
            )
            .await
            .unwrap();

        let second = signed_in.sync_local_cart_with_server().await.unwrap();
        assert_eq!(second, SyncOutcome::AlreadySynced);
        assert_eq!(api.cart_of(&auth().user_id)[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_sync_caps_against_existing_server_cart() {
        let api = api();
        let session = session();
        api.set_cart(
            &auth().user_id,
            vec![ServerCartItem {
                variant_id: v("V1"),
                quantity: 8,
            }],
        );
        CartService::new(&api, &session, None, toasts())
            .add_to_cart(&v("V1"), 5, false)
            .await
            .unwrap();

        let toasts = toasts();
        CartService::new(&api, &session, Some(auth()), toasts.clone())
            .sync_local_cart_with_server()
            .await
            .unwrap();

        assert_eq!(api.cart_of(&auth().user_id)[0].quantity, 10);
        // Sync mode is silent
        assert!(toasts.visible().is_empty());
    }

    #[tokio::test]
    async fn test_sync_keeps_failed_items_locally() {
        let api = api();
        api.fail_adds_of("V2");
        let session = session();
        let anonymous = CartService::new(&api, &session, None, toasts());
        anonymous.add_to_cart(&v("V1"), 1, false).await.unwrap();
        anonymous.add_to_cart(&v("V2"), 2, false).await.unwrap();

        let toasts = toasts();
        let outcome = CartService::new(&api, &session, Some(auth()), toasts.clone())
            .sync_local_cart_with_server()
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Synced {
                merged: 1,
                kept_locally: 1
            }
        );
        let local = session
            .get::<LocalCart>(session_keys::LOCAL_CART)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(local.quantity_of(&v("V2")), 2);
        assert_eq!(local.quantity_of(&v("V1")), 0);
        assert_eq!(toasts.visible().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_without_user_is_skipped() {
        let api = api();
        let session = session();
        let cart = CartService::new(&api, &session, None, toasts());
        assert_eq!(
            cart.sync_local_cart_with_server().await.unwrap(),
            SyncOutcome::NotSignedIn
        );
    }
}
