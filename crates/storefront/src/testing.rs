//! In-memory fakes of the store API and identity provider.
//!
//! Available to unit tests and, through the `test-util` feature, to the
//! integration test crate.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use larkspur_core::{
    CurrencyCode, Email, Password, Price, ProductId, Quantity, ReviewId, UserId, VariantId,
    VerificationCode,
};

use crate::api::{
    ApiAuth, ApiError, CheckoutSession, Favorite, NewReview, ProductDetail, ProductFilter,
    ProductPage, ProductSummary, Review, ServerCartItem, StoreApi, VariantDetails,
};
use crate::config::{IdentityConfig, PaymentsConfig, StoreApiConfig, StorefrontConfig};
use crate::identity::{
    AuthTokens, CodeDelivery, ErrorName, IdentityError, IdentityProvider, ResetNextStep,
    SignUpNextStep, UserProfile,
};

/// Code the fake identity provider sends for every verification.
pub const FAKE_CODE: &str = "123456";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Configuration suitable for tests. Nothing in it is contacted.
#[must_use]
#[allow(clippy::missing_panics_doc)]
pub fn test_config() -> StorefrontConfig {
    let timeout = Duration::from_secs(5);
    #[allow(clippy::unwrap_used)]
    let local = |port: u16| Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();

    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/larkspur_test"),
        host: std::net::IpAddr::from([127, 0, 0, 1]),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        session_secret: SecretString::from("k".repeat(64)),
        api: StoreApiConfig {
            base_url: local(4000),
            timeout,
        },
        identity: IdentityConfig {
            region: "us-east-1".to_string(),
            client_id: "test-client".to_string(),
            endpoint: local(4001),
            timeout,
        },
        payments: PaymentsConfig {
            publishable_key: "pk_test_larkspur".to_string(),
        },
        toast_timeout: Duration::from_secs(3),
        sentry_dsn: None,
        sentry_environment: "test".to_string(),
    }
}

// =============================================================================
// Store API
// =============================================================================

/// In-memory store API.
#[derive(Default)]
pub struct FakeStoreApi {
    carts: Mutex<HashMap<UserId, Vec<ServerCartItem>>>,
    favorites: Mutex<HashMap<UserId, Vec<ProductId>>>,
    variants: Mutex<HashMap<VariantId, VariantDetails>>,
    products: Mutex<Vec<ProductDetail>>,
    reviews: Mutex<Vec<Review>>,
    users: Mutex<HashSet<Email>>,
    failing_variants: Mutex<HashSet<VariantId>>,
    fail_all: AtomicBool,
    next_review: AtomicU64,
    writes: AtomicUsize,
}

impl FakeStoreApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a purchasable variant (and its product).
    pub fn add_variant(&self, variant_id: &str, product_id: &str, title: &str, cents: i64) {
        let details = VariantDetails {
            variant_id: VariantId::new(variant_id),
            product_id: ProductId::new(product_id),
            product_title: title.to_string(),
            variant_title: None,
            price: Price::new(Decimal::new(cents, 2), CurrencyCode::USD),
            image_url: None,
            in_stock: true,
        };

        let mut products = lock(&self.products);
        match products.iter_mut().find(|p| p.id.as_str() == product_id) {
            Some(product) => product.variants.push(details.clone()),
            None => products.push(ProductDetail {
                id: ProductId::new(product_id),
                title: title.to_string(),
                description: String::new(),
                category: "general".to_string(),
                variants: vec![details.clone()],
                average_rating: None,
                review_count: 0,
            }),
        }
        lock(&self.variants).insert(details.variant_id.clone(), details);
    }

    /// Register an existing account.
    pub fn add_user(&self, email: &Email) {
        lock(&self.users).insert(email.clone());
    }

    /// Seed a server cart.
    pub fn set_cart(&self, user_id: &UserId, items: Vec<ServerCartItem>) {
        lock(&self.carts).insert(user_id.clone(), items);
    }

    /// The server cart for a user.
    #[must_use]
    pub fn cart_of(&self, user_id: &UserId) -> Vec<ServerCartItem> {
        lock(&self.carts).get(user_id).cloned().unwrap_or_default()
    }

    /// Favorite product IDs for a user.
    #[must_use]
    pub fn favorites_of(&self, user_id: &UserId) -> Vec<ProductId> {
        lock(&self.favorites)
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Make adds of this variant fail with a 500.
    pub fn fail_adds_of(&self, variant_id: &str) {
        lock(&self.failing_variants).insert(VariantId::new(variant_id));
    }

    /// Make every call fail with a 503 (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.fail_all.store(unavailable, Ordering::SeqCst);
    }

    /// Number of mutating calls received.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> Result<(), ApiError> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(())
    }

    fn write(&self) -> Result<(), ApiError> {
        self.check_available()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl StoreApi for FakeStoreApi {
    async fn cart(&self, auth: &ApiAuth) -> Result<Vec<ServerCartItem>, ApiError> {
        self.check_available()?;
        Ok(self.cart_of(&auth.user_id))
    }

    async fn add_cart_item(
        &self,
        auth: &ApiAuth,
        variant_id: &VariantId,
        quantity: Quantity,
    ) -> Result<(), ApiError> {
        self.write()?;
        if lock(&self.failing_variants).contains(variant_id) {
            return Err(ApiError::Status {
                status: 500,
                message: "add failed".to_string(),
            });
        }

        let mut carts = lock(&self.carts);
        let cart = carts.entry(auth.user_id.clone()).or_default();
        match cart.iter_mut().find(|item| &item.variant_id == variant_id) {
            Some(item) => item.quantity += quantity.get(),
            None => cart.push(ServerCartItem {
                variant_id: variant_id.clone(),
                quantity: quantity.get(),
            }),
        }
        Ok(())
    }

    async fn update_cart_item(
        &self,
        auth: &ApiAuth,
        variant_id: &VariantId,
        quantity: Quantity,
    ) -> Result<(), ApiError> {
        self.write()?;
        let mut carts = lock(&self.carts);
        carts
            .get_mut(&auth.user_id)
            .and_then(|cart| cart.iter_mut().find(|item| &item.variant_id == variant_id))
            .map(|item| item.quantity = quantity.get())
            .ok_or_else(|| ApiError::NotFound(format!("/cart/{}/{variant_id}", auth.user_id)))
    }

    async fn remove_cart_item(
        &self,
        auth: &ApiAuth,
        variant_id: &VariantId,
    ) -> Result<(), ApiError> {
        self.write()?;
        let mut carts = lock(&self.carts);
        let cart = carts.get_mut(&auth.user_id);
        let before = cart.as_ref().map_or(0, |cart| cart.len());
        if let Some(cart) = cart {
            cart.retain(|item| &item.variant_id != variant_id);
            if cart.len() < before {
                return Ok(());
            }
        }
        Err(ApiError::NotFound(format!("/cart/{}/{variant_id}", auth.user_id)))
    }

    async fn clear_cart(&self, auth: &ApiAuth) -> Result<(), ApiError> {
        self.write()?;
        lock(&self.carts).remove(&auth.user_id);
        Ok(())
    }

    async fn favorites(&self, auth: &ApiAuth) -> Result<Vec<Favorite>, ApiError> {
        self.check_available()?;
        Ok(self
            .favorites_of(&auth.user_id)
            .into_iter()
            .map(|product_id| Favorite { product_id })
            .collect())
    }

    async fn add_favorite(&self, auth: &ApiAuth, product_id: &ProductId) -> Result<(), ApiError> {
        self.write()?;
        let mut favorites = lock(&self.favorites);
        let list = favorites.entry(auth.user_id.clone()).or_default();
        if !list.contains(product_id) {
            list.push(product_id.clone());
        }
        Ok(())
    }

    async fn remove_favorite(
        &self,
        auth: &ApiAuth,
        product_id: &ProductId,
    ) -> Result<(), ApiError> {
        self.write()?;
        if let Some(list) = lock(&self.favorites).get_mut(&auth.user_id) {
            list.retain(|p| p != product_id);
        }
        Ok(())
    }

    async fn variant(&self, variant_id: &VariantId) -> Result<VariantDetails, ApiError> {
        self.check_available()?;
        lock(&self.variants)
            .get(variant_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("/variants/{variant_id}")))
    }

    async fn products(&self, filter: &ProductFilter) -> Result<ProductPage, ApiError> {
        self.check_available()?;
        let products = lock(&self.products)
            .iter()
            .filter(|p| filter.category.as_ref().is_none_or(|c| &p.category == c))
            .filter_map(|p| {
                let variant = p.variants.first()?;
                let amount = variant.price.amount;
                let in_range = filter.min_price.is_none_or(|min| amount >= min)
                    && filter.max_price.is_none_or(|max| amount <= max);
                in_range.then(|| ProductSummary {
                    id: p.id.clone(),
                    title: p.title.clone(),
                    category: p.category.clone(),
                    price: variant.price,
                    image_url: None,
                    colors: Vec::new(),
                    sizes: Vec::new(),
                })
            })
            .collect();

        Ok(ProductPage {
            products,
            page: filter.page.unwrap_or(1),
            total_pages: 1,
        })
    }

    async fn product(&self, product_id: &ProductId) -> Result<ProductDetail, ApiError> {
        self.check_available()?;
        lock(&self.products)
            .iter()
            .find(|p| &p.id == product_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("/products/{product_id}")))
    }

    async fn reviews(&self, product_id: &ProductId) -> Result<Vec<Review>, ApiError> {
        self.check_available()?;
        Ok(lock(&self.reviews)
            .iter()
            .rev()
            .filter(|r| &r.product_id == product_id)
            .cloned()
            .collect())
    }

    async fn create_review(
        &self,
        auth: &ApiAuth,
        product_id: &ProductId,
        review: &NewReview,
    ) -> Result<Review, ApiError> {
        self.write()?;
        let id = self.next_review.fetch_add(1, Ordering::SeqCst) + 1;
        let created = Review {
            id: ReviewId::new(format!("R{id}")),
            product_id: product_id.clone(),
            author: auth.user_id.to_string(),
            rating: review.rating,
            body: review.body.clone(),
            created_at: Utc::now(),
        };
        lock(&self.reviews).push(created.clone());
        Ok(created)
    }

    async fn user_exists(&self, email: &Email) -> Result<bool, ApiError> {
        self.check_available()?;
        Ok(lock(&self.users).contains(email))
    }

    async fn create_checkout_session(&self, auth: &ApiAuth) -> Result<CheckoutSession, ApiError> {
        self.write()?;
        if self.cart_of(&auth.user_id).is_empty() {
            return Err(ApiError::Status {
                status: 400,
                message: "cart is empty".to_string(),
            });
        }
        Ok(CheckoutSession {
            client_secret: format!("cs_test_{}", auth.user_id),
        })
    }

    async fn health(&self) -> Result<(), ApiError> {
        self.check_available()
    }
}

// =============================================================================
// Identity provider
// =============================================================================

struct FakeAccount {
    id: UserId,
    password: String,
    confirmed: bool,
}

#[derive(Default)]
struct IdentityState {
    accounts: HashMap<Email, FakeAccount>,
    access_tokens: HashMap<String, Email>,
    refresh_tokens: HashMap<String, Email>,
    reset_codes: HashMap<Email, String>,
    sign_up_codes: HashMap<Email, String>,
    attribute_writes: Vec<Vec<(String, String)>>,
    forced_error: Option<ErrorName>,
}

/// In-memory identity provider.
///
/// Every verification code is [`FAKE_CODE`].
pub struct FakeIdentity {
    state: Mutex<IdentityState>,
    token_lifetime: AtomicU64,
    next_token: AtomicU64,
    refreshes: AtomicUsize,
    sign_outs: AtomicUsize,
}

impl Default for FakeIdentity {
    fn default() -> Self {
        Self {
            state: Mutex::default(),
            token_lifetime: AtomicU64::new(3600),
            next_token: AtomicU64::new(1),
            refreshes: AtomicUsize::new(0),
            sign_outs: AtomicUsize::new(0),
        }
    }
}

impl FakeIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a confirmed account. Returns its subject.
    pub fn add_user(&self, email: &Email, password: &str) -> UserId {
        let id = UserId::new(format!("sub-{}", email.local_part()));
        lock(&self.state).accounts.insert(
            email.clone(),
            FakeAccount {
                id: id.clone(),
                password: password.to_string(),
                confirmed: true,
            },
        );
        id
    }

    /// Lifetime in seconds of newly issued access tokens.
    pub fn set_token_lifetime(&self, seconds: u64) {
        self.token_lifetime.store(seconds, Ordering::SeqCst);
    }

    /// Make the next call fail with this provider error.
    pub fn fail_next(&self, name: ErrorName) {
        lock(&self.state).forced_error = Some(name);
    }

    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    /// Attribute writes that reached the provider, in order.
    #[must_use]
    pub fn attribute_writes(&self) -> Vec<Vec<(String, String)>> {
        lock(&self.state).attribute_writes.clone()
    }

    /// Whether the account's current password is `password`.
    #[must_use]
    pub fn has_password(&self, email: &Email, password: &str) -> bool {
        lock(&self.state)
            .accounts
            .get(email)
            .is_some_and(|a| a.password == password)
    }

    /// Whether the account exists and is confirmed.
    #[must_use]
    pub fn is_confirmed(&self, email: &Email) -> bool {
        lock(&self.state)
            .accounts
            .get(email)
            .is_some_and(|a| a.confirmed)
    }

    fn forced(&self) -> Result<(), IdentityError> {
        match lock(&self.state).forced_error.take() {
            Some(name) => Err(IdentityError::named(name, "forced by test")),
            None => Ok(()),
        }
    }

    fn issue(&self, state: &mut IdentityState, email: &Email, with_refresh: bool) -> AuthTokens {
        let n = self.next_token.fetch_add(1, Ordering::SeqCst);
        let access = format!("access-{n}");
        state.access_tokens.insert(access.clone(), email.clone());

        let refresh = with_refresh.then(|| {
            let refresh = format!("refresh-{n}");
            state.refresh_tokens.insert(refresh.clone(), email.clone());
            SecretString::from(refresh)
        });

        AuthTokens {
            access_token: SecretString::from(access),
            id_token: None,
            refresh_token: refresh,
            expires_in: self.token_lifetime.load(Ordering::SeqCst),
        }
    }

    fn delivery(email: &Email) -> CodeDelivery {
        CodeDelivery {
            destination: Some(email.obfuscated()),
            medium: Some("EMAIL".to_string()),
        }
    }
}

fn not_authorized() -> IdentityError {
    IdentityError::named(ErrorName::NotAuthorized, "Incorrect username or password.")
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn sign_in(&self, username: &Email, password: &str) -> Result<AuthTokens, IdentityError> {
        self.forced()?;
        let mut state = lock(&self.state);
        let status = state
            .accounts
            .get(username)
            .map(|account| (account.password == password, account.confirmed));
        match status {
            Some((true, true)) => Ok(self.issue(&mut state, username, true)),
            Some((true, false)) => Err(IdentityError::named(
                ErrorName::UserNotConfirmed,
                "User is not confirmed.",
            )),
            _ => Err(not_authorized()),
        }
    }

    async fn refresh(&self, refresh_token: &SecretString) -> Result<AuthTokens, IdentityError> {
        self.forced()?;
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&self.state);
        let email = state
            .refresh_tokens
            .get(refresh_token.expose_secret())
            .cloned()
            .ok_or_else(not_authorized)?;
        Ok(self.issue(&mut state, &email, false))
    }

    async fn user_profile(
        &self,
        access_token: &SecretString,
    ) -> Result<UserProfile, IdentityError> {
        self.forced()?;
        let state = lock(&self.state);
        let email = state
            .access_tokens
            .get(access_token.expose_secret())
            .ok_or_else(not_authorized)?;
        let account = state.accounts.get(email).ok_or_else(not_authorized)?;
        Ok(UserProfile {
            id: account.id.clone(),
            email: email.clone(),
            email_verified: account.confirmed,
            given_name: None,
            family_name: None,
            phone_number: None,
        })
    }

    async fn update_attributes(
        &self,
        _access_token: &SecretString,
        attributes: &[(String, String)],
    ) -> Result<(), IdentityError> {
        self.forced()?;
        lock(&self.state).attribute_writes.push(attributes.to_vec());
        Ok(())
    }

    async fn sign_out(&self, _access_token: &SecretString) -> Result<(), IdentityError> {
        self.forced()?;
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn reset_password(&self, username: &Email) -> Result<ResetNextStep, IdentityError> {
        self.forced()?;
        let mut state = lock(&self.state);
        if !state.accounts.contains_key(username) {
            return Err(IdentityError::named(
                ErrorName::UserNotFound,
                "Username/client id combination not found.",
            ));
        }
        state
            .reset_codes
            .insert(username.clone(), FAKE_CODE.to_string());
        Ok(ResetNextStep::ConfirmWithCode(Self::delivery(username)))
    }

    async fn confirm_reset_password(
        &self,
        username: &Email,
        code: &VerificationCode,
        new_password: &Password,
    ) -> Result<(), IdentityError> {
        self.forced()?;
        let mut state = lock(&self.state);
        if state.reset_codes.get(username).map(String::as_str) != Some(code.as_str()) {
            return Err(IdentityError::named(
                ErrorName::CodeMismatch,
                "Invalid verification code provided, please try again.",
            ));
        }
        state.reset_codes.remove(username);
        let account = state.accounts.get_mut(username).ok_or_else(|| {
            IdentityError::named(ErrorName::UserNotFound, "User does not exist.")
        })?;
        account.password = new_password.expose().to_string();
        Ok(())
    }

    async fn sign_up(
        &self,
        username: &Email,
        password: &Password,
    ) -> Result<SignUpNextStep, IdentityError> {
        self.forced()?;
        let mut state = lock(&self.state);
        if state.accounts.contains_key(username) {
            return Err(IdentityError::named(
                ErrorName::UsernameExists,
                "An account with the given email already exists.",
            ));
        }
        state.accounts.insert(
            username.clone(),
            FakeAccount {
                id: UserId::new(format!("sub-{}", username.local_part())),
                password: password.expose().to_string(),
                confirmed: false,
            },
        );
        state
            .sign_up_codes
            .insert(username.clone(), FAKE_CODE.to_string());
        Ok(SignUpNextStep::ConfirmWithCode(Self::delivery(username)))
    }

    async fn confirm_sign_up(
        &self,
        username: &Email,
        code: &VerificationCode,
    ) -> Result<(), IdentityError> {
        self.forced()?;
        let mut state = lock(&self.state);
        if state.sign_up_codes.get(username).map(String::as_str) != Some(code.as_str()) {
            return Err(IdentityError::named(
                ErrorName::CodeMismatch,
                "Invalid verification code provided, please try again.",
            ));
        }
        state.sign_up_codes.remove(username);
        if let Some(account) = state.accounts.get_mut(username) {
            account.confirmed = true;
        }
        Ok(())
    }

    async fn resend_sign_up_code(&self, username: &Email) -> Result<CodeDelivery, IdentityError> {
        self.forced()?;
        let mut state = lock(&self.state);
        if !state.accounts.contains_key(username) {
            return Err(IdentityError::named(
                ErrorName::UserNotFound,
                "Username/client id combination not found.",
            ));
        }
        state
            .sign_up_codes
            .insert(username.clone(), FAKE_CODE.to_string());
        Ok(Self::delivery(username))
    }
}
