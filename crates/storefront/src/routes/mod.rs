//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! # Fragments (HTMX)
//! GET    /cart/count                       - Cart count badge
//! GET    /toasts                           - Toast stack
//!
//! # Auth (rate limited)
//! GET    /auth/login                       - Login page
//! POST   /auth/login                       - Sign in, then merge the anonymous cart
//! POST   /auth/logout                      - Sign out
//! GET    /auth/password-reset              - Reset stepper (current step)
//! POST   /auth/password-reset/request      - Send the reset code
//! POST   /auth/password-reset/confirm      - Set the new password
//! POST   /auth/password-reset/restart      - Back to the first step
//! GET    /auth/sign-up                     - Sign-up stepper (current step)
//! POST   /auth/sign-up                     - Register
//! POST   /auth/sign-up/confirm             - Verify the email code
//! POST   /auth/sign-up/resend              - Resend the email code
//! POST   /auth/sign-up/restart             - Back to the first step
//!
//! # JSON API (rate limited)
//! GET    /api/auth/email-available?email=  - Registration availability (debounced)
//! GET    /api/account                      - Profile (requires auth)
//! PATCH  /api/account                      - Edit profile (debounced write)
//! GET    /api/cart                         - Cart lines with catalog data
//! DELETE /api/cart                         - Empty the cart
//! POST   /api/cart/items                   - Add to cart
//! PATCH  /api/cart/items/{variant_id}      - Set quantity
//! DELETE /api/cart/items/{variant_id}      - Remove a line
//! POST   /api/cart/sync                    - Merge the anonymous cart
//! GET    /api/favorites                    - Favorite product ids
//! POST   /api/favorites/{product_id}/toggle - Flip favorite status
//! GET    /api/products                     - Filtered listing
//! GET    /api/products/{id}                - Product detail
//! GET    /api/products/{id}/reviews        - Reviews
//! POST   /api/products/{id}/reviews        - Post a review (requires auth)
//! POST   /api/checkout                     - Payment session (requires auth)
//! GET    /api/toasts                       - Toast stack snapshot
//! POST   /api/toasts/{id}/dismiss          - Dismiss a toast
//! ```
//!
//! `/health` and `/health/ready` are mounted by the binary.

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod favorites;
pub mod password_reset;
pub mod products;
pub mod sign_up;
pub mod toasts;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/password-reset", get(password_reset::page))
        .route("/password-reset/request", post(password_reset::request_code))
        .route("/password-reset/confirm", post(password_reset::confirm))
        .route("/password-reset/restart", post(password_reset::restart))
        .route("/sign-up", get(sign_up::page).post(sign_up::submit))
        .route("/sign-up/confirm", post(sign_up::confirm))
        .route("/sign-up/resend", post(sign_up::resend))
        .route("/sign-up/restart", post(sign_up::restart))
}

/// Create the JSON API router.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/email-available", get(auth::email_available))
        .route("/account", get(auth::profile).patch(auth::update_profile))
        .route("/cart", get(cart::show).delete(cart::clear))
        .route("/cart/items", post(cart::add))
        .route("/cart/items/{variant_id}", patch(cart::update).delete(cart::remove))
        .route("/cart/sync", post(cart::sync))
        .route("/favorites", get(favorites::list))
        .route("/favorites/{product_id}/toggle", post(favorites::toggle))
        .route("/products", get(products::list))
        .route("/products/{product_id}", get(products::show))
        .route(
            "/products/{product_id}/reviews",
            get(products::reviews).post(products::create_review),
        )
        .route("/checkout", post(checkout::start))
        .route("/toasts", get(toasts::list))
        .route("/toasts/{id}/dismiss", post(toasts::dismiss))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart/count", get(cart::count))
        .route("/toasts", get(toasts::fragment))
        .nest("/auth", auth_routes().layer(auth_rate_limiter()))
        .nest("/api", api_routes().layer(api_rate_limiter()))
}
