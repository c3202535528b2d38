//! Business logic services for the storefront.
//!
//! Services are short-lived values built per request around borrowed
//! upstream clients and the visitor's session (see
//! [`crate::middleware::Visitor`]). Long-lived pieces such as the toast hub
//! and the debouncers live in [`crate::state::AppState`].
//!
//! - `cart` - local/server cart reconciliation
//! - `favorites` - favorite products
//! - `password_reset` - password reset state machine
//! - `sign_up` - registration with email verification
//! - `session` - sign-in, token refresh, profile attributes
//! - `toast` - per-session notifications
//! - `debounce` - keyed debouncer

pub mod cart;
pub mod debounce;
pub mod favorites;
pub mod password_reset;
pub mod session;
pub mod sign_up;
pub mod toast;
