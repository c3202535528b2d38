//! Domain models for the storefront.
//!
//! Everything here is either stored in the visitor's session or rendered
//! from it; remote shapes live in [`crate::api::types`].

pub mod cart;
pub mod session;

pub use cart::{CartLine, CartView, LocalCart, LocalCartItem};
pub use session::{CurrentUser, SessionTokens, channel_id, keys as session_keys};
