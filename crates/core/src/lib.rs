//! Larkspur Core - Shared domain types.
//!
//! This crate provides the types shared by the Larkspur storefront and its
//! tooling:
//! - `storefront` - Customer-facing storefront (cart, favorites, auth flows)
//! - `cli` - Command-line tools for migrations
//!
//! # Architecture
//!
//! The core crate contains only types and validation rules - no I/O, no
//! database access, no HTTP clients. Everything here is pure and can be
//! exercised directly in unit tests.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, prices, cart quantities, password
//!   policy and verification codes

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
