//! Core types for Larkspur.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod code;
pub mod email;
pub mod id;
pub mod password;
pub mod price;
pub mod quantity;

pub use code::{CodeError, VerificationCode};
pub use email::{Email, EmailError};
pub use id::*;
pub use password::{Password, PasswordChecks, PasswordError};
pub use price::{CurrencyCode, Price};
pub use quantity::{AddPlan, Quantity, QuantityError};
