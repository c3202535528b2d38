//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::api::ApiError;
use crate::identity::{ErrorName, IdentityError};
use crate::services::cart::{CartError, GENERIC_FAILURE};
use crate::services::password_reset::ResetError;
use crate::services::session::SessionError;
use crate::services::sign_up::SignUpError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Store API operation failed.
    #[error("Store API error: {0}")]
    Api(#[from] ApiError),

    /// Identity provider operation failed.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Cart or favorites operation failed.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Password reset failed.
    #[error("Password reset error: {0}")]
    Reset(#[from] ResetError),

    /// Sign-up failed.
    #[error("Sign-up error: {0}")]
    SignUp(#[from] SignUpError),

    /// Session operation failed.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::Session(SessionError::Store(err))
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Api(err) => api_status(err),
            Self::Identity(err) => identity_status(err),
            Self::Cart(err) => match err {
                CartError::Api(err) => api_status(err),
                CartError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
                CartError::Quantity(_) => StatusCode::BAD_REQUEST,
                CartError::NotInCart(_) => StatusCode::NOT_FOUND,
                CartError::NotSignedIn => StatusCode::UNAUTHORIZED,
            },
            Self::Reset(err) => match err {
                ResetError::InvalidEmail(_)
                | ResetError::InvalidCode(_)
                | ResetError::WeakPassword(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ResetError::UnknownAccount => StatusCode::NOT_FOUND,
                ResetError::Identity(err) => identity_status(err),
                ResetError::Api(err) => api_status(err),
                ResetError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ResetError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ResetError::OutOfSequence => StatusCode::CONFLICT,
            },
            Self::SignUp(err) => match err {
                SignUpError::InvalidEmail(_)
                | SignUpError::InvalidCode(_)
                | SignUpError::WeakPassword(_) => StatusCode::UNPROCESSABLE_ENTITY,
                SignUpError::Identity(err) => identity_status(err),
                SignUpError::Session(_) => StatusCode::INTERNAL_SERVER_ERROR,
                SignUpError::OutOfSequence => StatusCode::CONFLICT,
            },
            Self::Session(err) => match err {
                SessionError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                SessionError::Identity(err) => identity_status(err),
                SessionError::NotSignedIn | SessionError::Expired => StatusCode::UNAUTHORIZED,
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client.
    #[must_use]
    pub fn client_message(&self) -> String {
        // Don't expose internal error details to clients
        match self {
            Self::Api(_) => GENERIC_FAILURE.to_string(),
            Self::Identity(err) => err.user_message().to_string(),
            Self::Cart(err) => match err {
                CartError::Quantity(e) => format!("Invalid quantity: {e}"),
                CartError::NotInCart(_) => "That item is not in your cart.".to_string(),
                CartError::NotSignedIn => "Please sign in first.".to_string(),
                CartError::Api(_) | CartError::Session(_) => GENERIC_FAILURE.to_string(),
            },
            Self::Reset(err) => err.user_message(),
            Self::SignUp(err) => err.user_message(),
            Self::Session(err) => match err {
                SessionError::Identity(err) => err.user_message().to_string(),
                SessionError::NotSignedIn => "Please sign in first.".to_string(),
                SessionError::Expired => "Your session has expired. Please sign in again.".to_string(),
                SessionError::Store(_) => "Internal server error".to_string(),
            },
            Self::Internal(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, self.client_message()).into_response()
    }
}

fn api_status(err: &ApiError) -> StatusCode {
    match err {
        ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
        ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
        ApiError::Status { status, .. } if (400..500).contains(status) => StatusCode::BAD_REQUEST,
        ApiError::Http(_) | ApiError::Status { .. } | ApiError::Parse(_) => {
            StatusCode::BAD_GATEWAY
        }
        ApiError::InvalidUrl(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn identity_status(err: &IdentityError) -> StatusCode {
    match err.name() {
        _ if err.is_rate_limited() => StatusCode::TOO_MANY_REQUESTS,
        Some(ErrorName::NotAuthorized) => StatusCode::UNAUTHORIZED,
        Some(ErrorName::UserNotFound) => StatusCode::NOT_FOUND,
        Some(ErrorName::UsernameExists) => StatusCode::CONFLICT,
        Some(ErrorName::Other(_)) | None => StatusCode::BAD_GATEWAY,
        Some(_) => StatusCode::BAD_REQUEST,
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("variant_id", "V1")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
