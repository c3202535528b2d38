//! Managed identity provider integration.
//!
//! The storefront never stores passwords. Sign-in, sign-up, email
//! verification and password reset are delegated to a Cognito-compatible
//! identity provider; this module defines the operations the storefront
//! needs ([`IdentityProvider`]), the provider's named error conditions, and
//! the table that turns those names into messages for visitors.

mod cognito;
pub mod messages;

pub use cognito::CognitoClient;

use core::fmt;

use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;

use larkspur_core::{Email, Password, UserId, VerificationCode};

// =============================================================================
// Errors
// =============================================================================

/// Named error conditions reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorName {
    UserNotFound,
    InvalidParameter,
    LimitExceeded,
    TooManyRequests,
    CodeMismatch,
    ExpiredCode,
    NotAuthorized,
    UsernameExists,
    InvalidPassword,
    UserNotConfirmed,
    /// Any other exception name, kept verbatim.
    Other(String),
}

impl ErrorName {
    /// Parse a provider error type.
    ///
    /// Accepts both bare names (`CodeMismatchException`) and namespaced ones
    /// (`com.amazonaws.cognito#CodeMismatchException`).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let name = raw.rsplit('#').next().unwrap_or(raw).trim();
        match name {
            "UserNotFoundException" => Self::UserNotFound,
            "InvalidParameterException" => Self::InvalidParameter,
            "LimitExceededException" => Self::LimitExceeded,
            "TooManyRequestsException" => Self::TooManyRequests,
            "CodeMismatchException" => Self::CodeMismatch,
            "ExpiredCodeException" => Self::ExpiredCode,
            "NotAuthorizedException" => Self::NotAuthorized,
            "UsernameExistsException" => Self::UsernameExists,
            "InvalidPasswordException" => Self::InvalidPassword,
            "UserNotConfirmedException" => Self::UserNotConfirmed,
            other => Self::Other(other.to_string()),
        }
    }

    /// The provider's exception name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::UserNotFound => "UserNotFoundException",
            Self::InvalidParameter => "InvalidParameterException",
            Self::LimitExceeded => "LimitExceededException",
            Self::TooManyRequests => "TooManyRequestsException",
            Self::CodeMismatch => "CodeMismatchException",
            Self::ExpiredCode => "ExpiredCodeException",
            Self::NotAuthorized => "NotAuthorizedException",
            Self::UsernameExists => "UsernameExistsException",
            Self::InvalidPassword => "InvalidPasswordException",
            Self::UserNotConfirmed => "UserNotConfirmedException",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ErrorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when calling the identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider rejected the request with a named error.
    #[error("{name}: {message}")]
    Provider { name: ErrorName, message: String },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to parse a response body.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The provider answered with something this client does not handle
    /// (e.g. an auth challenge).
    #[error("Unexpected response: {0}")]
    Unexpected(String),
}

impl IdentityError {
    /// Build a named provider error.
    #[must_use]
    pub fn named(name: ErrorName, message: impl Into<String>) -> Self {
        Self::Provider {
            name,
            message: message.into(),
        }
    }

    /// The provider error name, if this is a named error.
    #[must_use]
    pub const fn name(&self) -> Option<&ErrorName> {
        match self {
            Self::Provider { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Whether the provider is throttling this user or client.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self.name(),
            Some(ErrorName::LimitExceeded | ErrorName::TooManyRequests)
        )
    }

    /// Message to show a visitor for this error.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        self.name()
            .map_or(messages::GENERIC_FALLBACK, |name| {
                messages::message_for(name.as_str())
            })
    }
}

// =============================================================================
// Types
// =============================================================================

/// Tokens issued after a successful sign-in or refresh.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: SecretString,
    pub id_token: Option<SecretString>,
    /// Absent on refresh responses; the previous refresh token stays valid.
    pub refresh_token: Option<SecretString>,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Profile attributes of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: UserId,
    pub email: Email,
    pub email_verified: bool,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub phone_number: Option<String>,
}

/// Where a verification code was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeDelivery {
    /// Masked destination as reported by the provider (e.g. `a***@e***`).
    pub destination: Option<String>,
    /// `EMAIL` or `SMS`.
    pub medium: Option<String>,
}

/// What the client must do next to complete a password reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetNextStep {
    /// A code was sent; confirm it together with the new password.
    ConfirmWithCode(CodeDelivery),
    /// Nothing further is required.
    Done,
}

/// What the client must do next to complete a sign-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpNextStep {
    /// A code was sent to verify the email address.
    ConfirmWithCode(CodeDelivery),
    /// The account is already confirmed.
    Done,
}

/// Operations the storefront needs from the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticate with email and password.
    async fn sign_in(&self, username: &Email, password: &str) -> Result<AuthTokens, IdentityError>;

    /// Exchange a refresh token for a fresh access token.
    async fn refresh(&self, refresh_token: &SecretString) -> Result<AuthTokens, IdentityError>;

    /// Load the profile attributes for an access token.
    async fn user_profile(&self, access_token: &SecretString)
    -> Result<UserProfile, IdentityError>;

    /// Persist user attributes (e.g. `given_name`).
    async fn update_attributes(
        &self,
        access_token: &SecretString,
        attributes: &[(String, String)],
    ) -> Result<(), IdentityError>;

    /// Revoke every token issued to the user.
    async fn sign_out(&self, access_token: &SecretString) -> Result<(), IdentityError>;

    /// Start a password reset.
    async fn reset_password(&self, username: &Email) -> Result<ResetNextStep, IdentityError>;

    /// Finish a password reset with the emailed code.
    async fn confirm_reset_password(
        &self,
        username: &Email,
        code: &VerificationCode,
        new_password: &Password,
    ) -> Result<(), IdentityError>;

    /// Register a new account.
    async fn sign_up(
        &self,
        username: &Email,
        password: &Password,
    ) -> Result<SignUpNextStep, IdentityError>;

    /// Verify the account's email address.
    async fn confirm_sign_up(
        &self,
        username: &Email,
        code: &VerificationCode,
    ) -> Result<(), IdentityError>;

    /// Send a new sign-up verification code.
    async fn resend_sign_up_code(&self, username: &Email) -> Result<CodeDelivery, IdentityError>;
}
