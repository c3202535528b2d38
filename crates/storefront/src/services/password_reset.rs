//! Password reset flow.
//!
//! The visitor moves through three screens: enter email, enter the emailed
//! code with a new password, done. A wrong code keeps the visitor on the
//! code screen with an error. Being throttled by the identity provider ends
//! the flow until the visitor restarts it.
//!
//! ```text
//!  Initial --CodeSent--> ResetPassword --PasswordChanged--> Completed
//!                           |      ^
//!                CodeMismatch      CodeSent (resend)
//!                           v      |
//!                         VerifyCode --PasswordChanged--> Completed
//!
//!  any --RateLimited--> RateLimited        any --Restart--> Initial
//! ```
//!
//! The current step is kept in the session for the duration of the flow.
//! Input is validated before any network call is made.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use larkspur_core::{
    CodeError, Email, EmailError, Password, PasswordError, VerificationCode,
};

use crate::api::{ApiError, StoreApi};
use crate::identity::{messages, ErrorName, IdentityError, IdentityProvider, ResetNextStep};
use crate::models::{CurrentUser, session_keys};
use crate::services::session::UserSession;

/// Where the visitor is in the reset flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ResetStep {
    /// Collect the email address.
    #[default]
    Initial,
    /// Collect the code and a new password.
    ResetPassword {
        username: Email,
        /// Masked address the code went to.
        destination: Option<String>,
    },
    /// The last code was wrong; collect it again.
    VerifyCode { username: Email },
    /// Throttled by the identity provider.
    RateLimited,
    /// The password was changed.
    Completed,
}

/// Something that happened during the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetEvent {
    CodeSent {
        username: Email,
        destination: Option<String>,
    },
    CodeMismatch,
    PasswordChanged,
    RateLimited,
    Restart,
}

impl ResetStep {
    /// Next step after `event`. Events that make no sense in the current
    /// step leave it unchanged.
    #[must_use]
    pub fn apply(self, event: ResetEvent) -> Self {
        match (self, event) {
            (_, ResetEvent::Restart) => Self::Initial,
            (_, ResetEvent::RateLimited) | (Self::RateLimited, _) => Self::RateLimited,
            (
                Self::Initial | Self::ResetPassword { .. } | Self::VerifyCode { .. },
                ResetEvent::CodeSent {
                    username,
                    destination,
                },
            ) => Self::ResetPassword {
                username,
                destination,
            },
            (
                Self::ResetPassword { username, .. } | Self::VerifyCode { username },
                ResetEvent::CodeMismatch,
            ) => Self::VerifyCode { username },
            (
                Self::ResetPassword { .. } | Self::VerifyCode { .. },
                ResetEvent::PasswordChanged,
            ) => Self::Completed,
            (step, _) => step,
        }
    }

    /// The account being reset, once a code has been sent.
    #[must_use]
    pub const fn username(&self) -> Option<&Email> {
        match self {
            Self::ResetPassword { username, .. } | Self::VerifyCode { username } => Some(username),
            _ => None,
        }
    }

    /// Template-friendly name of the step.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::ResetPassword { .. } => "reset_password",
            Self::VerifyCode { .. } => "verify_code",
            Self::RateLimited => "rate_limited",
            Self::Completed => "completed",
        }
    }
}

/// Errors from the reset flow.
#[derive(Debug, Error)]
pub enum ResetError {
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid code: {0}")]
    InvalidCode(#[from] CodeError),

    #[error("Weak password: {0}")]
    WeakPassword(#[from] PasswordError),

    /// No account is registered for the email.
    #[error("Unknown account")]
    UnknownAccount,

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Store API error: {0}")]
    Api(#[from] ApiError),

    #[error("Session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// The flow is throttled until restarted.
    #[error("Rate limited")]
    RateLimited,

    /// The submission does not belong to the current step.
    #[error("Unexpected step")]
    OutOfSequence,
}

impl ResetError {
    /// Message to show the visitor.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) => "Please enter a valid email address.".to_string(),
            Self::InvalidCode(_) => "Please enter the 6-digit code from your email.".to_string(),
            Self::WeakPassword(e) => {
                let mut message = e.to_string();
                if let Some(first) = message.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                message.push('.');
                message
            }
            Self::UnknownAccount => messages::message_for(ErrorName::UserNotFound.as_str()).to_string(),
            Self::Identity(e) => e.user_message().to_string(),
            Self::RateLimited => {
                messages::message_for(ErrorName::LimitExceeded.as_str()).to_string()
            }
            Self::OutOfSequence => "Please start the password reset again.".to_string(),
            Self::Api(_) | Self::Session(_) => messages::GENERIC_FALLBACK.to_string(),
        }
    }

    /// Whether this is a validation failure that never reached the network.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidEmail(_) | Self::InvalidCode(_) | Self::WeakPassword(_)
        )
    }
}

/// Password reset for one request.
pub struct PasswordResetFlow<'a> {
    api: &'a dyn StoreApi,
    identity: &'a dyn IdentityProvider,
    session: &'a Session,
}

impl<'a> PasswordResetFlow<'a> {
    #[must_use]
    pub const fn new(
        api: &'a dyn StoreApi,
        identity: &'a dyn IdentityProvider,
        session: &'a Session,
    ) -> Self {
        Self {
            api,
            identity,
            session,
        }
    }

    /// The current step.
    ///
    /// # Errors
    ///
    /// Returns [`ResetError::Session`] if the session store fails.
    pub async fn step(&self) -> Result<ResetStep, ResetError> {
        Ok(self
            .session
            .get::<ResetStep>(session_keys::PASSWORD_RESET)
            .await?
            .unwrap_or_default())
    }

    async fn transition(&self, event: ResetEvent) -> Result<ResetStep, ResetError> {
        let next = self.step().await?.apply(event);
        self.session
            .insert(session_keys::PASSWORD_RESET, &next)
            .await?;
        Ok(next)
    }

    /// Send a reset code to `raw_email`.
    ///
    /// Also used to resend a code from the code screen.
    ///
    /// # Errors
    ///
    /// Validation errors are returned without any network call.
    /// [`ResetError::UnknownAccount`] when no account exists; other
    /// provider errors as [`ResetError::Identity`].
    #[instrument(skip(self, raw_email))]
    pub async fn request_code(&self, raw_email: &str) -> Result<ResetStep, ResetError> {
        match self.step().await? {
            ResetStep::RateLimited => return Err(ResetError::RateLimited),
            ResetStep::Completed => return Err(ResetError::OutOfSequence),
            _ => {}
        }

        let email = Email::parse(raw_email)?;

        // Check existence first so the provider's own error never reveals
        // which addresses are registered
        if !self.api.user_exists(&email).await? {
            info!(email = %email.obfuscated(), "Password reset for unknown account");
            return Err(ResetError::UnknownAccount);
        }

        match self.identity.reset_password(&email).await {
            Ok(ResetNextStep::ConfirmWithCode(delivery)) => {
                info!(email = %email.obfuscated(), "Password reset code sent");
                self.transition(ResetEvent::CodeSent {
                    username: email,
                    destination: delivery.destination,
                })
                .await
            }
            Ok(ResetNextStep::Done) => Err(IdentityError::Unexpected(
                "reset finished without a confirmation code".to_string(),
            )
            .into()),
            Err(e) => Err(self.provider_failure(e).await),
        }
    }

    /// Confirm the code and set the new password, then sign in with it.
    ///
    /// Returns the signed-in user, or `None` when the password was changed
    /// but the automatic sign-in failed.
    ///
    /// # Errors
    ///
    /// Validation errors are returned without any network call. A wrong
    /// code moves the flow to [`ResetStep::VerifyCode`]; throttling to
    /// [`ResetStep::RateLimited`].
    #[instrument(skip_all)]
    pub async fn confirm(
        &self,
        raw_code: &str,
        raw_password: &str,
    ) -> Result<Option<CurrentUser>, ResetError> {
        let step = self.step().await?;
        let username = match &step {
            ResetStep::RateLimited => return Err(ResetError::RateLimited),
            other => other.username().cloned().ok_or(ResetError::OutOfSequence)?,
        };

        let code = VerificationCode::parse(raw_code)?;
        let password = Password::parse(raw_password)?;

        if let Err(e) = self
            .identity
            .confirm_reset_password(&username, &code, &password)
            .await
        {
            return Err(self.provider_failure(e).await);
        }
        self.transition(ResetEvent::PasswordChanged).await?;
        info!(email = %username.obfuscated(), "Password reset completed");

        match UserSession::new(self.identity, self.session)
            .sign_in(&username, password.expose())
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!(error = %e, "Sign-in after password reset failed");
                Ok(None)
            }
        }
    }

    /// Abandon the flow and start over.
    ///
    /// # Errors
    ///
    /// Returns [`ResetError::Session`] if the session store fails.
    pub async fn restart(&self) -> Result<(), ResetError> {
        self.session
            .remove::<ResetStep>(session_keys::PASSWORD_RESET)
            .await?;
        Ok(())
    }

    /// Clear a completed flow once its confirmation has been shown.
    /// Returns whether the flow was complete.
    ///
    /// # Errors
    ///
    /// Returns [`ResetError::Session`] if the session store fails.
    pub async fn acknowledge_completion(&self) -> Result<bool, ResetError> {
        if self.step().await? == ResetStep::Completed {
            self.restart().await?;
            return Ok(true);
        }
        Ok(false)
    }

    async fn provider_failure(&self, err: IdentityError) -> ResetError {
        let event = if err.is_rate_limited() {
            Some(ResetEvent::RateLimited)
        } else if matches!(err.name(), Some(ErrorName::CodeMismatch)) {
            Some(ResetEvent::CodeMismatch)
        } else {
            None
        };

        warn!(error = %err, "Password reset rejected by identity provider");
        if let Some(event) = event {
            if let Err(e) = self.transition(event).await {
                return e;
            }
        }

        if err.is_rate_limited() {
            ResetError::RateLimited
        } else {
            ResetError::Identity(err)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;
    use crate::testing::{FakeIdentity, FakeStoreApi, FAKE_CODE};

    const NEW_PASSWORD: &str = "Abcdef1!";

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    fn code_sent(s: &str) -> ResetEvent {
        ResetEvent::CodeSent {
            username: email(s),
            destination: None,
        }
    }

    struct Fixture {
        api: FakeStoreApi,
        identity: FakeIdentity,
        session: Session,
    }

    impl Fixture {
        fn new() -> Self {
            let api = FakeStoreApi::new();
            let identity = FakeIdentity::new();
            let user = email("shopper@example.com");
            api.add_user(&user);
            identity.add_user(&user, "OldPass1!");
            Self {
                api,
                identity,
                session: Session::new(None, Arc::new(MemoryStore::default()), None),
            }
        }

        fn flow(&self) -> PasswordResetFlow<'_> {
            PasswordResetFlow::new(&self.api, &self.identity, &self.session)
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    #[test]
    fn test_initial_to_reset_password() {
        let next = ResetStep::Initial.apply(code_sent("a@example.com"));
        assert_eq!(
            next,
            ResetStep::ResetPassword {
                username: email("a@example.com"),
                destination: None
            }
        );
    }

    #[test]
    fn test_code_mismatch_moves_to_verify_code() {
        let step = ResetStep::Initial
            .apply(code_sent("a@example.com"))
            .apply(ResetEvent::CodeMismatch);
        assert_eq!(
            step,
            ResetStep::VerifyCode {
                username: email("a@example.com")
            }
        );

        // A second mismatch stays put
        assert_eq!(step.clone().apply(ResetEvent::CodeMismatch), step);
    }

    #[test]
    fn test_password_changed_completes() {
        let from_reset = ResetStep::Initial
            .apply(code_sent("a@example.com"))
            .apply(ResetEvent::PasswordChanged);
        assert_eq!(from_reset, ResetStep::Completed);

        let from_verify = ResetStep::VerifyCode {
            username: email("a@example.com"),
        }
        .apply(ResetEvent::PasswordChanged);
        assert_eq!(from_verify, ResetStep::Completed);
    }

    #[test]
    fn test_rate_limited_from_any_step_is_a_dead_end() {
        for step in [
            ResetStep::Initial,
            ResetStep::Initial.apply(code_sent("a@example.com")),
            ResetStep::VerifyCode {
                username: email("a@example.com"),
            },
            ResetStep::Completed,
        ] {
            let limited = step.apply(ResetEvent::RateLimited);
            assert_eq!(limited, ResetStep::RateLimited);
            assert_eq!(
                limited.clone().apply(code_sent("a@example.com")),
                ResetStep::RateLimited
            );
            assert_eq!(
                limited.apply(ResetEvent::PasswordChanged),
                ResetStep::RateLimited
            );
        }
    }

    #[test]
    fn test_restart_always_returns_to_initial() {
        assert_eq!(
            ResetStep::RateLimited.apply(ResetEvent::Restart),
            ResetStep::Initial
        );
        assert_eq!(
            ResetStep::Completed.apply(ResetEvent::Restart),
            ResetStep::Initial
        );
    }

    #[test]
    fn test_out_of_order_events_are_ignored() {
        assert_eq!(
            ResetStep::Initial.apply(ResetEvent::PasswordChanged),
            ResetStep::Initial
        );
        assert_eq!(
            ResetStep::Initial.apply(ResetEvent::CodeMismatch),
            ResetStep::Initial
        );
        assert_eq!(
            ResetStep::Completed.apply(code_sent("a@example.com")),
            ResetStep::Completed
        );
    }

    #[test]
    fn test_step_serializes_with_tag() {
        let step = ResetStep::VerifyCode {
            username: email("a@example.com"),
        };
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"step": "verify_code", "username": "a@example.com"})
        );
    }

    // =========================================================================
    // Flow
    // =========================================================================

    #[tokio::test]
    async fn test_full_reset_signs_in_with_new_password() {
        let fx = Fixture::new();
        let flow = fx.flow();

        let step = flow.request_code("Shopper@Example.com").await.unwrap();
        assert!(matches!(step, ResetStep::ResetPassword { .. }));

        let user = flow.confirm(FAKE_CODE, NEW_PASSWORD).await.unwrap().unwrap();
        assert_eq!(user.email, email("shopper@example.com"));
        assert!(
            fx.identity
                .has_password(&email("shopper@example.com"), NEW_PASSWORD)
        );
        assert_eq!(flow.step().await.unwrap(), ResetStep::Completed);

        assert!(flow.acknowledge_completion().await.unwrap());
        assert_eq!(flow.step().await.unwrap(), ResetStep::Initial);
    }

    #[tokio::test]
    async fn test_invalid_email_never_reaches_network() {
        let fx = Fixture::new();
        fx.identity.fail_next(ErrorName::LimitExceeded);

        let err = fx.flow().request_code("shopper@localhost").await.unwrap_err();

        assert!(err.is_validation());
        // The forced error is still pending, so no provider call happened
        assert!(fx.identity.sign_in(&email("shopper@example.com"), "OldPass1!").await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let fx = Fixture::new();
        let err = fx.flow().request_code("nobody@example.com").await.unwrap_err();

        assert!(matches!(err, ResetError::UnknownAccount));
        assert_eq!(
            err.user_message(),
            "We couldn't find an account with that email address."
        );
        assert_eq!(fx.flow().step().await.unwrap(), ResetStep::Initial);
    }

    #[tokio::test]
    async fn test_wrong_code_moves_to_verify_code() {
        let fx = Fixture::new();
        let flow = fx.flow();
        flow.request_code("shopper@example.com").await.unwrap();

        let err = flow.confirm("000000", NEW_PASSWORD).await.unwrap_err();

        assert!(matches!(err, ResetError::Identity(_)));
        assert!(matches!(
            flow.step().await.unwrap(),
            ResetStep::VerifyCode { .. }
        ));

        // The right code still works from there
        assert!(flow.confirm(FAKE_CODE, NEW_PASSWORD).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_weak_password_is_rejected_locally() {
        let fx = Fixture::new();
        let flow = fx.flow();
        flow.request_code("shopper@example.com").await.unwrap();

        let err = flow.confirm(FAKE_CODE, "abcdefgh").await.unwrap_err();

        assert!(matches!(err, ResetError::WeakPassword(_)));
        assert!(err.user_message().starts_with("Password must"));
        assert!(
            fx.identity
                .has_password(&email("shopper@example.com"), "OldPass1!")
        );
    }

    #[tokio::test]
    async fn test_malformed_code_is_rejected_locally() {
        let fx = Fixture::new();
        let flow = fx.flow();
        flow.request_code("shopper@example.com").await.unwrap();

        let err = flow.confirm("12a456", NEW_PASSWORD).await.unwrap_err();
        assert!(matches!(err, ResetError::InvalidCode(CodeError::NonDigit)));
    }

    #[tokio::test]
    async fn test_rate_limit_ends_the_flow() {
        let fx = Fixture::new();
        let flow = fx.flow();
        flow.request_code("shopper@example.com").await.unwrap();

        fx.identity.fail_next(ErrorName::LimitExceeded);
        let err = flow.confirm(FAKE_CODE, NEW_PASSWORD).await.unwrap_err();
        assert!(matches!(err, ResetError::RateLimited));
        assert_eq!(flow.step().await.unwrap(), ResetStep::RateLimited);

        // Even a correct submission is refused now
        let err = flow.confirm(FAKE_CODE, NEW_PASSWORD).await.unwrap_err();
        assert!(matches!(err, ResetError::RateLimited));

        flow.restart().await.unwrap();
        assert_eq!(flow.step().await.unwrap(), ResetStep::Initial);
    }

    #[tokio::test]
    async fn test_confirm_before_request_is_out_of_sequence() {
        let fx = Fixture::new();
        let err = fx.flow().confirm(FAKE_CODE, NEW_PASSWORD).await.unwrap_err();
        assert!(matches!(err, ResetError::OutOfSequence));
    }
}
