//! Account sign-up with email verification.
//!
//! The visitor submits an email and password, then confirms the address
//! with the emailed code and is signed in. The password is held in memory
//! between the two steps (never in the session) so the automatic sign-in
//! can use it; it is forgotten after ten minutes.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_sessions::Session;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use larkspur_core::{
    CodeError, Email, EmailError, Password, PasswordError, VerificationCode,
};

use crate::identity::{messages, CodeDelivery, IdentityError, IdentityProvider, SignUpNextStep};
use crate::models::{CurrentUser, channel_id, session_keys};
use crate::services::session::UserSession;

/// How long a password waits for its email confirmation.
const PENDING_TTL: Duration = Duration::from_secs(10 * 60);

/// Where the visitor is in the sign-up flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SignUpStep {
    /// Collect email and password.
    #[default]
    Details,
    /// Collect the emailed code.
    ConfirmEmail {
        username: Email,
        destination: Option<String>,
    },
    /// The account is confirmed.
    Completed,
}

impl SignUpStep {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Details => "details",
            Self::ConfirmEmail { .. } => "confirm_email",
            Self::Completed => "completed",
        }
    }
}

/// Errors from the sign-up flow.
#[derive(Debug, Error)]
pub enum SignUpError {
    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid code: {0}")]
    InvalidCode(#[from] CodeError),

    #[error("Weak password: {0}")]
    WeakPassword(#[from] PasswordError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Session store error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// The submission does not belong to the current step.
    #[error("Unexpected step")]
    OutOfSequence,
}

impl SignUpError {
    /// Message to show the visitor.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) => "Please enter a valid email address.".to_string(),
            Self::InvalidCode(_) => "Please enter the 6-digit code from your email.".to_string(),
            Self::WeakPassword(e) => format!("Your {e}."),
            Self::Identity(e) => e.user_message().to_string(),
            Self::OutOfSequence => "Please start the sign-up again.".to_string(),
            Self::Session(_) => messages::GENERIC_FALLBACK.to_string(),
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

/// Passwords of sign-ups awaiting email confirmation, by session channel.
#[derive(Clone)]
pub struct PendingSignUps {
    passwords: Cache<Uuid, Arc<SecretString>>,
}

impl Default for PendingSignUps {
    fn default() -> Self {
        Self::new(PENDING_TTL)
    }
}

impl PendingSignUps {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            passwords: Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    async fn remember(&self, channel: Uuid, password: &Password) {
        self.passwords
            .insert(
                channel,
                Arc::new(SecretString::from(password.expose().to_string())),
            )
            .await;
    }

    async fn take(&self, channel: Uuid) -> Option<Arc<SecretString>> {
        let password = self.passwords.get(&channel).await;
        self.passwords.invalidate(&channel).await;
        password
    }
}

/// Sign-up for one request.
pub struct SignUpFlow<'a> {
    identity: &'a dyn IdentityProvider,
    session: &'a Session,
    pending: &'a PendingSignUps,
}

impl<'a> SignUpFlow<'a> {
    #[must_use]
    pub const fn new(
        identity: &'a dyn IdentityProvider,
        session: &'a Session,
        pending: &'a PendingSignUps,
    ) -> Self {
        Self {
            identity,
            session,
            pending,
        }
    }

    /// The current step.
    ///
    /// # Errors
    ///
    /// Returns [`SignUpError::Session`] if the session store fails.
    pub async fn step(&self) -> Result<SignUpStep, SignUpError> {
        Ok(self
            .session
            .get::<SignUpStep>(session_keys::SIGN_UP)
            .await?
            .unwrap_or_default())
    }

    async fn set_step(&self, step: &SignUpStep) -> Result<(), SignUpError> {
        self.session.insert(session_keys::SIGN_UP, step).await?;
        Ok(())
    }

    /// Register an account.
    ///
    /// # Errors
    ///
    /// Validation errors are returned without any network call; provider
    /// rejections (e.g. an existing account) as [`SignUpError::Identity`].
    #[instrument(skip_all)]
    pub async fn sign_up(
        &self,
        raw_email: &str,
        raw_password: &str,
    ) -> Result<SignUpStep, SignUpError> {
        if self.step().await? == SignUpStep::Completed {
            return Err(SignUpError::OutOfSequence);
        }

        let email = Email::parse(raw_email)?;
        let password = Password::parse(raw_password)?;

        let next = match self.identity.sign_up(&email, &password).await {
            Ok(next) => next,
            Err(e) => {
                warn!(error = %e, "Sign-up rejected by identity provider");
                return Err(e.into());
            }
        };

        let step = match next {
            SignUpNextStep::ConfirmWithCode(delivery) => {
                self.pending
                    .remember(channel_id(self.session).await?, &password)
                    .await;
                SignUpStep::ConfirmEmail {
                    username: email.clone(),
                    destination: delivery.destination,
                }
            }
            SignUpNextStep::Done => {
                self.sign_in(&email, password.expose()).await;
                SignUpStep::Completed
            }
        };

        info!(email = %email.obfuscated(), step = step.as_str(), "Account registered");
        self.set_step(&step).await?;
        Ok(step)
    }

    /// Confirm the email address, then sign in if the password is still
    /// remembered.
    ///
    /// # Errors
    ///
    /// Validation errors are returned without any network call; a wrong or
    /// expired code as [`SignUpError::Identity`].
    #[instrument(skip_all)]
    pub async fn confirm(&self, raw_code: &str) -> Result<Option<CurrentUser>, SignUpError> {
        let SignUpStep::ConfirmEmail { username, .. } = self.step().await? else {
            return Err(SignUpError::OutOfSequence);
        };

        let code = VerificationCode::parse(raw_code)?;
        if let Err(e) = self.identity.confirm_sign_up(&username, &code).await {
            warn!(error = %e, "Sign-up confirmation rejected");
            return Err(e.into());
        }
        self.set_step(&SignUpStep::Completed).await?;
        info!(email = %username.obfuscated(), "Email confirmed");

        let channel = channel_id(self.session).await?;
        let Some(password) = self.pending.take(channel).await else {
            return Ok(None);
        };
        Ok(self.sign_in(&username, password.expose_secret()).await)
    }

    /// Send the confirmation code again.
    ///
    /// # Errors
    ///
    /// Returns [`SignUpError::OutOfSequence`] outside the confirmation
    /// step, or the provider error.
    pub async fn resend_code(&self) -> Result<CodeDelivery, SignUpError> {
        let SignUpStep::ConfirmEmail { username, .. } = self.step().await? else {
            return Err(SignUpError::OutOfSequence);
        };
        Ok(self.identity.resend_sign_up_code(&username).await?)
    }

    /// Abandon the flow.
    ///
    /// # Errors
    ///
    /// Returns [`SignUpError::Session`] if the session store fails.
    pub async fn restart(&self) -> Result<(), SignUpError> {
        self.session
            .remove::<SignUpStep>(session_keys::SIGN_UP)
            .await?;
        if let Some(channel) = self.session.get::<Uuid>(session_keys::CHANNEL).await? {
            self.pending.take(channel).await;
        }
        Ok(())
    }

    /// Clear a completed flow once its confirmation has been shown.
    ///
    /// # Errors
    ///
    /// Returns [`SignUpError::Session`] if the session store fails.
    pub async fn acknowledge_completion(&self) -> Result<bool, SignUpError> {
        if self.step().await? == SignUpStep::Completed {
            self.restart().await?;
            return Ok(true);
        }
        Ok(false)
    }

    async fn sign_in(&self, email: &Email, password: &str) -> Option<CurrentUser> {
        match UserSession::new(self.identity, self.session)
            .sign_in(email, password)
            .await
        {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(error = %e, "Sign-in after sign-up failed");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::identity::ErrorName;
    use crate::testing::{FakeIdentity, FAKE_CODE};

    const PASSWORD: &str = "Abcdef1!";

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn email(s: &str) -> Email {
        Email::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_sign_up_confirm_and_sign_in() {
        let identity = FakeIdentity::new();
        let session = session();
        let pending = PendingSignUps::default();
        let flow = SignUpFlow::new(&identity, &session, &pending);

        let step = flow.sign_up("new@example.com", PASSWORD).await.unwrap();
        assert!(matches!(step, SignUpStep::ConfirmEmail { .. }));
        assert!(!identity.is_confirmed(&email("new@example.com")));

        let user = flow.confirm(FAKE_CODE).await.unwrap().unwrap();
        assert_eq!(user.email, email("new@example.com"));
        assert!(identity.is_confirmed(&email("new@example.com")));
        assert_eq!(flow.step().await.unwrap(), SignUpStep::Completed);
    }

    #[tokio::test]
    async fn test_weak_password_is_rejected_locally() {
        let identity = FakeIdentity::new();
        let session = session();
        let pending = PendingSignUps::default();
        let flow = SignUpFlow::new(&identity, &session, &pending);

        let err = flow.sign_up("new@example.com", "abcdefgh").await.unwrap_err();

        assert!(err.is_validation());
        assert!(!identity.has_password(&email("new@example.com"), "abcdefgh"));
        assert_eq!(flow.step().await.unwrap(), SignUpStep::Details);
    }

    #[tokio::test]
    async fn test_existing_account_message() {
        let identity = FakeIdentity::new();
        identity.add_user(&email("taken@example.com"), PASSWORD);
        let session = session();
        let pending = PendingSignUps::default();
        let flow = SignUpFlow::new(&identity, &session, &pending);

        let err = flow.sign_up("taken@example.com", PASSWORD).await.unwrap_err();

        assert!(matches!(
            &err,
            SignUpError::Identity(e) if e.name() == Some(&ErrorName::UsernameExists)
        ));
        assert_eq!(
            err.user_message(),
            "An account with this email address already exists."
        );
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_step() {
        let identity = FakeIdentity::new();
        let session = session();
        let pending = PendingSignUps::default();
        let flow = SignUpFlow::new(&identity, &session, &pending);
        flow.sign_up("new@example.com", PASSWORD).await.unwrap();

        assert!(flow.confirm("999999").await.is_err());
        assert!(matches!(
            flow.step().await.unwrap(),
            SignUpStep::ConfirmEmail { .. }
        ));
    }

    #[tokio::test]
    async fn test_forgotten_password_completes_without_sign_in() {
        let identity = FakeIdentity::new();
        let session = session();
        let pending = PendingSignUps::new(Duration::ZERO);
        let flow = SignUpFlow::new(&identity, &session, &pending);
        flow.sign_up("new@example.com", PASSWORD).await.unwrap();

        assert!(flow.confirm(FAKE_CODE).await.unwrap().is_none());
        assert_eq!(flow.step().await.unwrap(), SignUpStep::Completed);
    }

    #[tokio::test]
    async fn test_resend_requires_confirmation_step() {
        let identity = FakeIdentity::new();
        let session = session();
        let pending = PendingSignUps::default();
        let flow = SignUpFlow::new(&identity, &session, &pending);

        assert!(matches!(
            flow.resend_code().await.unwrap_err(),
            SignUpError::OutOfSequence
        ));

        flow.sign_up("new@example.com", PASSWORD).await.unwrap();
        let delivery = flow.resend_code().await.unwrap();
        assert_eq!(delivery.destination.as_deref(), Some("new@***"));
    }
}
