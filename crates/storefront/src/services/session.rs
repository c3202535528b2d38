//! User session provider.
//!
//! Wraps the identity provider's session for one request: who is signed in,
//! a bearer token for user-scoped API calls (refreshed shortly before it
//! expires), sign-in and sign-out. The [`AttributeWriter`] persists profile
//! edits back to the identity provider, coalescing rapid edits per user.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use secrecy::SecretString;
use thiserror::Error;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use larkspur_core::{Email, UserId};

use crate::api::ApiAuth;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::identity::{IdentityError, IdentityProvider};
use crate::models::{CurrentUser, SessionTokens, session_keys};
use crate::services::debounce::{Debounced, Debouncer};

/// Tokens expiring within this window are refreshed before use.
pub const REFRESH_WINDOW: chrono::Duration = chrono::Duration::seconds(60);

/// Debounce window for profile attribute writes.
pub const ATTRIBUTE_DEBOUNCE: Duration = Duration::from_millis(500);

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Session store failure.
    #[error("Session store error: {0}")]
    Store(#[from] tower_sessions::session::Error),

    /// Identity provider failure.
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Nobody is signed in.
    #[error("Not signed in")]
    NotSignedIn,

    /// The tokens can no longer be refreshed; the user was signed out.
    #[error("Session expired")]
    Expired,
}

/// Session provider for the current request.
pub struct UserSession<'a> {
    identity: &'a dyn IdentityProvider,
    session: &'a Session,
}

impl<'a> UserSession<'a> {
    #[must_use]
    pub const fn new(identity: &'a dyn IdentityProvider, session: &'a Session) -> Self {
        Self { identity, session }
    }

    /// The signed-in user, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be read.
    pub async fn current(&self) -> Result<Option<CurrentUser>, SessionError> {
        Ok(self
            .session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await?)
    }

    /// Authenticate and store the user in the session.
    ///
    /// Cycles the session ID to prevent fixation. Signing in as a different
    /// user resets the cart-sync guard.
    ///
    /// # Errors
    ///
    /// Returns the identity provider's error for bad credentials, or a store
    /// error if the session cannot be written.
    #[instrument(skip(self, password), fields(email = %email.obfuscated()))]
    pub async fn sign_in(&self, email: &Email, password: &str) -> Result<CurrentUser, SessionError> {
        let auth = self.identity.sign_in(email, password).await?;
        let tokens = SessionTokens::from_auth(&auth, None, Utc::now());
        let profile = self.identity.user_profile(&tokens.access_token()).await?;
        let user = CurrentUser::from_profile(profile, tokens);

        let previous = self.current().await?;
        if previous.as_ref().is_none_or(|p| p.id != user.id) {
            self.session
                .remove::<bool>(session_keys::CART_SYNCED)
                .await?;
        }

        self.session.cycle_id().await?;
        self.session
            .insert(session_keys::CURRENT_USER, &user)
            .await?;

        set_sentry_user(&user.id, Some(user.email.as_str()));
        info!(user_id = %user.id, "User signed in");
        Ok(user)
    }

    /// A valid access token for the signed-in user.
    ///
    /// Refreshes the token through the identity provider when it expires
    /// within [`REFRESH_WINDOW`]. Refreshing never touches the cart-sync
    /// guard.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotSignedIn`] without a user, or
    /// [`SessionError::Expired`] when the refresh token is gone or rejected.
    pub async fn access_token(&self) -> Result<SecretString, SessionError> {
        Ok(self.api_auth().await?.token)
    }

    /// Credentials for user-scoped store API calls.
    ///
    /// # Errors
    ///
    /// See [`UserSession::access_token`].
    pub async fn api_auth(&self) -> Result<ApiAuth, SessionError> {
        let mut user = self.current().await?.ok_or(SessionError::NotSignedIn)?;
        let now = Utc::now();

        if user.tokens.expires_within(now, REFRESH_WINDOW) {
            user.tokens = self.refresh(&user).await?;
            self.session
                .insert(session_keys::CURRENT_USER, &user)
                .await?;
        }

        Ok(ApiAuth {
            user_id: user.id,
            token: user.tokens.access_token(),
        })
    }

    /// Credentials if someone is signed in, `None` otherwise.
    ///
    /// An expired session counts as signed out.
    ///
    /// # Errors
    ///
    /// Returns store and identity provider failures.
    pub async fn api_auth_if_signed_in(&self) -> Result<Option<ApiAuth>, SessionError> {
        match self.api_auth().await {
            Ok(auth) => Ok(Some(auth)),
            Err(SessionError::NotSignedIn | SessionError::Expired) => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip_all, fields(user_id = %user.id))]
    async fn refresh(&self, user: &CurrentUser) -> Result<SessionTokens, SessionError> {
        let Some(refresh_token) = user.tokens.refresh_token() else {
            self.forget_user().await?;
            return Err(SessionError::Expired);
        };

        match self.identity.refresh(&refresh_token).await {
            Ok(auth) => Ok(SessionTokens::from_auth(
                &auth,
                user.tokens.refresh_token_str(),
                Utc::now(),
            )),
            Err(e) if e.name().is_some() => {
                warn!(error = %e, "Token refresh rejected, signing out");
                self.forget_user().await?;
                Err(SessionError::Expired)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Sign out: revoke tokens and clear user, cart-sync and stepper state.
    ///
    /// A failed revocation is logged and does not block sign-out.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store cannot be written.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        if let Some(user) = self.current().await? {
            if let Err(e) = self.identity.sign_out(&user.tokens.access_token()).await {
                warn!(error = %e, user_id = %user.id, "Failed to revoke tokens on sign-out");
            }
            info!(user_id = %user.id, "User signed out");
        }

        self.forget_user().await?;
        self.session
            .remove::<serde_json::Value>(session_keys::PASSWORD_RESET)
            .await?;
        self.session
            .remove::<serde_json::Value>(session_keys::SIGN_UP)
            .await?;
        self.session.cycle_id().await?;
        Ok(())
    }

    async fn forget_user(&self) -> Result<(), SessionError> {
        self.session
            .remove::<CurrentUser>(session_keys::CURRENT_USER)
            .await?;
        self.session
            .remove::<bool>(session_keys::CART_SYNCED)
            .await?;
        clear_sentry_user();
        Ok(())
    }

    /// Apply profile edits to the session copy of the user.
    ///
    /// Returns the attribute pairs to persist with [`AttributeWriter`].
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::NotSignedIn`] without a user.
    pub async fn update_profile(
        &self,
        edit: &ProfileEdit,
    ) -> Result<Vec<(String, String)>, SessionError> {
        let mut user = self.current().await?.ok_or(SessionError::NotSignedIn)?;
        let mut attributes = Vec::new();

        let fields = [
            ("given_name", &edit.given_name, &mut user.given_name),
            ("family_name", &edit.family_name, &mut user.family_name),
            ("phone_number", &edit.phone_number, &mut user.phone_number),
        ];
        for (name, new, current) in fields {
            if let Some(value) = new.as_deref().map(str::trim) {
                *current = Some(value.to_string());
                attributes.push((name.to_string(), value.to_string()));
            }
        }

        self.session
            .insert(session_keys::CURRENT_USER, &user)
            .await?;
        Ok(attributes)
    }
}

/// Profile fields a user can edit. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ProfileEdit {
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub phone_number: Option<String>,
}

// =============================================================================
// Attribute persistence
// =============================================================================

/// Debounced writer of user attributes to the identity provider.
///
/// Writes for the same user within [`ATTRIBUTE_DEBOUNCE`] coalesce into the
/// last one; superseded writes never reach the provider.
#[derive(Clone)]
pub struct AttributeWriter {
    identity: Arc<dyn IdentityProvider>,
    debouncer: Debouncer<UserId>,
}

impl AttributeWriter {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityProvider>, delay: Duration) -> Self {
        Self {
            identity,
            debouncer: Debouncer::new(delay),
        }
    }

    /// Schedule a write of `attributes` for `auth`'s user.
    ///
    /// # Errors
    ///
    /// Returns the identity provider's error when this write ran and failed.
    #[instrument(skip(self, auth, attributes), fields(user_id = %auth.user_id, count = attributes.len()))]
    pub async fn write(
        &self,
        auth: &ApiAuth,
        attributes: Vec<(String, String)>,
    ) -> Result<Debounced<()>, IdentityError> {
        if attributes.is_empty() {
            return Ok(Debounced::Ran(()));
        }

        let identity = Arc::clone(&self.identity);
        let token = auth.token.clone();
        let outcome = self
            .debouncer
            .run(auth.user_id.clone(), || async move {
                identity.update_attributes(&token, &attributes).await
            })
            .await;

        match outcome {
            Debounced::Ran(result) => result.map(Debounced::Ran),
            Debounced::Superseded => Ok(Debounced::Superseded),
        }
    }
}
