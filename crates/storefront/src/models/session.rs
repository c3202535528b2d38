//! Session-related types.
//!
//! Types stored in the session for authentication state.

use core::fmt;

use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use larkspur_core::{Email, UserId};

use crate::identity::{AuthTokens, UserProfile};

/// Session-stored user identity.
///
/// Profile attributes plus the identity provider tokens needed to call
/// user-scoped endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Identity provider subject.
    pub id: UserId,
    pub email: Email,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub phone_number: Option<String>,
    pub tokens: SessionTokens,
}

impl CurrentUser {
    /// Build the session user from a freshly loaded profile.
    #[must_use]
    pub fn from_profile(profile: UserProfile, tokens: SessionTokens) -> Self {
        Self {
            id: profile.id,
            email: profile.email,
            given_name: profile.given_name,
            family_name: profile.family_name,
            phone_number: profile.phone_number,
            tokens,
        }
    }

    /// Name to greet the user with.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.given_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.email.local_part())
    }
}

/// Identity provider tokens kept server-side in the session store.
///
/// Implements `Debug` manually to redact the tokens.
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    access_token: String,
    refresh_token: Option<String>,
    /// When the access token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl SessionTokens {
    /// Tokens from a sign-in or refresh response issued at `now`.
    ///
    /// A refresh response carries no refresh token; pass the previous one as
    /// `fallback_refresh` to keep it.
    #[must_use]
    pub fn from_auth(
        tokens: &AuthTokens,
        fallback_refresh: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let lifetime = i64::try_from(tokens.expires_in).unwrap_or(i64::MAX);
        Self {
            access_token: tokens.access_token.expose_secret().to_string(),
            refresh_token: tokens
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_string())
                .or_else(|| fallback_refresh.map(str::to_string)),
            expires_at: now + Duration::seconds(lifetime.min(i64::from(i32::MAX))),
        }
    }

    /// The access token, for bearer authentication.
    #[must_use]
    pub fn access_token(&self) -> SecretString {
        SecretString::from(self.access_token.clone())
    }

    /// The refresh token, if one was issued.
    #[must_use]
    pub fn refresh_token(&self) -> Option<SecretString> {
        self.refresh_token.clone().map(SecretString::from)
    }

    pub(crate) fn refresh_token_str(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// Whether the access token expires within `window` of `now`.
    #[must_use]
    pub fn expires_within(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.expires_at <= now + window
    }
}

impl fmt::Debug for SessionTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Session keys.
pub mod keys {
    /// The signed-in user ([`super::CurrentUser`]).
    pub const CURRENT_USER: &str = "current_user";

    /// Anonymous cart ([`crate::models::LocalCart`]).
    pub const LOCAL_CART: &str = "local_cart";

    /// Set once the anonymous cart has been merged into the server cart.
    pub const CART_SYNCED: &str = "cart_synced";

    /// Password reset stepper state.
    pub const PASSWORD_RESET: &str = "password_reset";

    /// Sign-up stepper state.
    pub const SIGN_UP: &str = "sign_up";

    /// Stable per-session channel id ([`super::channel_id`]).
    pub const CHANNEL: &str = "channel";
}

/// Stable id for in-memory state tied to this session (toast stack,
/// debounce tickets, pending sign-ups). Created on first use.
///
/// # Errors
///
/// Returns an error if the session store cannot be read or written.
pub async fn channel_id(session: &Session) -> Result<Uuid, tower_sessions::session::Error> {
    if let Some(id) = session.get::<Uuid>(keys::CHANNEL).await? {
        return Ok(id);
    }
    let id = Uuid::new_v4();
    session.insert(keys::CHANNEL, id).await?;
    Ok(id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn auth_tokens(refresh: Option<&str>) -> AuthTokens {
        AuthTokens {
            access_token: SecretString::from("access-abc"),
            id_token: None,
            refresh_token: refresh.map(SecretString::from),
            expires_in: 3600,
        }
    }

    #[test]
    fn test_from_auth_sets_expiry() {
        let now = Utc::now();
        let tokens = SessionTokens::from_auth(&auth_tokens(Some("refresh-xyz")), None, now);
        assert_eq!(tokens.expires_at, now + Duration::seconds(3600));
        assert_eq!(tokens.refresh_token_str(), Some("refresh-xyz"));
    }

    #[test]
    fn test_refresh_keeps_previous_refresh_token() {
        let now = Utc::now();
        let tokens = SessionTokens::from_auth(&auth_tokens(None), Some("old-refresh"), now);
        assert_eq!(tokens.refresh_token_str(), Some("old-refresh"));
    }

    #[test]
    fn test_expires_within() {
        let now = Utc::now();
        let tokens = SessionTokens::from_auth(&auth_tokens(None), None, now);
        assert!(!tokens.expires_within(now, Duration::seconds(60)));
        assert!(tokens.expires_within(now + Duration::seconds(3560), Duration::seconds(60)));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let tokens =
            SessionTokens::from_auth(&auth_tokens(Some("refresh-xyz")), None, Utc::now());
        let debug_output = format!("{tokens:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("access-abc"));
        assert!(!debug_output.contains("refresh-xyz"));
    }

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = CurrentUser {
            id: UserId::new("u-1"),
            email: Email::parse("grace@example.com").unwrap(),
            given_name: Some("  ".to_string()),
            family_name: None,
            phone_number: None,
            tokens: SessionTokens::from_auth(&auth_tokens(None), None, Utc::now()),
        };
        assert_eq!(user.display_name(), "grace");
    }
}
