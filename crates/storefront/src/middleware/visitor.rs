//! Per-request visitor context.
//!
//! Bundles the session, the session's toast stack and, when someone is
//! signed in, fresh store API credentials. The first request that sees a
//! signed-in user also merges the anonymous cart into the server cart.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tower_sessions::Session;
use tracing::warn;

use crate::api::ApiAuth;
use crate::error::AppError;
use crate::services::cart::{CartService, SyncOutcome};
use crate::services::favorites::FavoritesService;
use crate::services::session::UserSession;
use crate::services::toast::ToastStack;
use crate::state::AppState;

/// The current visitor, anonymous or signed in.
pub struct Visitor {
    pub session: Session,
    pub toasts: ToastStack,
    pub auth: Option<ApiAuth>,
}

impl Visitor {
    /// Cart operations for this visitor.
    #[must_use]
    pub fn cart<'a>(&'a self, state: &'a AppState) -> CartService<'a> {
        CartService::new(
            state.api(),
            &self.session,
            self.auth.clone(),
            self.toasts.clone(),
        )
    }

    /// Favorites operations for this visitor.
    #[must_use]
    pub fn favorites<'a>(&self, state: &'a AppState) -> FavoritesService<'a> {
        FavoritesService::new(state.api(), self.auth.clone(), self.toasts.clone())
    }

    /// The session provider for this visitor.
    #[must_use]
    pub fn user_session<'a>(&'a self, state: &'a AppState) -> UserSession<'a> {
        UserSession::new(state.identity(), &self.session)
    }

    /// API credentials, or `401` for anonymous visitors.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Unauthorized`] when nobody is signed in.
    pub fn require_auth(&self) -> Result<&ApiAuth, AppError> {
        self.auth
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("sign in required".to_string()))
    }

    /// Re-read credentials after a sign-in during this request and merge
    /// the anonymous cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn signed_in(&mut self, state: &AppState) -> Result<(), AppError> {
        let auth = self.user_session(state).api_auth_if_signed_in().await?;
        self.auth = auth;
        self.sync_cart(state).await
    }

    async fn sync_cart(&self, state: &AppState) -> Result<(), AppError> {
        if self.auth.is_none() {
            return Ok(());
        }
        if let SyncOutcome::Synced { kept_locally, .. } =
            self.cart(state).sync_local_cart_with_server().await?
        {
            if kept_locally > 0 {
                warn!(kept_locally, "Some cart lines could not be merged");
            }
        }
        Ok(())
    }
}

impl FromRequestParts<AppState> for Visitor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, message)| AppError::Internal(message.to_string()))?;
        let toasts = state.toasts().for_session(&session).await?;
        let auth = UserSession::new(state.identity(), &session)
            .api_auth_if_signed_in()
            .await?;

        let visitor = Self {
            session,
            toasts,
            auth,
        };
        visitor.sync_cart(state).await?;
        Ok(visitor)
    }
}
