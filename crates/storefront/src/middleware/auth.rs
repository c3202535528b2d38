//! Authentication extractors.
//!
//! Both read the signed-in user from the session. Token freshness is handled
//! by [`crate::services::session::UserSession`] when a handler needs to call
//! the store API on the user's behalf.

use axum::{
    extract::{FromRequestParts, OriginalUri},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentUser, session_keys};

/// Extractor that requires a signed-in user.
///
/// Page requests are redirected to the login page; `/api/` requests get
/// `401 Unauthorized`.
///
/// # Example
///
/// ```rust,ignore
/// async fn account(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.display_name())
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Rejection for [`RequireAuth`].
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to login page (for HTML requests).
    RedirectToLogin,
    /// Unauthorized response (for API requests).
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to("/auth/login").into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

async fn current_user(parts: &Parts) -> Option<CurrentUser> {
    // Set by SessionManagerLayer
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Whether the request targets the JSON API.
///
/// Nested routers see a stripped URI, so the original one is preferred.
fn is_api_request(parts: &Parts) -> bool {
    parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |OriginalUri(uri)| uri)
        .path()
        .starts_with("/api/")
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match current_user(parts).await {
            Some(user) => Ok(Self(user)),
            None if is_api_request(parts) => Err(AuthRejection::Unauthorized),
            None => Err(AuthRejection::RedirectToLogin),
        }
    }
}

/// Extractor that optionally gets the signed-in user.
///
/// Unlike `RequireAuth`, this does not reject anonymous visitors.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts).await))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, header};
    use axum::routing::get;
    use tower::ServiceExt;
    use chrono::Utc;
    use secrecy::SecretString;
    use tower_sessions::MemoryStore;

    use larkspur_core::{Email, UserId};

    use super::*;
    use crate::identity::AuthTokens;
    use crate::models::SessionTokens;

    fn user() -> CurrentUser {
        CurrentUser {
            id: UserId::new("sub-1"),
            email: Email::parse("shopper@example.com").unwrap(),
            given_name: None,
            family_name: None,
            phone_number: None,
            tokens: SessionTokens::from_auth(
                &AuthTokens {
                    access_token: SecretString::from("access"),
                    id_token: None,
                    refresh_token: None,
                    expires_in: 3600,
                },
                None,
                Utc::now(),
            ),
        }
    }

    fn parts(path: &str, session: Option<Session>) -> Parts {
        let mut request = Request::builder().uri(path).body(()).unwrap();
        if let Some(session) = session {
            request.extensions_mut().insert(session);
        }
        request.into_parts().0
    }

    #[tokio::test]
    async fn test_require_auth_rejections() {
        let mut api = parts("/api/cart", None);
        assert!(matches!(
            RequireAuth::from_request_parts(&mut api, &()).await,
            Err(AuthRejection::Unauthorized)
        ));

        let mut page = parts("/account", None);
        assert!(matches!(
            RequireAuth::from_request_parts(&mut page, &()).await,
            Err(AuthRejection::RedirectToLogin)
        ));
    }

    #[tokio::test]
    async fn test_signed_in_user_is_extracted() {
        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        session
            .insert(session_keys::CURRENT_USER, user())
            .await
            .unwrap();

        let mut p = parts("/api/cart", Some(session));
        let RequireAuth(found) = RequireAuth::from_request_parts(&mut p, &()).await.unwrap();
        assert_eq!(found.id, UserId::new("sub-1"));

        let OptionalAuth(found) = OptionalAuth::from_request_parts(&mut p, &()).await.unwrap();
        assert!(found.is_some());
    }

    async fn whoami(RequireAuth(user): RequireAuth) -> String {
        user.id.to_string()
    }

    #[tokio::test]
    async fn test_nested_api_routes_get_unauthorized() {
        let app: Router = Router::new()
            .route("/account", get(whoami))
            .nest("/api", Router::new().route("/account", get(whoami)));

        let api = app
            .clone()
            .oneshot(Request::get("/api/account").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(api.status(), StatusCode::UNAUTHORIZED);

        let page = app
            .oneshot(Request::get("/account").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(page.status(), StatusCode::SEE_OTHER);
        assert_eq!(page.headers()[header::LOCATION], "/auth/login");
    }
}
