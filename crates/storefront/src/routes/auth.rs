//! Sign-in, sign-out and account route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form, Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use larkspur_core::Email;

use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, RequireAuth, Visitor};
use crate::models::channel_id;
use crate::services::debounce::Debounced;
use crate::services::session::{ProfileEdit, SessionError};
use crate::state::AppState;

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub email: String,
    pub error: Option<String>,
}

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// `GET /auth/login`
///
/// Signed-in visitors go straight to the home page.
pub async fn login_page(OptionalAuth(user): OptionalAuth) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    LoginTemplate {
        email: String::new(),
        error: None,
    }
    .into_response()
}

/// `POST /auth/login` - sign in and merge the anonymous cart.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    mut visitor: Visitor,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let rejected = |status: StatusCode, message: &str| {
        (
            status,
            LoginTemplate {
                email: form.email.clone(),
                error: Some(message.to_string()),
            },
        )
            .into_response()
    };

    let Ok(email) = Email::parse(&form.email) else {
        return Ok(rejected(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Please enter a valid email address.",
        ));
    };

    let user = match visitor
        .user_session(&state)
        .sign_in(&email, &form.password)
        .await
    {
        Ok(user) => user,
        Err(SessionError::Identity(e)) => {
            tracing::info!(error = %e, "Sign-in rejected");
            let status = if e.is_rate_limited() {
                StatusCode::TOO_MANY_REQUESTS
            } else {
                StatusCode::UNAUTHORIZED
            };
            return Ok(rejected(status, e.user_message()));
        }
        Err(e) => return Err(e.into()),
    };

    visitor
        .toasts
        .success(format!("Welcome back, {}!", user.display_name()));
    visitor.signed_in(&state).await?;

    Ok(Redirect::to("/").into_response())
}

/// `POST /auth/logout`
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, visitor: Visitor) -> Result<Redirect> {
    visitor.user_session(&state).sign_out().await?;
    visitor.toasts.info("You have been signed out.");
    Ok(Redirect::to("/"))
}

/// Email availability query.
#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct EmailAvailability {
    pub available: bool,
}

/// `GET /api/auth/email-available?email=` - whether an email is free to
/// register.
///
/// Calls are debounced per session; a call superseded by a newer one
/// answers `204 No Content`.
#[instrument(skip_all)]
pub async fn email_available(
    State(state): State<AppState>,
    visitor: Visitor,
    Query(query): Query<EmailQuery>,
) -> Result<Response> {
    let email = Email::parse(&query.email)
        .map_err(|e| AppError::BadRequest(format!("invalid email: {e}")))?;
    let channel = channel_id(&visitor.session).await?;

    let api = state.api();
    let outcome = state
        .email_checks()
        .run(channel, || async move { api.user_exists(&email).await })
        .await;

    match outcome {
        Debounced::Ran(exists) => Ok(Json(EmailAvailability { available: !exists? }).into_response()),
        Debounced::Superseded => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// The signed-in user's profile.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub phone_number: Option<String>,
}

/// `GET /api/account`
pub async fn profile(RequireAuth(user): RequireAuth) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        id: user.id.to_string(),
        email: user.email.to_string(),
        display_name: user.display_name().to_string(),
        given_name: user.given_name,
        family_name: user.family_name,
        phone_number: user.phone_number,
    })
}

/// `PATCH /api/account` - edit profile attributes.
///
/// The session copy updates immediately; the write to the identity
/// provider is debounced per user. A superseded write answers `202`.
#[instrument(skip_all)]
pub async fn update_profile(
    State(state): State<AppState>,
    visitor: Visitor,
    Json(edit): Json<ProfileEdit>,
) -> Result<StatusCode> {
    let attributes = visitor.user_session(&state).update_profile(&edit).await?;
    let auth = visitor.require_auth()?;

    match state.attributes().write(auth, attributes).await? {
        Debounced::Ran(()) => Ok(StatusCode::NO_CONTENT),
        Debounced::Superseded => Ok(StatusCode::ACCEPTED),
    }
}
